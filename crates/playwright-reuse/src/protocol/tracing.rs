// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Trace recorder bound to one browser context.
///
/// A recording session is started once and divided into chunks. Only actions
/// performed while a chunk is open are recorded; starting a chunk discards
/// anything buffered and not yet flushed, and stopping a chunk flushes it to
/// its own self-contained file.
///
/// See: <https://playwright.dev/docs/api/class-tracing>
#[async_trait]
pub trait Tracing: Send + Sync {
    /// Starts the recording session. Does not open a chunk.
    async fn start(&self, options: &TracingStartOptions) -> Result<()>;

    /// Opens a new chunk, discarding unflushed data of the previous one.
    async fn start_chunk(&self, title: Option<&str>) -> Result<()>;

    /// Closes the open chunk. With a path the chunk is written there, without
    /// one it is discarded.
    async fn stop_chunk(&self, path: Option<&Path>) -> Result<()>;

    /// Ends the recording session.
    async fn stop(&self) -> Result<()>;
}

/// Options for [`Tracing::start`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingStartOptions {
    /// Trace file name prefix inside the engine's traces directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Capture screenshots during tracing
    #[serde(default)]
    pub screenshots: bool,
    /// Capture DOM snapshots on every action
    #[serde(default)]
    pub snapshots: bool,
}
