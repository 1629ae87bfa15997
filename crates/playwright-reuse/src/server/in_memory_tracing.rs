// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// In-memory trace recorder
//
// Buffers actions while a chunk is open and writes each stopped chunk as a
// standalone JSON document: { title, actions, snapshots }.

use crate::error::{Error, Result};
use crate::protocol::{Tracing, TracingStartOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// One recorded action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceAction {
    /// "goto", "click", "evaluate", "close"
    pub action: String,
    pub page_guid: String,
    pub detail: String,
}

/// DOM snapshot taken after an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSnapshot {
    pub page_guid: String,
    pub url: String,
}

/// Contents of one trace file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceChunk {
    pub title: Option<String>,
    pub actions: Vec<TraceAction>,
    pub snapshots: Vec<TraceSnapshot>,
}

impl TraceChunk {
    /// Reads a chunk written by [`Tracing::stop_chunk`].
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug, Default)]
struct TracingState {
    session: Option<TracingStartOptions>,
    chunk: Option<TraceChunk>,
    sessions_started: u32,
    chunks_written: u32,
}

/// Trace recorder of one in-memory context
#[derive(Debug, Default)]
pub struct InMemoryTracing {
    state: Mutex<TracingState>,
    fail_stop_chunk: AtomicBool,
}

impl InMemoryTracing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `stop_chunk` fail.
    pub fn fail_stop_chunk(&self, fail: bool) {
        self.fail_stop_chunk.store(fail, Ordering::SeqCst);
    }

    pub fn is_session_active(&self) -> bool {
        self.state.lock().session.is_some()
    }

    pub fn is_chunk_open(&self) -> bool {
        self.state.lock().chunk.is_some()
    }

    /// Number of times a session was started
    pub fn sessions_started(&self) -> u32 {
        self.state.lock().sessions_started
    }

    pub fn chunks_written(&self) -> u32 {
        self.state.lock().chunks_written
    }

    /// Records an action into the open chunk, if any.
    pub(crate) fn record(&self, action: &str, page_guid: &str, detail: &str, url: &str) {
        let mut state = self.state.lock();
        let snapshots = state.session.as_ref().is_some_and(|s| s.snapshots);
        if let Some(chunk) = state.chunk.as_mut() {
            chunk.actions.push(TraceAction {
                action: action.to_string(),
                page_guid: page_guid.to_string(),
                detail: detail.to_string(),
            });
            if snapshots {
                chunk.snapshots.push(TraceSnapshot {
                    page_guid: page_guid.to_string(),
                    url: url.to_string(),
                });
            }
        }
    }

    pub(crate) fn discard(&self) {
        let mut state = self.state.lock();
        state.session = None;
        state.chunk = None;
    }
}

#[async_trait]
impl Tracing for InMemoryTracing {
    async fn start(&self, options: &TracingStartOptions) -> Result<()> {
        let mut state = self.state.lock();
        if state.session.is_some() {
            return Err(Error::Recording("Tracing has been already started".to_string()));
        }
        state.session = Some(options.clone());
        state.sessions_started += 1;
        Ok(())
    }

    async fn start_chunk(&self, title: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        if state.session.is_none() {
            return Err(Error::Recording(
                "Must start tracing before starting a new chunk".to_string(),
            ));
        }
        state.chunk = Some(TraceChunk {
            title: title.map(str::to_string),
            ..TraceChunk::default()
        });
        Ok(())
    }

    async fn stop_chunk(&self, path: Option<&Path>) -> Result<()> {
        let chunk = {
            let mut state = self.state.lock();
            state
                .chunk
                .take()
                .ok_or_else(|| Error::Recording("Must start a chunk before stopping it".to_string()))?
        };
        let Some(path) = path else {
            return Ok(());
        };
        if self.fail_stop_chunk.load(Ordering::SeqCst) {
            return Err(Error::Recording(format!(
                "Failed to write trace to {}",
                path.display()
            )));
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(&chunk)?).await?;
        self.state.lock().chunks_written += 1;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.session.is_none() {
            return Err(Error::Recording("Tracing is not started".to_string()));
        }
        state.session = None;
        state.chunk = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_are_self_contained() {
        let dir = tempfile::tempdir().unwrap();
        let tracing = InMemoryTracing::new();
        tracing.start(&TracingStartOptions::default()).await.unwrap();

        tracing.record("click", "page@1", "#before", "about:blank");
        tracing.start_chunk(Some("first")).await.unwrap();
        tracing.record("click", "page@1", "#a", "https://a.test/");
        tracing.stop_chunk(Some(&dir.path().join("1.json"))).await.unwrap();

        tracing.start_chunk(Some("second")).await.unwrap();
        tracing.record("click", "page@2", "#b", "https://a.test/");
        tracing.stop_chunk(Some(&dir.path().join("2.json"))).await.unwrap();

        let first = TraceChunk::read(dir.path().join("1.json")).await.unwrap();
        let second = TraceChunk::read(dir.path().join("2.json")).await.unwrap();
        assert_eq!(first.actions.len(), 1);
        assert_eq!(first.actions[0].detail, "#a");
        assert_eq!(second.title.as_deref(), Some("second"));
        assert_eq!(second.actions[0].detail, "#b");
    }

    #[tokio::test]
    async fn test_chunk_requires_session() {
        let tracing = InMemoryTracing::new();
        assert!(tracing.start_chunk(None).await.is_err());
        assert!(tracing.stop_chunk(None).await.is_err());

        tracing.start(&TracingStartOptions::default()).await.unwrap();
        assert!(tracing.start(&TracingStartOptions::default()).await.is_err());
    }
}
