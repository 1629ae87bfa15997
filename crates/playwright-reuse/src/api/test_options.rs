// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Per-test resolved configuration
//
// The runner resolves project/file/test level configuration and hands the
// reuse manager one TestOptions per test case, either built in code or
// deserialized from JSON (camelCase keys).

use crate::DEFAULT_TIMEOUT_MS;
use crate::api::manager_config::{ReuseMode, ms_to_duration};
use crate::protocol::{ContextOptions, StorageState, Viewport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a recording artifact (video or trace) is produced and kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactMode {
    /// Never record
    #[default]
    Off,
    /// Record every test and keep the artifact
    On,
    /// Record every test, delete the artifact when the test passes
    RetainOnFailure,
    /// Record only the first retry of a test
    OnFirstRetry,
}

/// Video recording mode
pub type VideoMode = ArtifactMode;

/// Trace recording mode
pub type TraceMode = ArtifactMode;

impl ArtifactMode {
    /// Returns true if the test attempt numbered `retry` records this artifact.
    pub fn is_enabled(&self, retry: u32) -> bool {
        match self {
            ArtifactMode::Off => false,
            ArtifactMode::On | ArtifactMode::RetainOnFailure => true,
            ArtifactMode::OnFirstRetry => retry == 1,
        }
    }

    /// Returns true if a recorded artifact survives a passing test.
    pub fn keeps_on_pass(&self) -> bool {
        !matches!(self, ArtifactMode::RetainOnFailure)
    }
}

/// Recording requirements of one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOptions {
    /// Video recording mode
    #[serde(default)]
    pub video: VideoMode,

    /// Trace recording mode
    #[serde(default)]
    pub trace: TraceMode,

    /// Optional dimensions of the recorded videos
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_size: Option<Viewport>,

    /// Capture screenshots in the trace
    #[serde(default = "default_true")]
    pub screenshots: bool,

    /// Capture DOM snapshots in the trace
    #[serde(default = "default_true")]
    pub snapshots: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            video: VideoMode::Off,
            trace: TraceMode::Off,
            video_size: None,
            screenshots: true,
            snapshots: true,
        }
    }
}

impl RecordingOptions {
    /// Returns true if this attempt wants a video.
    pub fn wants_video(&self, retry: u32) -> bool {
        self.video.is_enabled(retry)
    }

    /// Returns true if this attempt wants a trace.
    pub fn wants_trace(&self, retry: u32) -> bool {
        self.trace.is_enabled(retry)
    }
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_MS
}

/// Resolved configuration of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOptions {
    /// Test title; names the per-test artifact directory
    pub title: String,

    /// Context construction options
    #[serde(default)]
    pub context: ContextOptions,

    /// Storage state to seed before the test body runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_state: Option<StorageState>,

    /// Video and trace requirements
    #[serde(default)]
    pub recording: RecordingOptions,

    /// Whether the context may be reused from, and retained for, other tests
    #[serde(default)]
    pub reuse_mode: ReuseMode,

    /// Test timeout in milliseconds; also bounds context setup. 0 disables it.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Retry attempt number (0 for the first run)
    #[serde(default)]
    pub retry: u32,
}

impl TestOptions {
    /// Creates options for `title` with every setting at its default
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            context: ContextOptions::default(),
            storage_state: None,
            recording: RecordingOptions::default(),
            reuse_mode: ReuseMode::default(),
            timeout: DEFAULT_TIMEOUT_MS,
            retry: 0,
        }
    }

    /// Set context construction options
    pub fn context(mut self, context: ContextOptions) -> Self {
        self.context = context;
        self
    }

    /// Set storage state to seed before the test
    pub fn storage_state(mut self, storage_state: StorageState) -> Self {
        self.storage_state = Some(storage_state);
        self
    }

    /// Set video recording mode
    pub fn video(mut self, mode: VideoMode) -> Self {
        self.recording.video = mode;
        self
    }

    /// Set trace recording mode
    pub fn trace(mut self, mode: TraceMode) -> Self {
        self.recording.trace = mode;
        self
    }

    /// Set reuse mode
    pub fn reuse_mode(mut self, mode: ReuseMode) -> Self {
        self.reuse_mode = mode;
        self
    }

    /// Set test timeout in milliseconds
    pub fn timeout(mut self, ms: f64) -> Self {
        self.timeout = ms;
        self
    }

    /// Set retry attempt number
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Test timeout as a Duration; `Duration::MAX` when disabled
    pub fn timeout_duration(&self) -> Duration {
        if self.timeout == 0.0 {
            return Duration::MAX;
        }
        ms_to_duration(self.timeout)
    }

    /// Storage state declared for this test, `None` when empty
    pub fn declared_storage(&self) -> Option<&StorageState> {
        self.storage_state.as_ref().filter(|state| !state.is_empty())
    }
}
