// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Worker-level configuration of the context reuse manager

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that opts a whole run into context reuse.
///
/// Any value other than empty, `0` or `false` switches every test to
/// [`ReuseMode::WhenPossible`].
pub const REUSE_CONTEXT_ENV: &str = "PW_TEST_REUSE_CONTEXT";

/// Default bound on waiting for pending operations to acknowledge cancellation
pub const DEFAULT_CANCEL_TIMEOUT_MS: f64 = 5000.0;

/// Default bound on best-effort context/page closes
pub const DEFAULT_CLOSE_TIMEOUT_MS: f64 = 10000.0;

/// Whether a browser context may be handed from one test to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReuseMode {
    /// Always create a fresh context; close it when the test ends
    #[default]
    Disabled,
    /// Reuse only when construction options and recording requirements are compatible
    WhenPossible,
    /// Reuse whenever construction options match; video is disabled to keep reuse
    Force,
}

impl ReuseMode {
    /// Interprets the value of [`REUSE_CONTEXT_ENV`].
    pub fn from_env_value(value: Option<&str>) -> Option<ReuseMode> {
        match value.map(str::trim) {
            None | Some("") | Some("0") => None,
            Some(v) if v.eq_ignore_ascii_case("false") => None,
            Some(_) => Some(ReuseMode::WhenPossible),
        }
    }

    /// Reads [`REUSE_CONTEXT_ENV`] from the process environment.
    pub fn from_env() -> Option<ReuseMode> {
        Self::from_env_value(std::env::var(REUSE_CONTEXT_ENV).ok().as_deref())
    }
}

/// What to do with a live trace session when the next test does not trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdleTracePolicy {
    /// End the session; a later traced test starts a new one
    #[default]
    Stop,
    /// Keep the session alive with no open chunk
    Pause,
}

/// Configuration of one worker's reuse manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig {
    /// Root directory of per-test artifacts (traces, videos)
    pub artifacts_dir: PathBuf,

    /// Bound on cancellation in milliseconds; capped by the test timeout
    #[serde(default = "default_cancel_timeout")]
    pub cancel_timeout: f64,

    /// Bound on best-effort closes in milliseconds
    #[serde(default = "default_close_timeout")]
    pub close_timeout: f64,

    /// Idle trace session handling
    #[serde(default)]
    pub idle_trace: IdleTracePolicy,

    /// Worker-wide reuse mode replacing every test's own mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse_mode_override: Option<ReuseMode>,
}

fn default_cancel_timeout() -> f64 {
    DEFAULT_CANCEL_TIMEOUT_MS
}

fn default_close_timeout() -> f64 {
    DEFAULT_CLOSE_TIMEOUT_MS
}

impl ManagerConfig {
    /// Creates a config writing artifacts under `artifacts_dir`
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            cancel_timeout: DEFAULT_CANCEL_TIMEOUT_MS,
            close_timeout: DEFAULT_CLOSE_TIMEOUT_MS,
            idle_trace: IdleTracePolicy::default(),
            reuse_mode_override: None,
        }
    }

    /// Set cancellation bound in milliseconds
    pub fn cancel_timeout(mut self, ms: f64) -> Self {
        self.cancel_timeout = ms;
        self
    }

    /// Set close bound in milliseconds
    pub fn close_timeout(mut self, ms: f64) -> Self {
        self.close_timeout = ms;
        self
    }

    /// Set idle trace policy
    pub fn idle_trace(mut self, policy: IdleTracePolicy) -> Self {
        self.idle_trace = policy;
        self
    }

    /// Set a worker-wide reuse mode
    pub fn reuse_mode_override(mut self, mode: ReuseMode) -> Self {
        self.reuse_mode_override = Some(mode);
        self
    }

    /// Applies [`REUSE_CONTEXT_ENV`] when it is set
    pub fn apply_env(mut self) -> Self {
        if let Some(mode) = ReuseMode::from_env() {
            tracing::debug!("{} set, reuse mode overridden to {:?}", REUSE_CONTEXT_ENV, mode);
            self.reuse_mode_override = Some(mode);
        }
        self
    }

    /// The mode in effect for a test declaring `declared`
    pub fn effective_mode(&self, declared: ReuseMode) -> ReuseMode {
        self.reuse_mode_override.unwrap_or(declared)
    }

    pub fn cancel_timeout_duration(&self) -> Duration {
        ms_to_duration(self.cancel_timeout)
    }

    pub fn close_timeout_duration(&self) -> Duration {
        ms_to_duration(self.close_timeout)
    }
}

/// Converts a millisecond timeout into a Duration; negative or NaN values
/// become zero and overflowing values saturate.
pub(crate) fn ms_to_duration(ms: f64) -> Duration {
    if ms.is_nan() || ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
}
