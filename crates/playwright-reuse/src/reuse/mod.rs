// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Context reuse
//
// Components, bottom-up:
// - fingerprint: pure compatibility checks
// - cancellation: pending-operation registry and test-boundary cancellation
// - storage_reset: clear-then-seed protocol for a reused context
// - recording: per-test trace chunks and video collection
// - tracked_page: the page handed to a test body
// - manager: the per-worker state machine tying them together

pub mod cancellation;
pub mod fingerprint;
pub mod manager;
pub mod recording;
pub mod storage_reset;
pub mod tracked_page;

pub use cancellation::{
    CancelOutcome, CancelSignal, CancellationReport, OperationKind, PendingOperation,
    PendingOperations, cancel_all,
};
pub use fingerprint::{ContextFingerprint, RecordingState, compatible, recording_compatible};
pub use manager::{
    ContextReuseManager, ManagerState, RecreateReason, RetainedView, ReuseDecision, ReuseWarning,
    TestOutcome, TestReport, TestSetup, TestStatus, WarningKind, decide,
};
pub use recording::{
    ContextRecording, RecordingCoordinator, RecordingPlan, RecordingReport, TRACE_FILE,
    sanitize_title,
};
pub use storage_reset::{
    CLEAR_STORAGE_SCRIPT, SEED_LOCAL_STORAGE_SCRIPT, StorageResetReport, reset_storage,
};
pub use tracked_page::TrackedPage;

use std::time::Duration;
use tokio::time::Instant;

/// `now + budget`, saturating far in the future for unbounded budgets
pub(crate) fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}
