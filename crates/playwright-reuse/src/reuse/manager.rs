// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Context Reuse Manager
//
// One manager per worker. Tests run strictly one after another; the manager
// owns at most one retained context between them.
//
// State machine:
//   Empty ──setup──▶ Retained(c) ──setup, compatible──▶ Retained(c)
//                    Retained(c) ──setup, incompatible──▶ Retained(new)
//                    Retained(c) ──test end, disposable──▶ Empty
//   any ──shutdown──▶ Terminated
//
// Setup order on reuse: cancellation, storage reset, recording transition,
// fresh page. Construction failures leave the manager Empty.

use crate::api::{ManagerConfig, ReuseMode, TestOptions};
use crate::error::{Error, FailureKind, Result};
use crate::protocol::{BrowserContext, ContextFactory, ContextLaunchOptions, Page, origin_of};
use crate::reuse::cancellation::{self, CancellationReport, PendingOperations};
use crate::reuse::fingerprint::{ContextFingerprint, RecordingState, compatible, recording_compatible};
use crate::reuse::recording::{ContextRecording, RecordingCoordinator, RecordingPlan};
use crate::reuse::{deadline_after, storage_reset};
use crate::reuse::tracked_page::TrackedPage;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Why a retained context was not reused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "reason")]
pub enum RecreateReason {
    /// The next test runs with reuse disabled
    ReuseDisabled,
    /// The context was closed by the previous test or crashed
    ContextClosed,
    /// Construction options differ
    FingerprintMismatch { fields: Vec<String> },
    /// Video or trace requirements cannot share the context
    RecordingIncompatible,
    /// An operation of the previous test ignored cancellation
    CancellationAbandoned,
}

impl std::fmt::Display for RecreateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecreateReason::ReuseDisabled => write!(f, "reuse is disabled"),
            RecreateReason::ContextClosed => write!(f, "the retained context was closed"),
            RecreateReason::FingerprintMismatch { fields } => {
                write!(f, "construction options differ ({})", fields.join(", "))
            }
            RecreateReason::RecordingIncompatible => {
                write!(f, "recording requirements are incompatible")
            }
            RecreateReason::CancellationAbandoned => {
                write!(f, "an operation of the previous test ignored cancellation")
            }
        }
    }
}

/// Outcome of the reuse decision for one test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "decision")]
pub enum ReuseDecision {
    /// Nothing retained; construct
    Create,
    /// Reuse the retained context
    Reuse,
    /// Dispose of the retained context and construct
    Recreate(RecreateReason),
}

/// What the decision needs to know about the retained context
#[derive(Debug, Clone, Copy)]
pub struct RetainedView<'a> {
    pub fingerprint: &'a ContextFingerprint,
    pub recording: RecordingState,
    pub closed: bool,
    pub abandoned: bool,
}

/// Pure reuse decision.
///
/// Checks run in a fixed order; the first failing one names the reason.
pub fn decide(
    retained: Option<RetainedView<'_>>,
    next: &ContextFingerprint,
    test: &TestOptions,
    mode: ReuseMode,
) -> ReuseDecision {
    let Some(retained) = retained else {
        return ReuseDecision::Create;
    };
    let reason = if mode == ReuseMode::Disabled {
        RecreateReason::ReuseDisabled
    } else if retained.closed {
        RecreateReason::ContextClosed
    } else if retained.abandoned {
        RecreateReason::CancellationAbandoned
    } else if !compatible(retained.fingerprint, next) {
        RecreateReason::FingerprintMismatch {
            fields: retained.fingerprint.mismatched_fields(next),
        }
    } else if !recording_compatible(retained.recording, &test.recording, test.retry, mode) {
        RecreateReason::RecordingIncompatible
    } else {
        return ReuseDecision::Reuse;
    };
    ReuseDecision::Recreate(reason)
}

/// Category of a recovered problem attached to a test report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    Reset,
    Recording,
    Cancellation,
    Close,
    Recreated,
}

/// A recovered problem: the test ran, but a reuse guarantee may not hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuseWarning {
    pub kind: WarningKind,
    pub message: String,
    pub hint: String,
}

impl ReuseWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        let hint = match kind {
            WarningKind::Reset => {
                "storage may carry over from a previous test; declare storageState or disable reuse"
            }
            WarningKind::Recording => "artifacts for this test may be missing or incomplete",
            WarningKind::Cancellation => {
                "an operation ignored cancellation; context disposed, the next test gets a fresh one"
            }
            WarningKind::Close => "the context may have leaked in the browser",
            WarningKind::Recreated => "context could not be reused; recreated",
        };
        Self {
            kind,
            message: message.into(),
            hint: hint.to_string(),
        }
    }
}

/// What the runner reports for an attempt
#[derive(Debug, Clone)]
pub enum TestOutcome {
    Passed,
    Failed { message: String },
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    Passed,
    Failed,
    TimedOut,
    /// The worker could not provide a context; the body never ran
    InfrastructureError,
}

/// Result record of one test attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub title: String,
    pub status: TestStatus,
    /// The test ran in a context inherited from a previous test
    pub reused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_guid: Option<String>,
    pub warnings: Vec<ReuseWarning>,
    pub artifacts: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure_error: Option<String>,
}

impl TestReport {
    /// Report of an attempt whose setup failed
    pub fn infrastructure_failure(title: impl Into<String>, error: &Error) -> Self {
        Self {
            title: title.into(),
            status: TestStatus::InfrastructureError,
            reused: false,
            context_guid: None,
            warnings: Vec::new(),
            artifacts: Vec::new(),
            failure: None,
            infrastructure_error: Some(error.to_string()),
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &ReuseWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

/// The ready-to-use pair handed to a test body
#[derive(Debug)]
pub struct TestSetup {
    pub context: Arc<dyn BrowserContext>,
    pub page: TrackedPage,
    pub reused: bool,
    pub decision: ReuseDecision,
    pub warnings: Vec<ReuseWarning>,
}

impl TestSetup {
    pub fn operations(&self) -> &Arc<PendingOperations> {
        self.page.operations()
    }
}

/// Coarse manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Empty,
    Retained,
    Terminated,
}

struct RetainedContext {
    context: Arc<dyn BrowserContext>,
    fingerprint: ContextFingerprint,
    recording: ContextRecording,
    operations: Arc<PendingOperations>,
    /// Origins the hosted tests may have written to
    dirty_origins: BTreeSet<String>,
    /// Origins navigated to through the tracked page
    visited: Arc<Mutex<BTreeSet<String>>>,
    abandoned: bool,
    tests_served: u32,
}

impl RetainedContext {
    fn view(&self) -> RetainedView<'_> {
        RetainedView {
            fingerprint: &self.fingerprint,
            recording: self.recording.state(),
            closed: self.context.is_closed(),
            abandoned: self.abandoned,
        }
    }
}

enum ReuseState {
    Empty,
    Retained(Box<RetainedContext>),
    Terminated,
}

struct CurrentTest {
    options: TestOptions,
    mode: ReuseMode,
    reused: bool,
    warnings: Vec<ReuseWarning>,
    infrastructure_error: Option<String>,
}

/// Owns the retained context of one worker.
///
/// The context handed out by [`ContextReuseManager::setup_test`] must not be
/// kept past [`ContextReuseManager::on_test_end`].
pub struct ContextReuseManager {
    factory: Arc<dyn ContextFactory>,
    config: ManagerConfig,
    recording: RecordingCoordinator,
    state: ReuseState,
    current: Option<CurrentTest>,
    /// Reports of tests ended implicitly by the next setup
    orphaned: Vec<TestReport>,
}

impl std::fmt::Debug for ContextReuseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextReuseManager")
            .field("state", &self.state())
            .field("retained", &self.retained_context_guid())
            .finish()
    }
}

impl ContextReuseManager {
    pub fn new(factory: Arc<dyn ContextFactory>, config: ManagerConfig) -> Self {
        let recording = RecordingCoordinator::new(&config);
        Self {
            factory,
            config,
            recording,
            state: ReuseState::Empty,
            current: None,
            orphaned: Vec::new(),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn state(&self) -> ManagerState {
        match self.state {
            ReuseState::Empty => ManagerState::Empty,
            ReuseState::Retained(_) => ManagerState::Retained,
            ReuseState::Terminated => ManagerState::Terminated,
        }
    }

    pub fn retained_context_guid(&self) -> Option<&str> {
        match &self.state {
            ReuseState::Retained(retained) => Some(retained.context.guid()),
            _ => None,
        }
    }

    /// Number of tests the retained context has hosted
    pub fn retained_test_count(&self) -> u32 {
        match &self.state {
            ReuseState::Retained(retained) => retained.tests_served,
            _ => 0,
        }
    }

    /// Drains reports of tests the runner never ended; `setup_test` ends such
    /// a test as failed before setting up the next one.
    pub fn take_orphaned_reports(&mut self) -> Vec<TestReport> {
        std::mem::take(&mut self.orphaned)
    }

    /// Provides the context and page for the next test.
    ///
    /// Fails with [`Error::Construction`] or [`Error::Timeout`]; both are
    /// infrastructure failures and the test body must not run. The runner
    /// still calls [`ContextReuseManager::on_test_end`] to obtain the report.
    pub async fn setup_test(&mut self, options: &TestOptions) -> Result<TestSetup> {
        if matches!(self.state, ReuseState::Terminated) {
            return Err(Error::InvalidArgument(
                "context reuse manager was shut down".to_string(),
            ));
        }
        if let Some(previous) = &self.current {
            tracing::warn!(
                "Test '{}' was not ended before the next setup; ending it as failed",
                previous.options.title
            );
            let report = self
                .on_test_end(TestOutcome::Failed {
                    message: "test ended without a report".to_string(),
                })
                .await;
            for warning in &report.warnings {
                tracing::warn!("Unreported test '{}': {}", report.title, warning.message);
            }
            for artifact in &report.artifacts {
                tracing::warn!("Unreported test '{}' left {}", report.title, artifact.display());
            }
            self.orphaned.push(report);
        }

        let mode = self.config.effective_mode(options.reuse_mode);
        let deadline = deadline_after(options.timeout_duration());
        let plan = RecordingPlan::new(&options.recording, options.retry, mode);
        let next = ContextFingerprint::from_options(&options.context);
        let mut warnings = Vec::new();

        if let ReuseState::Retained(retained) = &mut self.state {
            let bound = self
                .config
                .cancel_timeout_duration()
                .min(options.timeout_duration());
            let report = cancellation::cancel_all(
                retained.context.as_ref(),
                &retained.operations,
                "Next test is starting.",
                bound,
            )
            .await;
            if !report.is_clean() {
                retained.abandoned = true;
                warnings.push(cancellation_warning(&report));
            }
        }

        let decision = match &self.state {
            ReuseState::Retained(retained) => decide(Some(retained.view()), &next, options, mode),
            _ => decide(None, &next, options, mode),
        };

        let result = match &decision {
            ReuseDecision::Reuse => self.reuse(options, plan, deadline, &mut warnings).await,
            ReuseDecision::Create => self.create(options, next, plan, deadline, &mut warnings).await,
            ReuseDecision::Recreate(reason) => {
                tracing::info!("Recreating browser context: {}", reason);
                if matches!(
                    reason,
                    RecreateReason::ContextClosed | RecreateReason::CancellationAbandoned
                ) {
                    warnings.push(ReuseWarning::new(WarningKind::Recreated, reason.to_string()));
                }
                self.dispose_retained(&mut warnings).await;
                self.create(options, next, plan, deadline, &mut warnings).await
            }
        };

        let reused = decision == ReuseDecision::Reuse;
        match result {
            Ok((context, page)) => {
                self.current = Some(CurrentTest {
                    options: options.clone(),
                    mode,
                    reused,
                    warnings: warnings.clone(),
                    infrastructure_error: None,
                });
                Ok(TestSetup {
                    context,
                    page,
                    reused,
                    decision,
                    warnings,
                })
            }
            Err(e) => {
                tracing::warn!("Setup of '{}' failed: {}", options.title, e);
                self.current = Some(CurrentTest {
                    options: options.clone(),
                    mode,
                    reused: false,
                    warnings,
                    infrastructure_error: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    async fn create(
        &mut self,
        options: &TestOptions,
        fingerprint: ContextFingerprint,
        plan: RecordingPlan,
        deadline: Instant,
        warnings: &mut Vec<ReuseWarning>,
    ) -> Result<(Arc<dyn BrowserContext>, TrackedPage)> {
        let launch = ContextLaunchOptions {
            options: options.context.clone(),
            storage_state: options.declared_storage().cloned(),
            record_video: self.recording.construction_video(plan, &options.recording),
        };
        let mut recording = ContextRecording {
            video_dir: launch.record_video.as_ref().map(|video| video.dir.clone()),
            ..ContextRecording::default()
        };

        let context = match tokio::time::timeout_at(deadline, self.factory.new_context(&launch)).await {
            Ok(Ok(context)) => context,
            Ok(Err(e)) => return Err(construction_error(e)),
            Err(_) => {
                return Err(Error::Timeout(
                    "context construction exceeded the test budget".to_string(),
                ));
            }
        };
        tracing::debug!(
            "Created browser context {} ({})",
            context.guid(),
            fingerprint.digest()
        );

        for error in self
            .recording
            .begin_test(context.as_ref(), &mut recording, plan, options, deadline)
            .await
        {
            warnings.push(ReuseWarning::new(WarningKind::Recording, error.to_string()));
        }

        let operations = Arc::new(PendingOperations::new());
        let visited = Arc::new(Mutex::new(BTreeSet::new()));
        let page = match self.fresh_page(context.as_ref(), deadline).await {
            Ok(page) => page,
            Err(e) => {
                self.close_context(context.as_ref(), warnings).await;
                return Err(e);
            }
        };

        let dirty_origins = options
            .declared_storage()
            .map(|state| state.origins.iter().map(|o| o.origin.clone()).collect())
            .unwrap_or_default();

        self.state = ReuseState::Retained(Box::new(RetainedContext {
            context: context.clone(),
            fingerprint,
            recording,
            operations: operations.clone(),
            dirty_origins,
            visited: visited.clone(),
            abandoned: false,
            tests_served: 1,
        }));

        Ok((context, TrackedPage::new(page, operations, visited)))
    }

    async fn reuse(
        &mut self,
        options: &TestOptions,
        plan: RecordingPlan,
        deadline: Instant,
        warnings: &mut Vec<ReuseWarning>,
    ) -> Result<(Arc<dyn BrowserContext>, TrackedPage)> {
        let result = self.prepare_retained(options, plan, deadline, warnings).await;
        if result.is_err() {
            self.dispose_retained(warnings).await;
        }
        result
    }

    async fn prepare_retained(
        &mut self,
        options: &TestOptions,
        plan: RecordingPlan,
        deadline: Instant,
        warnings: &mut Vec<ReuseWarning>,
    ) -> Result<(Arc<dyn BrowserContext>, TrackedPage)> {
        let ReuseState::Retained(retained) = &mut self.state else {
            return Err(Error::InvalidArgument("no retained context".to_string()));
        };
        let context = retained.context.clone();
        tracing::debug!(
            "Reusing browser context {} for '{}'",
            context.guid(),
            options.title
        );

        match tokio::time::timeout_at(deadline, context.storage_state()).await {
            Ok(Ok(state)) => {
                retained
                    .dirty_origins
                    .extend(state.origins.into_iter().map(|o| o.origin));
            }
            Ok(Err(e)) => warnings.push(ReuseWarning::new(
                WarningKind::Reset,
                format!("could not enumerate stored origins: {}", e),
            )),
            Err(_) => {
                return Err(Error::Timeout(
                    "storage enumeration exceeded the test budget".to_string(),
                ));
            }
        }

        let leftover: Vec<Arc<dyn Page>> = context.pages();
        let report = storage_reset::reset_storage(
            context.as_ref(),
            &retained.dirty_origins,
            options.declared_storage(),
            deadline,
        )
        .await?;
        for failure in &report.failures {
            warnings.push(ReuseWarning::new(WarningKind::Reset, failure.to_string()));
        }
        // Origins that failed to clear stay dirty for the next attempt
        retained
            .dirty_origins
            .retain(|origin| !report.cleared_origins.contains(origin));
        retained
            .dirty_origins
            .extend(report.seeded_origins.iter().cloned());

        for page in leftover.into_iter().filter(|page| !page.is_closed()) {
            match tokio::time::timeout_at(deadline, page.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Failed to close leftover page {}: {}", page.guid(), e),
                Err(_) => {
                    return Err(Error::Timeout(
                        "closing leftover pages exceeded the test budget".to_string(),
                    ));
                }
            }
        }

        for error in self
            .recording
            .begin_test(context.as_ref(), &mut retained.recording, plan, options, deadline)
            .await
        {
            warnings.push(ReuseWarning::new(WarningKind::Recording, error.to_string()));
        }

        let operations = retained.operations.clone();
        let visited = retained.visited.clone();
        retained.tests_served += 1;
        let page = self.fresh_page(context.as_ref(), deadline).await?;
        Ok((context, TrackedPage::new(page, operations, visited)))
    }

    async fn fresh_page(
        &self,
        context: &dyn BrowserContext,
        deadline: Instant,
    ) -> Result<Arc<dyn Page>> {
        match tokio::time::timeout_at(deadline, context.new_page()).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e)) => Err(construction_error(e.context("creating page"))),
            Err(_) => Err(Error::Timeout(
                "page creation exceeded the test budget".to_string(),
            )),
        }
    }

    /// Completion hook: stops what the test left running, closes its trace
    /// chunk, and releases the context unless it can be retained.
    pub async fn on_test_end(&mut self, outcome: TestOutcome) -> TestReport {
        let Some(current) = self.current.take() else {
            return TestReport::infrastructure_failure(
                "<unknown>",
                &Error::InvalidArgument("no test in progress".to_string()),
            );
        };

        let (status, failure) = match outcome {
            TestOutcome::Passed => (TestStatus::Passed, None),
            TestOutcome::Failed { message } => (TestStatus::Failed, Some(message)),
            TestOutcome::TimedOut => (TestStatus::TimedOut, Some("Test timeout exceeded.".to_string())),
        };
        let mut report = TestReport {
            title: current.options.title.clone(),
            status,
            reused: current.reused,
            context_guid: None,
            warnings: current.warnings,
            artifacts: Vec::new(),
            failure,
            infrastructure_error: None,
        };

        if let Some(error) = current.infrastructure_error {
            report.status = TestStatus::InfrastructureError;
            report.infrastructure_error = Some(error);
            return report;
        }

        let ReuseState::Retained(retained) = &mut self.state else {
            return report;
        };
        report.context_guid = Some(retained.context.guid().to_string());
        let passed = status == TestStatus::Passed;
        let close_bound = self.config.close_timeout_duration();

        // 1. Cancellation
        let reason = match status {
            TestStatus::TimedOut => "Test timeout exceeded.",
            _ => "Test ended.",
        };
        let cancel_bound = self
            .config
            .cancel_timeout_duration()
            .min(current.options.timeout_duration());
        let cancelled = cancellation::cancel_all(
            retained.context.as_ref(),
            &retained.operations,
            reason,
            cancel_bound,
        )
        .await;
        for route_error in &cancelled.route_errors {
            report.warnings.push(ReuseWarning::new(
                WarningKind::Cancellation,
                format!("route handler not removed: {}", route_error),
            ));
        }
        if !cancelled.is_clean() {
            retained.abandoned = true;
            report.warnings.push(cancellation_warning(&cancelled));
        }

        // 2. Origins the test navigated to or left pages on
        let visited = std::mem::take(&mut *retained.visited.lock());
        retained.dirty_origins.extend(visited);
        if !retained.context.is_closed() {
            for page in retained.context.pages() {
                if let Some(origin) = origin_of(&page.url()) {
                    retained.dirty_origins.insert(origin);
                }
            }
        }

        // 3. Trace chunk
        let test_dir = self.recording.test_dir(&current.options);
        let end_deadline = deadline_after(close_bound);
        let recorded = self
            .recording
            .end_test(
                retained.context.as_ref(),
                &mut retained.recording,
                &current.options,
                passed,
                &test_dir,
                end_deadline,
            )
            .await;
        report.artifacts.extend(recorded.artifacts);
        for error in recorded.failures {
            report
                .warnings
                .push(ReuseWarning::new(WarningKind::Recording, error.to_string()));
        }

        // 4. Release unless retainable
        let video_dir = retained.recording.video_dir.clone();
        let dispose = current.mode == ReuseMode::Disabled
            || video_dir.is_some()
            || retained.abandoned
            || retained.context.is_closed();
        if dispose {
            self.dispose_retained(&mut report.warnings).await;
            if let Some(dir) = video_dir {
                let keep = !passed || current.options.recording.video.keeps_on_pass();
                let videos = self.recording.collect_videos(&dir, &test_dir, keep).await;
                report.artifacts.extend(videos.artifacts);
                for error in videos.failures {
                    report
                        .warnings
                        .push(ReuseWarning::new(WarningKind::Recording, error.to_string()));
                }
            }
        }

        report
    }

    /// Closes the retained context, if any, and terminates the manager.
    pub async fn shutdown(&mut self) -> Vec<ReuseWarning> {
        let mut warnings = Vec::new();
        if let ReuseState::Retained(retained) = &self.state {
            let report = cancellation::cancel_all(
                retained.context.as_ref(),
                &retained.operations,
                "Worker shutting down.",
                self.config.cancel_timeout_duration(),
            )
            .await;
            if !report.is_clean() {
                warnings.push(cancellation_warning(&report));
            }
        }
        self.dispose_retained(&mut warnings).await;
        self.current = None;
        self.state = ReuseState::Terminated;
        tracing::debug!("Context reuse manager shut down");
        warnings
    }

    async fn dispose_retained(&mut self, warnings: &mut Vec<ReuseWarning>) {
        let previous = std::mem::replace(&mut self.state, ReuseState::Empty);
        match previous {
            ReuseState::Retained(retained) => {
                tracing::debug!(
                    "Disposing browser context {} after {} test(s)",
                    retained.context.guid(),
                    retained.tests_served
                );
                self.close_context(retained.context.as_ref(), warnings).await;
            }
            ReuseState::Terminated => self.state = ReuseState::Terminated,
            ReuseState::Empty => {}
        }
    }

    /// Best-effort close; a failure is a warning, never a test failure.
    async fn close_context(&self, context: &dyn BrowserContext, warnings: &mut Vec<ReuseWarning>) {
        if context.is_closed() {
            return;
        }
        let bound: Duration = self.config.close_timeout_duration();
        let message = match tokio::time::timeout(bound, context.close()).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("closing context {} failed: {}", context.guid(), e),
            Err(_) => format!("closing context {} timed out after {:?}", context.guid(), bound),
        };
        tracing::warn!("{}", message);
        warnings.push(ReuseWarning::new(WarningKind::Close, message));
    }
}

fn construction_error(error: Error) -> Error {
    match error {
        e @ (Error::Construction(_) | Error::Timeout(_)) => e,
        e if e.kind() == FailureKind::Infrastructure => e,
        e => Error::Construction(e.to_string()),
    }
}

fn cancellation_warning(report: &CancellationReport) -> ReuseWarning {
    let message = report
        .timeout_error()
        .map(|e| e.to_string())
        .unwrap_or_default();
    ReuseWarning::new(WarningKind::Cancellation, message)
}
