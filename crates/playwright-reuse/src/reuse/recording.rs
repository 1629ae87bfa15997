// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Recording Coordinator
//
// Keeps per-test artifacts 1:1 with tests while a context (and its trace
// session) spans many tests. Traces are chunked per test. Videos are tied to
// a context, so a test that records video always owns its context.

use crate::api::{IdleTracePolicy, ManagerConfig, RecordingOptions, ReuseMode, TestOptions};
use crate::error::{Error, Result};
use crate::protocol::{BrowserContext, RecordVideo, TracingStartOptions};
use crate::reuse::fingerprint::RecordingState;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::time::Instant;

/// File name of a test's trace inside its artifact directory
pub const TRACE_FILE: &str = "trace.json";

/// Longest sanitized title used as a directory name
const MAX_TITLE_LEN: usize = 60;

/// Recording a single test attempt actually gets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingPlan {
    pub video: bool,
    pub trace: bool,
}

impl RecordingPlan {
    /// Resolves the plan for one attempt.
    ///
    /// Under [`ReuseMode::Force`] video is dropped so the context stays reusable.
    pub fn new(recording: &RecordingOptions, retry: u32, mode: ReuseMode) -> Self {
        let video = recording.wants_video(retry);
        if video && mode == ReuseMode::Force {
            tracing::debug!("Video disabled for this test to keep the context reusable");
        }
        Self {
            video: video && mode != ReuseMode::Force,
            trace: recording.wants_trace(retry),
        }
    }
}

/// Recording bookkeeping of one context
#[derive(Debug, Default)]
pub struct ContextRecording {
    /// Private directory the engine writes this context's videos to
    pub video_dir: Option<PathBuf>,
    /// A trace session was started and not stopped
    pub session_active: bool,
    /// A chunk is open for the current test
    pub chunk_open: bool,
    /// The last test hosted by the context recorded a trace
    pub last_test_traced: bool,
}

impl ContextRecording {
    pub fn state(&self) -> RecordingState {
        RecordingState {
            video: self.video_dir.is_some(),
            tracing: self.last_test_traced,
        }
    }
}

/// Outcome of closing a test's recordings
#[derive(Debug, Default)]
pub struct RecordingReport {
    /// Files kept in the test's artifact directory
    pub artifacts: Vec<PathBuf>,
    /// Failures; each is an [`Error::Recording`]
    pub failures: Vec<Error>,
}

impl RecordingReport {
    fn fail(&mut self, error: Error) {
        tracing::warn!("Recording step failed: {}", error);
        self.failures.push(match error {
            e @ Error::Recording(_) => e,
            e => Error::Recording(e.to_string()),
        });
    }
}

/// Plans artifact locations and drives trace chunks
#[derive(Debug)]
pub struct RecordingCoordinator {
    artifacts_dir: PathBuf,
    idle_trace: IdleTracePolicy,
    next_video_slot: u64,
}

async fn bounded(deadline: Instant, what: &str, step: impl Future<Output = Result<()>>) -> Result<()> {
    match tokio::time::timeout_at(deadline, step).await {
        Ok(result) => result,
        Err(_) => Err(Error::Recording(format!("{} timed out", what))),
    }
}

impl RecordingCoordinator {
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            artifacts_dir: config.artifacts_dir.clone(),
            idle_trace: config.idle_trace,
            next_video_slot: 0,
        }
    }

    /// Video option for a context about to be constructed, or `None`.
    pub fn construction_video(&mut self, plan: RecordingPlan, options: &RecordingOptions) -> Option<RecordVideo> {
        if !plan.video {
            return None;
        }
        self.next_video_slot += 1;
        Some(RecordVideo {
            dir: self
                .artifacts_dir
                .join(".videos")
                .join(self.next_video_slot.to_string()),
            size: options.video_size,
        })
    }

    /// Artifact directory of one test attempt
    pub fn test_dir(&self, options: &TestOptions) -> PathBuf {
        let mut name = sanitize_title(&options.title);
        if options.retry > 0 {
            name.push_str(&format!("-retry{}", options.retry));
        }
        self.artifacts_dir.join(name)
    }

    /// Opens the test's trace chunk, or applies the idle policy when the test
    /// does not trace.
    ///
    /// Failures are returned as [`Error::Recording`] and never abort setup.
    pub async fn begin_test(
        &self,
        context: &dyn BrowserContext,
        recording: &mut ContextRecording,
        plan: RecordingPlan,
        options: &TestOptions,
        deadline: Instant,
    ) -> Vec<Error> {
        let mut report = RecordingReport::default();
        let tracer = context.tracing();
        recording.last_test_traced = plan.trace;

        if plan.trace {
            if !recording.session_active {
                let start = TracingStartOptions {
                    name: None,
                    screenshots: options.recording.screenshots,
                    snapshots: options.recording.snapshots,
                };
                match bounded(deadline, "starting trace session", tracer.start(&start)).await {
                    Ok(()) => {
                        tracing::debug!("Trace session started on context {}", context.guid());
                        recording.session_active = true;
                    }
                    Err(e) => {
                        report.fail(e);
                        return report.failures;
                    }
                }
            }
            match bounded(
                deadline,
                "starting trace chunk",
                tracer.start_chunk(Some(&options.title)),
            )
            .await
            {
                Ok(()) => {
                    tracing::debug!("Trace chunk opened for '{}'", options.title);
                    recording.chunk_open = true;
                }
                Err(e) => report.fail(e),
            }
        } else if recording.session_active {
            match self.idle_trace {
                IdleTracePolicy::Stop => {
                    match bounded(deadline, "stopping idle trace session", tracer.stop()).await {
                        Ok(()) => tracing::debug!("Idle trace session stopped"),
                        Err(e) => report.fail(e),
                    }
                    recording.session_active = false;
                    recording.chunk_open = false;
                }
                IdleTracePolicy::Pause => {
                    tracing::debug!("Idle trace session kept with no open chunk");
                }
            }
        }

        report.failures
    }

    /// Closes the test's trace chunk into `test_dir`.
    ///
    /// Under retain-on-failure a passing test's chunk is discarded unwritten.
    pub async fn end_test(
        &self,
        context: &dyn BrowserContext,
        recording: &mut ContextRecording,
        options: &TestOptions,
        passed: bool,
        test_dir: &Path,
        deadline: Instant,
    ) -> RecordingReport {
        let mut report = RecordingReport::default();
        if !recording.chunk_open {
            return report;
        }
        recording.chunk_open = false;

        let keep = !passed || options.recording.trace.keeps_on_pass();
        let tracer = context.tracing();
        if !keep {
            if let Err(e) = bounded(deadline, "discarding trace chunk", tracer.stop_chunk(None)).await {
                report.fail(e);
            }
            return report;
        }

        if let Err(e) = tokio::fs::create_dir_all(test_dir).await {
            report.fail(e.into());
            let _ = bounded(deadline, "discarding trace chunk", tracer.stop_chunk(None)).await;
            return report;
        }
        let path = test_dir.join(TRACE_FILE);
        match bounded(deadline, "writing trace chunk", tracer.stop_chunk(Some(&path))).await {
            Ok(()) => {
                tracing::debug!("Trace chunk written to {}", path.display());
                report.artifacts.push(path);
            }
            Err(e) => report.fail(e),
        }
        report
    }

    /// Moves the videos a closed context wrote into `test_dir`, or deletes
    /// them when `keep` is false. The private directory is removed.
    pub async fn collect_videos(&self, video_dir: &Path, test_dir: &Path, keep: bool) -> RecordingReport {
        let mut report = RecordingReport::default();

        let files = match list_videos(video_dir).await {
            Ok(files) => files,
            Err(e) => {
                report.fail(e.context(format!("listing {}", video_dir.display())));
                return report;
            }
        };

        if keep && !files.is_empty() {
            if let Err(e) = tokio::fs::create_dir_all(test_dir).await {
                report.fail(e.into());
            }
        }

        for (index, file) in files.iter().enumerate() {
            if !keep {
                if let Err(e) = tokio::fs::remove_file(file).await {
                    report.fail(e.into());
                }
                continue;
            }
            let target = test_dir.join(format!("video-{}.webm", index + 1));
            match tokio::fs::rename(file, &target).await {
                Ok(()) => {
                    tracing::debug!("Video saved to {}", target.display());
                    report.artifacts.push(target);
                }
                Err(e) => report.fail(e.into()),
            }
        }

        if let Err(e) = tokio::fs::remove_dir_all(video_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", video_dir.display(), e);
            }
        }
        report
    }
}

async fn list_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "webm") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Turns a test title into a directory name: lowercase ASCII alphanumerics
/// separated by single dashes.
pub fn sanitize_title(title: &str) -> String {
    let mut name = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.ends_with('-') {
            name.push('-');
        }
    }
    let mut name: String = name.trim_matches('-').chars().take(MAX_TITLE_LEN).collect();
    while name.ends_with('-') {
        name.pop();
    }
    if name.is_empty() {
        name.push_str("test");
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TraceMode, VideoMode};

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("checkout > pays with card"), "checkout-pays-with-card");
        assert_eq!(sanitize_title("  Login: OK!  "), "login-ok");
        assert_eq!(sanitize_title("???"), "test");
        assert!(sanitize_title(&"a b ".repeat(100)).len() <= MAX_TITLE_LEN);
    }

    #[test]
    fn test_plan_drops_video_under_force() {
        let recording = RecordingOptions {
            video: VideoMode::On,
            trace: TraceMode::On,
            ..RecordingOptions::default()
        };

        let forced = RecordingPlan::new(&recording, 0, ReuseMode::Force);
        assert_eq!(forced, RecordingPlan { video: false, trace: true });

        let possible = RecordingPlan::new(&recording, 0, ReuseMode::WhenPossible);
        assert_eq!(possible, RecordingPlan { video: true, trace: true });
    }

    #[test]
    fn test_test_dir_and_video_slots() {
        let mut coordinator = RecordingCoordinator::new(&ManagerConfig::new("/results"));
        let options = TestOptions::new("Cart / adds item").retry(2);
        assert_eq!(
            coordinator.test_dir(&options),
            PathBuf::from("/results/cart-adds-item-retry2")
        );

        let plan = RecordingPlan { video: true, trace: false };
        let first = coordinator.construction_video(plan, &RecordingOptions::default());
        let second = coordinator.construction_video(plan, &RecordingOptions::default());
        assert_eq!(first.map(|v| v.dir), Some(PathBuf::from("/results/.videos/1")));
        assert_eq!(second.map(|v| v.dir), Some(PathBuf::from("/results/.videos/2")));
        assert!(
            coordinator
                .construction_video(RecordingPlan::default(), &RecordingOptions::default())
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_collect_videos_moves_and_numbers_files() {
        let root = tempfile::tempdir().unwrap();
        let private = root.path().join(".videos/1");
        tokio::fs::create_dir_all(&private).await.unwrap();
        tokio::fs::write(private.join("b.webm"), b"b").await.unwrap();
        tokio::fs::write(private.join("a.webm"), b"a").await.unwrap();

        let coordinator = RecordingCoordinator::new(&ManagerConfig::new(root.path()));
        let test_dir = root.path().join("t");
        let report = coordinator.collect_videos(&private, &test_dir, true).await;

        assert!(report.failures.is_empty());
        assert_eq!(
            report.artifacts,
            vec![test_dir.join("video-1.webm"), test_dir.join("video-2.webm")]
        );
        assert_eq!(tokio::fs::read(test_dir.join("video-1.webm")).await.unwrap(), b"a");
        assert!(!private.exists());
    }

    #[tokio::test]
    async fn test_collect_videos_deletes_when_not_kept() {
        let root = tempfile::tempdir().unwrap();
        let private = root.path().join(".videos/1");
        tokio::fs::create_dir_all(&private).await.unwrap();
        tokio::fs::write(private.join("page.webm"), b"v").await.unwrap();

        let coordinator = RecordingCoordinator::new(&ManagerConfig::new(root.path()));
        let test_dir = root.path().join("t");
        let report = coordinator.collect_videos(&private, &test_dir, false).await;

        assert!(report.artifacts.is_empty());
        assert!(!test_dir.exists());
        assert!(!private.exists());
    }
}
