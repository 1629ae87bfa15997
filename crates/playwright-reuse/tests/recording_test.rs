// Integration tests for per-test traces and videos
//
// These tests cover:
// - Force mode keeps reuse and produces no video
// - WhenPossible mode gives every filmed test its own context and video
// - Trace chunks hold only the actions of their own test
// - Retain-on-failure artifacts are dropped for passing tests
// - Idle trace sessions are stopped or paused per configuration
// - Recording failures are warnings

use playwright_rs_reuse::server::TraceChunk;
use playwright_rs_reuse::{
    IdleTracePolicy, ManagerState, RecreateReason, ReuseDecision, ReuseMode, TestOptions,
    TestOutcome, TestStatus, TraceMode, VideoMode, WarningKind,
};
use std::path::PathBuf;

mod common;

use common::reusable;

#[tokio::test]
async fn test_force_mode_reuses_and_drops_video() -> anyhow::Result<()> {
    let mut h = common::harness();
    let forced = |title: &str| {
        TestOptions::new(title)
            .reuse_mode(ReuseMode::Force)
            .video(VideoMode::On)
    };

    let first = h.manager.setup_test(&forced("first")).await?;
    assert!(common::context_of(&first).video_dir().is_none());
    first.page.goto("https://a.test/").await?;
    let guid = first.context.guid().to_string();
    drop(first);
    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert!(report.artifacts.is_empty());
    assert_eq!(h.manager.state(), ManagerState::Retained);

    let second = h.manager.setup_test(&forced("second")).await?;
    assert!(second.reused);
    assert_eq!(second.context.guid(), guid);
    second.page.goto("https://a.test/").await?;
    drop(second);
    let report = h.manager.on_test_end(TestOutcome::Failed {
        message: "expected 2, got 3".to_string(),
    })
    .await;
    assert_eq!(report.status, TestStatus::Failed);
    assert!(report.artifacts.is_empty());

    h.manager.shutdown().await;
    assert!(common::files_with_extension(h.artifacts.path(), "webm").is_empty());
    Ok(())
}

#[tokio::test]
async fn test_when_possible_gives_each_filmed_test_its_own_video() -> anyhow::Result<()> {
    let mut h = common::harness();
    let filmed = |title: &str| reusable(title).video(VideoMode::On);

    let first = h.manager.setup_test(&filmed("first")).await?;
    assert!(common::context_of(&first).video_dir().is_some());
    first.page.goto("https://a.test/").await?;
    let first_guid = first.context.guid().to_string();
    drop(first);
    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    let first_video = h.artifacts.path().join("first").join("video-1.webm");
    assert_eq!(report.artifacts, vec![first_video.clone()]);
    assert!(first_video.exists());
    assert_eq!(h.manager.state(), ManagerState::Empty);

    let second = h.manager.setup_test(&filmed("second")).await?;
    assert!(!second.reused);
    assert_ne!(second.context.guid(), first_guid);
    drop(second);
    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert_eq!(
        report.artifacts,
        vec![h.artifacts.path().join("second").join("video-1.webm")]
    );

    let videos = common::files_with_extension(h.artifacts.path(), "webm");
    assert_eq!(videos.len(), 2);
    assert!(!h.artifacts.path().join(".videos").join("1").exists());
    Ok(())
}

#[tokio::test]
async fn test_filmed_test_refuses_retained_context() -> anyhow::Result<()> {
    let mut h = common::harness();

    let first = h.manager.setup_test(&reusable("plain")).await?;
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h
        .manager
        .setup_test(&reusable("filmed").video(VideoMode::On))
        .await?;
    assert_eq!(
        second.decision,
        ReuseDecision::Recreate(RecreateReason::RecordingIncompatible)
    );
    Ok(())
}

#[tokio::test]
async fn test_retain_on_failure_video() -> anyhow::Result<()> {
    let mut h = common::harness();
    let filmed = |title: &str| reusable(title).video(VideoMode::RetainOnFailure);

    let passing = h.manager.setup_test(&filmed("passing")).await?;
    drop(passing);
    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert!(report.artifacts.is_empty());

    let failing = h.manager.setup_test(&filmed("failing")).await?;
    drop(failing);
    let report = h.manager.on_test_end(TestOutcome::TimedOut).await;
    assert_eq!(report.status, TestStatus::TimedOut);
    assert_eq!(report.artifacts.len(), 1);

    assert_eq!(
        common::files_with_extension(h.artifacts.path(), "webm"),
        vec![h.artifacts.path().join("failing").join("video-1.webm")]
    );
    Ok(())
}

#[tokio::test]
async fn test_trace_chunks_contain_only_their_test() -> anyhow::Result<()> {
    let mut h = common::harness();
    let traced = |title: &str| reusable(title).trace(TraceMode::On);

    let first = h.manager.setup_test(&traced("first")).await?;
    first.page.goto("https://a.test/").await?;
    first.page.click("#a").await?;
    let first_page = first.page.page().clone();
    drop(first);
    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    let first_trace = h.artifacts.path().join("first").join("trace.json");
    assert_eq!(report.artifacts, vec![first_trace.clone()]);

    let second = h.manager.setup_test(&traced("second")).await?;
    assert!(second.reused);
    second.page.click("#b").await?;
    let second_page = second.page.page().clone();
    let recorder = common::context_of(&second).recorder();
    drop(second);
    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    let second_trace = h.artifacts.path().join("second").join("trace.json");
    assert_eq!(report.artifacts, vec![second_trace.clone()]);

    let chunk = TraceChunk::read(&first_trace).await?;
    let details: Vec<_> = chunk.actions.iter().map(|a| a.detail.as_str()).collect();
    assert_eq!(details, vec!["https://a.test/", "#a"]);
    assert!(chunk.actions.iter().all(|a| a.page_guid == first_page.guid()));

    let chunk = TraceChunk::read(&second_trace).await?;
    assert_eq!(chunk.title.as_deref(), Some("second"));
    let details: Vec<_> = chunk.actions.iter().map(|a| a.detail.as_str()).collect();
    assert_eq!(details, vec!["#b"]);
    assert!(chunk.snapshots.iter().all(|s| s.page_guid == second_page.guid()));

    // One session, chunked per test
    assert_eq!(recorder.sessions_started(), 1);
    Ok(())
}

#[tokio::test]
async fn test_retain_on_failure_trace() -> anyhow::Result<()> {
    let mut h = common::harness();
    let traced = |title: &str| reusable(title).trace(TraceMode::RetainOnFailure);

    let passing = h.manager.setup_test(&traced("passing")).await?;
    passing.page.click("#ok").await?;
    drop(passing);
    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert!(report.artifacts.is_empty());
    assert!(!h.artifacts.path().join("passing").join("trace.json").exists());

    let failing = h.manager.setup_test(&traced("failing")).await?;
    assert!(failing.reused);
    failing.page.click("#broken").await?;
    drop(failing);
    let report = h.manager.on_test_end(TestOutcome::Failed {
        message: "element not visible".to_string(),
    })
    .await;
    let trace: PathBuf = h.artifacts.path().join("failing").join("trace.json");
    assert_eq!(report.artifacts, vec![trace.clone()]);
    let chunk = TraceChunk::read(&trace).await?;
    assert_eq!(chunk.actions.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_trace_kind_mismatch_recreates_when_possible() -> anyhow::Result<()> {
    let mut h = common::harness();

    let first = h
        .manager
        .setup_test(&reusable("traced").trace(TraceMode::On))
        .await?;
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h.manager.setup_test(&reusable("untraced")).await?;
    assert_eq!(
        second.decision,
        ReuseDecision::Recreate(RecreateReason::RecordingIncompatible)
    );
    Ok(())
}

#[tokio::test]
async fn test_idle_context_hosts_traced_test() -> anyhow::Result<()> {
    let mut h = common::harness();

    let first = h.manager.setup_test(&reusable("untraced")).await?;
    first.page.click("#before").await?;
    let guid = first.context.guid().to_string();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h
        .manager
        .setup_test(&reusable("traced").trace(TraceMode::On))
        .await?;
    assert_eq!(second.decision, ReuseDecision::Reuse);
    assert_eq!(second.context.guid(), guid);
    second.page.click("#after").await?;
    let recorder = common::context_of(&second).recorder();
    drop(second);
    let report = h.manager.on_test_end(TestOutcome::Passed).await;

    let trace = h.artifacts.path().join("traced").join("trace.json");
    assert_eq!(report.artifacts, vec![trace.clone()]);
    let chunk = TraceChunk::read(&trace).await?;
    let details: Vec<_> = chunk.actions.iter().map(|a| a.detail.as_str()).collect();
    assert_eq!(details, vec!["#after"]);
    assert_eq!(recorder.sessions_started(), 1);
    Ok(())
}

#[tokio::test]
async fn test_idle_trace_session_stopped_by_default()-> anyhow::Result<()> {
    let mut h = common::harness();
    let forced = |title: &str| TestOptions::new(title).reuse_mode(ReuseMode::Force);

    let first = h.manager.setup_test(&forced("traced").trace(TraceMode::On)).await?;
    let recorder = common::context_of(&first).recorder();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h.manager.setup_test(&forced("idle")).await?;
    assert!(second.reused);
    assert!(!recorder.is_session_active());
    second.page.click("#untraced").await?;
    drop(second);
    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert!(report.artifacts.is_empty());

    let third = h.manager.setup_test(&forced("traced again").trace(TraceMode::On)).await?;
    assert!(third.reused);
    assert!(recorder.is_chunk_open());
    assert_eq!(recorder.sessions_started(), 2);
    Ok(())
}

#[tokio::test]
async fn test_idle_trace_session_paused_when_configured() -> anyhow::Result<()> {
    let mut h = common::harness_with(|config| config.idle_trace(IdleTracePolicy::Pause));
    let forced = |title: &str| TestOptions::new(title).reuse_mode(ReuseMode::Force);

    let first = h.manager.setup_test(&forced("traced").trace(TraceMode::On)).await?;
    let recorder = common::context_of(&first).recorder();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h.manager.setup_test(&forced("idle")).await?;
    assert!(recorder.is_session_active());
    assert!(!recorder.is_chunk_open());
    drop(second);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let third = h.manager.setup_test(&forced("traced again").trace(TraceMode::On)).await?;
    assert!(third.reused);
    assert!(recorder.is_chunk_open());
    assert_eq!(recorder.sessions_started(), 1);
    Ok(())
}

#[tokio::test]
async fn test_trace_write_failure_is_a_warning() -> anyhow::Result<()> {
    let mut h = common::harness();

    let setup = h
        .manager
        .setup_test(&reusable("traced").trace(TraceMode::On))
        .await?;
    common::context_of(&setup).recorder().fail_stop_chunk(true);
    drop(setup);

    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert_eq!(report.status, TestStatus::Passed);
    assert!(report.artifacts.is_empty());
    let warning = report
        .warnings_of(WarningKind::Recording)
        .next()
        .expect("recording warning");
    assert_eq!(warning.hint, "artifacts for this test may be missing or incomplete");
    Ok(())
}
