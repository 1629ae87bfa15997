// Integration tests for the reuse decision and context identity
//
// These tests cover:
// - Identical construction options reuse the same context
// - Any differing construction option yields a new context
// - Disabled mode closes the context after every test
// - A context closed between tests is replaced and the replacement is reported
// - Every test gets a fresh page, even from a reused context
// - Shutdown is terminal

use playwright_rs_reuse::protocol::{BrowserContext, ContextOptions, Viewport};
use playwright_rs_reuse::{
    Error, ManagerState, RecreateReason, ReuseDecision, ReuseMode, TestOptions, TestOutcome,
    TestStatus, WarningKind,
};

mod common;

use common::reusable;

#[tokio::test]
async fn test_identical_fingerprint_reuses_context() -> anyhow::Result<()> {
    let mut h = common::harness();
    let options = |title: &str| reusable(title).context(ContextOptions::new().locale("en-US"));

    let first = h.manager.setup_test(&options("first")).await?;
    assert_eq!(first.decision, ReuseDecision::Create);
    assert!(!first.reused);
    let guid = first.context.guid().to_string();
    drop(first);

    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert_eq!(report.status, TestStatus::Passed);
    assert!(!report.has_warnings());
    assert_eq!(h.manager.state(), ManagerState::Retained);

    let second = h.manager.setup_test(&options("second")).await?;
    assert_eq!(second.decision, ReuseDecision::Reuse);
    assert!(second.reused);
    assert_eq!(second.context.guid(), guid);
    drop(second);

    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert!(report.reused);
    assert_eq!(report.context_guid.as_deref(), Some(guid.as_str()));
    assert_eq!(h.manager.retained_test_count(), 2);
    assert_eq!(h.browser.contexts().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_any_differing_field_creates_new_context() -> anyhow::Result<()> {
    let mut h = common::harness();
    let base = ContextOptions::new().viewport(Viewport {
        width: 1280,
        height: 720,
    });

    let first = h.manager.setup_test(&reusable("first").context(base.clone())).await?;
    let first_guid = first.context.guid().to_string();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h
        .manager
        .setup_test(&reusable("second").context(base.clone().color_scheme("dark")))
        .await?;
    assert_eq!(
        second.decision,
        ReuseDecision::Recreate(RecreateReason::FingerprintMismatch {
            fields: vec!["colorScheme".to_string()]
        })
    );
    assert!(!second.reused);
    assert_ne!(second.context.guid(), first_guid);
    // An ordinary mismatch is not a warning
    assert!(second.warnings.is_empty());
    drop(second);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let old = h.browser.context(&first_guid).expect("first context");
    assert!(old.is_closed());
    assert_eq!(h.browser.open_contexts().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_force_mode_still_requires_matching_fingerprint() -> anyhow::Result<()> {
    let mut h = common::harness();
    let forced = |title: &str| TestOptions::new(title).reuse_mode(ReuseMode::Force);

    let first = h.manager.setup_test(&forced("first")).await?;
    let first_guid = first.context.guid().to_string();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h
        .manager
        .setup_test(&forced("second").context(ContextOptions::new().has_touch(true)))
        .await?;
    assert_ne!(second.context.guid(), first_guid);
    Ok(())
}

#[tokio::test]
async fn test_disabled_mode_never_retains() -> anyhow::Result<()> {
    let mut h = common::harness();

    let first = h.manager.setup_test(&TestOptions::new("first")).await?;
    let first_guid = first.context.guid().to_string();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;
    assert_eq!(h.manager.state(), ManagerState::Empty);
    assert!(h.browser.context(&first_guid).expect("context").is_closed());

    let second = h.manager.setup_test(&TestOptions::new("second")).await?;
    assert_eq!(second.decision, ReuseDecision::Create);
    assert_ne!(second.context.guid(), first_guid);
    Ok(())
}

#[tokio::test]
async fn test_worker_override_enables_reuse() -> anyhow::Result<()> {
    let mut h = common::harness_with(|config| config.reuse_mode_override(ReuseMode::WhenPossible));

    let first = h.manager.setup_test(&TestOptions::new("first")).await?;
    let guid = first.context.guid().to_string();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h.manager.setup_test(&TestOptions::new("second")).await?;
    assert!(second.reused);
    assert_eq!(second.context.guid(), guid);
    Ok(())
}

#[tokio::test]
async fn test_next_test_with_reuse_disabled_recreates() -> anyhow::Result<()> {
    let mut h = common::harness();

    let first = h.manager.setup_test(&reusable("first")).await?;
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h.manager.setup_test(&TestOptions::new("second")).await?;
    assert_eq!(
        second.decision,
        ReuseDecision::Recreate(RecreateReason::ReuseDisabled)
    );
    Ok(())
}

#[tokio::test]
async fn test_context_closed_between_tests_is_replaced() -> anyhow::Result<()> {
    let mut h = common::harness();

    let first = h.manager.setup_test(&reusable("first")).await?;
    let first_guid = first.context.guid().to_string();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    // Simulates a browser-side crash of the retained context
    h.browser
        .context(&first_guid)
        .expect("context")
        .close()
        .await?;

    let second = h.manager.setup_test(&reusable("second")).await?;
    assert_eq!(
        second.decision,
        ReuseDecision::Recreate(RecreateReason::ContextClosed)
    );
    assert_ne!(second.context.guid(), first_guid);
    let warning = second
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::Recreated)
        .expect("recreated warning");
    assert_eq!(warning.hint, "context could not be reused; recreated");
    drop(second);

    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert_eq!(report.status, TestStatus::Passed);
    assert_eq!(report.warnings_of(WarningKind::Recreated).count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_context_closed_by_test_body_is_released() -> anyhow::Result<()> {
    let mut h = common::harness();

    let first = h.manager.setup_test(&reusable("first")).await?;
    first.context.close().await?;
    drop(first);

    let report = h.manager.on_test_end(TestOutcome::Passed).await;
    assert_eq!(report.status, TestStatus::Passed);
    assert_eq!(h.manager.state(), ManagerState::Empty);

    let second = h.manager.setup_test(&reusable("second")).await?;
    assert_eq!(second.decision, ReuseDecision::Create);
    Ok(())
}

#[tokio::test]
async fn test_reused_context_hands_out_fresh_page() -> anyhow::Result<()> {
    let mut h = common::harness();

    let first = h.manager.setup_test(&reusable("first")).await?;
    first.page.goto("https://a.test/").await?;
    let extra = first.context.new_page().await?;
    extra.goto("https://b.test/").await?;
    let first_page = first.page.page().clone();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let second = h.manager.setup_test(&reusable("second")).await?;
    assert!(second.reused);
    assert_ne!(second.page.page().guid(), first_page.guid());
    assert_eq!(second.page.url(), "about:blank");
    assert!(first_page.is_closed());
    assert!(extra.is_closed());

    let pages = second.context.pages();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].guid(), second.page.page().guid());
    Ok(())
}

#[tokio::test]
async fn test_shutdown_is_terminal() -> anyhow::Result<()> {
    let mut h = common::harness();

    let first = h.manager.setup_test(&reusable("first")).await?;
    let guid = first.context.guid().to_string();
    drop(first);
    h.manager.on_test_end(TestOutcome::Passed).await;

    let warnings = h.manager.shutdown().await;
    assert!(warnings.is_empty());
    assert_eq!(h.manager.state(), ManagerState::Terminated);
    assert!(h.browser.context(&guid).expect("context").is_closed());

    let result = h.manager.setup_test(&reusable("after")).await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    Ok(())
}
