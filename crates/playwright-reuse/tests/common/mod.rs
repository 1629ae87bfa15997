// Shared helpers for integration tests
#![allow(dead_code)]

use playwright_rs_reuse::protocol::{BrowserContext, Page};
use playwright_rs_reuse::server::{InMemoryBrowser, InMemoryContext, InMemoryPage};
use playwright_rs_reuse::{ContextReuseManager, ManagerConfig, ReuseMode, TestOptions, TestSetup};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Installs a test log subscriber once; filter with RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A manager driving an in-memory browser, writing artifacts to a temp dir
pub struct Harness {
    pub browser: Arc<InMemoryBrowser>,
    pub manager: ContextReuseManager,
    pub artifacts: TempDir,
}

pub fn harness() -> Harness {
    harness_with(|config| config)
}

pub fn harness_with(configure: impl FnOnce(ManagerConfig) -> ManagerConfig) -> Harness {
    init_tracing();
    let artifacts = tempfile::tempdir().expect("Failed to create artifacts dir");
    let browser = Arc::new(InMemoryBrowser::new());
    let config = configure(ManagerConfig::new(artifacts.path()));
    let manager = ContextReuseManager::new(browser.clone(), config);
    Harness {
        browser,
        manager,
        artifacts,
    }
}

/// Options for a test that opts into reuse
pub fn reusable(title: &str) -> TestOptions {
    TestOptions::new(title).reuse_mode(ReuseMode::WhenPossible)
}

pub fn context_of(setup: &TestSetup) -> &InMemoryContext {
    in_memory_context(&setup.context)
}

pub fn in_memory_context(context: &Arc<dyn BrowserContext>) -> &InMemoryContext {
    context
        .as_any()
        .downcast_ref::<InMemoryContext>()
        .expect("context is not an in-memory context")
}

pub fn page_of(setup: &TestSetup) -> &InMemoryPage {
    in_memory_page(setup.page.page())
}

pub fn in_memory_page(page: &Arc<dyn Page>) -> &InMemoryPage {
    page.as_any()
        .downcast_ref::<InMemoryPage>()
        .expect("page is not an in-memory page")
}

/// Every file under `root` with the given extension
pub fn files_with_extension(root: &Path, extension: &str) -> Vec<PathBuf> {
    let pattern = format!("{}/**/*.{}", root.display(), extension);
    let mut found: Vec<PathBuf> = glob::glob(&pattern)
        .expect("Invalid glob pattern")
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    found.sort();
    found
}
