//! playwright-reuse: Browser context reuse across sequential tests
//!
//! A test worker that runs many tests one after another can keep a single
//! browser context alive between them instead of paying for a new one per test.
//! This crate decides when that is safe and restores the context to a clean
//! state in between:
//!
//! - **Fingerprint**: construction options of the retained context must equal
//!   those of the next test, field for field.
//! - **Cancellation**: operations the previous test left running are stopped,
//!   or abandoned and the context disposed.
//! - **Storage reset**: storage of every origin the previous test touched is
//!   cleared, cookies are dropped, and the next test's declared storage state
//!   is seeded.
//! - **Recording**: traces are chunked per test; video forces a fresh context
//!   (or is disabled under [`ReuseMode::Force`]).
//!
//! # Example
//!
//! ```ignore
//! use playwright_rs_reuse::{ContextReuseManager, ManagerConfig, ReuseMode, TestOptions, TestOutcome};
//! use std::sync::Arc;
//!
//! # async fn run(factory: Arc<dyn playwright_rs_reuse::ContextFactory>) -> playwright_rs_reuse::Result<()> {
//! let config = ManagerConfig::new("test-results").apply_env();
//! let mut manager = ContextReuseManager::new(factory, config);
//!
//! for title in ["adds item", "removes item"] {
//!     let options = TestOptions::new(title).reuse_mode(ReuseMode::WhenPossible);
//!     let setup = manager.setup_test(&options).await?;
//!     setup.page.goto("https://shop.example/cart").await?;
//!     let report = manager.on_test_end(TestOutcome::Passed).await;
//!     println!("{} reused={} warnings={:?}", report.title, report.reused, report.warnings);
//! }
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Internal modules (exposed for integration tests)
#[doc(hidden)]
pub mod server;

pub mod api;
mod error;
pub mod protocol;
pub mod reuse;

/// Default test timeout in milliseconds.
///
/// Matches Playwright Test's default per-test timeout. The timeout also bounds
/// context setup for the test.
///
/// See: <https://playwright.dev/docs/test-timeouts>
pub const DEFAULT_TIMEOUT_MS: f64 = 30000.0;

// Re-export error types
pub use error::{Error, FailureKind, Result};

// Re-export configuration
pub use api::{
    ArtifactMode, IdleTracePolicy, ManagerConfig, REUSE_CONTEXT_ENV, RecordingOptions, ReuseMode,
    TestOptions, TraceMode, VideoMode,
};

// Re-export control surfaces
pub use protocol::{
    BrowserContext, ContextFactory, ContextLaunchOptions, ContextOptions, Cookie, Geolocation,
    LocalStorageItem, Origin, Page, ProxySettings, RecordVideo, RouteDecision, StorageState,
    Tracing, TracingStartOptions, Viewport, route_handler,
};

// Re-export the manager and its reports
pub use reuse::{
    CancelOutcome, ContextFingerprint, ContextReuseManager, ManagerState, OperationKind,
    PendingOperations, RecreateReason, ReuseDecision, ReuseWarning, TestOutcome, TestReport,
    TestSetup, TestStatus, TrackedPage, WarningKind,
};
