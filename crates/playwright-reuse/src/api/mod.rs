// Public configuration types
//
// Everything the runner resolves before a test starts: the per-test options
// and the worker-wide manager configuration. Both follow the builder style
// and deserialize from camelCase JSON.

pub mod manager_config;
pub mod test_options;

pub use manager_config::{
    DEFAULT_CANCEL_TIMEOUT_MS, DEFAULT_CLOSE_TIMEOUT_MS, IdleTracePolicy, ManagerConfig,
    REUSE_CONTEXT_ENV, ReuseMode,
};
pub use test_options::{ArtifactMode, RecordingOptions, TestOptions, TraceMode, VideoMode};
