//! In-process browser engine (internal)
//!
//! Implements the control surfaces in [`crate::protocol`] entirely in memory:
//! cookie jar, per-origin storage, routes, chunked tracing, and video files
//! written on page close. Integration tests inject it as the context factory.
//!
//! **Note**: This module is exposed publicly only for integration testing purposes.
//! The types and APIs in this module are considered internal implementation details
//! and may change without notice. User code should not depend on these types directly.

#[doc(hidden)]
pub mod in_memory_browser;
#[doc(hidden)]
pub mod in_memory_context;
#[doc(hidden)]
pub mod in_memory_page;
#[doc(hidden)]
pub mod in_memory_tracing;

pub use in_memory_browser::{InMemoryBrowser, ScriptFn};
pub use in_memory_context::{ClickRecord, InMemoryContext};
pub use in_memory_page::InMemoryPage;
pub use in_memory_tracing::{InMemoryTracing, TraceAction, TraceChunk, TraceSnapshot};
