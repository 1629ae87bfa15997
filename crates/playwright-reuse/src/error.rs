// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Error types for playwright-rs-reuse

use thiserror::Error;

/// Result type alias for context reuse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing, reusing, or releasing a browser context
#[derive(Debug, Error)]
pub enum Error {
    /// Context or page construction failed
    ///
    /// Surfaced as an infrastructure failure: the test is aborted before its body
    /// runs and is reported separately from assertion failures.
    #[error("Failed to construct browser context: {0}")]
    Construction(String),

    /// Storage clearing or seeding failed for an origin
    ///
    /// Recovered locally. The test proceeds but its report carries a warning that
    /// origin-scoped cleanliness could not be guaranteed.
    #[error("Storage reset failed for '{origin}': {message}")]
    Reset { origin: String, message: String },

    /// One or more pending operations ignored their abort signal within the bound
    ///
    /// The operations are abandoned and the retained context is disposed.
    #[error(
        "Cancellation timed out: {} operation(s) abandoned ({})",
        .abandoned.len(),
        .abandoned.join(", ")
    )]
    CancellationTimeout { abandoned: Vec<String> },

    /// Trace or video start/stop/collect failed
    #[error("Recording error: {0}")]
    Recording(String),

    /// A tracked operation was cancelled at a test boundary
    ///
    /// Distinct from a test failure; see [`Error::is_cancellation`].
    #[error("Operation '{label}' cancelled: {reason}")]
    OperationCancelled { label: String, reason: String },

    /// A suspending step exceeded the test's time budget
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Target was closed (context or page)
    #[error("Target closed: Cannot perform operation on closed {target_type}. {context}")]
    TargetClosed {
        target_type: String,
        context: String,
    },

    /// Navigation did not commit
    #[error("Navigation to '{url}' failed: {message}")]
    NavigationFailed { url: String, message: String },

    /// Script evaluation failed in the page
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// Invalid argument provided to method
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error with additional context
    #[error("{0}: {1}")]
    Context(String, #[source] Box<Error>),
}

/// Reporting category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The worker could not provide a usable context; not caused by the test body
    Infrastructure,
    /// An operation was stopped because its test ended
    Cancellation,
    /// The browser surface rejected an operation issued by the test
    Collaborator,
}

impl Error {
    /// Adds context to the error
    pub fn context(self, msg: impl Into<String>) -> Self {
        Error::Context(msg.into(), Box::new(self))
    }

    /// Returns true if this error is the cancellation signal of a test boundary
    pub fn is_cancellation(&self) -> bool {
        match self {
            Error::OperationCancelled { .. } => true,
            Error::Context(_, inner) => inner.is_cancellation(),
            _ => false,
        }
    }

    /// Classifies the error for reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Construction(_)
            | Error::Reset { .. }
            | Error::CancellationTimeout { .. }
            | Error::Recording(_)
            | Error::Timeout(_) => FailureKind::Infrastructure,
            Error::OperationCancelled { .. } => FailureKind::Cancellation,
            Error::Context(_, inner) => inner.kind(),
            _ => FailureKind::Collaborator,
        }
    }

    pub(crate) fn target_closed(target_type: &str, context: impl Into<String>) -> Self {
        Error::TargetClosed {
            target_type: target_type.to_string(),
            context: context.into(),
        }
    }
}
