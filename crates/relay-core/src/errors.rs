//! Error taxonomy for the relay pipeline.
//!
//! Only [`RelayError::InvalidArgument`] ever reaches a caller synchronously
//! (registration and construction). I/O and callback failures are caught at
//! the sink/subscriber boundary and surface as log entries instead.

use thiserror::Error;

/// Errors produced by pipeline components.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A required identifier was empty, or a capacity was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// File-system failure inside a sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sink reported a failure of its own.
    #[error("sink {sink} failed: {message}")]
    Sink {
        /// Sink name.
        sink: String,
        /// Failure description.
        message: String,
    },

    /// A sink, subscriber, or queued item panicked.
    #[error("callback {callee} panicked: {message}")]
    Callback {
        /// Name of the callee that panicked.
        callee: String,
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl RelayError {
    /// Shorthand for [`RelayError::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Build a [`RelayError::Callback`] from a caught panic payload.
    #[must_use]
    pub fn from_panic(callee: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        Self::Callback {
            callee: callee.into(),
            message: panic_message(payload),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Best-effort extraction of a panic payload's message.
#[must_use]
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
