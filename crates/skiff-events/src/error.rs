//! Event emitter error primitives.

use thiserror::Error;

/// Result alias for event handlers.
pub type EventResult = Result<(), EventError>;

/// Error surfaced by a failing event handler.
///
/// Failures never propagate back to the emitter; they are dispatched to the
/// reserved error channel of the owning [`crate::Emitter`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// A subscribed handler reported a failure while processing an event.
    #[error("event handler failed")]
    HandlerFailed {
        /// Event kind string for filtering in logs.
        kind: String,
        /// Human-readable failure detail.
        detail: String,
    },
}

impl EventError {
    /// Build a handler failure for the given event kind.
    #[must_use]
    pub fn handler_failed(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::HandlerFailed {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    /// Event kind string associated with the failure.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::HandlerFailed { kind, .. } => kind,
        }
    }
}
