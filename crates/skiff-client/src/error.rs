//! Error taxonomy for remote calls.

use thiserror::Error;

/// Result alias for remote-call operations.
pub type RequestResult<T> = Result<T, RequestError>;

/// Primary error type for remote-call operations.
///
/// `Validation` and `Busy` resolve locally to the caller and are never
/// broadcast; `Protocol`, `Transport` and `Parse` additionally surface on the
/// owning operation's event channel. `SessionExpired` bypasses generic error
/// reporting and is funnelled through the [`crate::ExpiryNotifier`] instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The transport could not complete the round trip.
    #[error("transport failure")]
    Transport {
        /// Human-readable failure detail.
        detail: String,
    },
    /// The backend answered with a non-zero envelope code.
    #[error("protocol failure")]
    Protocol {
        /// Envelope code returned by the backend.
        code: i64,
        /// Server-provided message.
        msg: String,
    },
    /// The backend answered with the session-expired sentinel code.
    #[error("session expired")]
    SessionExpired,
    /// A client-side precondition failed before dispatch.
    #[error("validation failed")]
    Validation {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A call was issued while another one was in flight on the same
    /// operation.
    #[error("operation already in flight")]
    Busy,
    /// A payload could not be reshaped into the expected form.
    #[error("payload parse failure")]
    Parse {
        /// Human-readable failure detail.
        detail: String,
    },
}

impl RequestError {
    /// Build a transport failure from any displayable source.
    #[must_use]
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport {
            detail: detail.into(),
        }
    }

    /// Build a parse failure from any displayable source.
    #[must_use]
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::Parse {
            detail: detail.into(),
        }
    }

    /// Short text suitable for a user-facing notice.
    ///
    /// Protocol failures carry the server message; everything else falls back
    /// to a generic phrase.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Protocol { msg, .. } if !msg.is_empty() => msg.clone(),
            Self::SessionExpired => "session expired, sign in again".to_string(),
            Self::Validation { field, reason } => format!("{field}: {reason}"),
            _ => "request failed, try again later".to_string(),
        }
    }
}
