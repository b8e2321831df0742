//! Response envelope shared by every backend endpoint.

use serde::{Deserialize, Serialize};

/// Envelope code signalling success.
pub const CODE_OK: i64 = 0;

/// Envelope code signalling an expired session credential.
pub const CODE_SESSION_EXPIRED: i64 = 900;

/// The `{code, msg, data}` wrapper around every remote response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    /// Backend status code; [`CODE_OK`] means success.
    pub code: i64,
    /// Server-provided message, meaningful on failure.
    #[serde(default)]
    pub msg: String,
    /// Payload, present on success.
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Build a success envelope around a payload.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_OK,
            msg: String::new(),
            data: Some(data),
        }
    }

    /// Build a failure envelope with a code and message.
    #[must_use]
    pub fn err(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}
