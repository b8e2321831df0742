//! Process-wide current-credential cell.

use std::sync::{Arc, RwLock};

/// Shared accessor for the current authorization token.
///
/// Login, logout and expiry all mutate the same cell; transports read it at
/// dispatch time, so a call issued before a token change still sends the
/// current value. Nothing captures the token at construction.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    token: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    /// Construct an empty credential cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a cell seeded with a token, e.g. restored from storage.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let cell = Self::new();
        cell.set_token(token);
        cell
    }

    /// Replace the current token.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut slot = self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = if token.is_empty() { None } else { Some(token) };
    }

    /// Drop the current token, e.g. on logout or expiry.
    pub fn clear(&self) {
        let mut slot = self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = None;
    }

    /// Read the current token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}
