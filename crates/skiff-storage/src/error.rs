//! Error types for the typed storage layer.

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Primary error type for storage operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The backend failed to persist the snapshot.
    #[error("failed to persist storage snapshot")]
    Io {
        /// Underlying failure detail.
        detail: String,
    },
    /// A value could not be serialized into the snapshot.
    #[error("failed to encode storage value")]
    Encode {
        /// Underlying failure detail.
        detail: String,
    },
    /// A stored value did not match the requested type.
    #[error("failed to decode storage value")]
    Decode {
        /// Top-level key being read.
        key: String,
        /// Underlying failure detail.
        detail: String,
    },
    /// The requested key has neither a stored value nor a declared default.
    #[error("storage key not declared")]
    MissingKey {
        /// The undeclared key.
        key: String,
    },
}

impl StorageError {
    /// Build a [`StorageError::Io`] from any displayable failure.
    pub fn io(detail: impl std::fmt::Display) -> Self {
        Self::Io {
            detail: detail.to_string(),
        }
    }
}
