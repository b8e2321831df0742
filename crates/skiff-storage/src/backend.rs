//! Pluggable persistence seams for the typed snapshot.

use crate::error::{StorageError, StorageResult};
use std::path::PathBuf;
use std::sync::Mutex;

/// Where the serialized snapshot lives.
///
/// Reading is total: a backend that cannot produce text reports `None` and
/// the store falls back to its defaults. Writing is fallible.
pub trait StorageBackend: Send + Sync {
    /// Read the persisted snapshot text, if any.
    fn read(&self) -> Option<String>;

    /// Persist the serialized snapshot.
    ///
    /// # Errors
    ///
    /// [`StorageError::Io`] when the backend cannot write.
    fn write(&self, text: &str) -> StorageResult<()>;
}

/// File-backed persistence, one JSON document per store.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Backend persisting to `path`, creating parent directories on write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageBackend for FileBackend {
    fn read(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::debug!(path = %self.path.display(), error = %err, "no persisted snapshot");
                None
            }
        }
    }

    fn write(&self, text: &str) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::io)?;
        }
        std::fs::write(&self.path, text).map_err(StorageError::io)
    }
}

/// In-memory persistence for tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    text: Mutex<Option<String>>,
}

impl MemoryBackend {
    /// Empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with snapshot text.
    #[must_use]
    pub fn seeded(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(Some(text.into())),
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self) -> Option<String> {
        self.text
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn write(&self, text: &str) -> StorageResult<()> {
        *self
            .text
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(text.to_string());
        Ok(())
    }
}
