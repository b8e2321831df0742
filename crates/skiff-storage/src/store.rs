//! The typed snapshot store.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One persisted JSON object, overlaid onto declared defaults.
///
/// Construction never fails: absent or unparseable persisted text yields the
/// defaults wholesale, and a present top-level key replaces its default
/// without deep merging. Writes re-serialize the full snapshot; the store
/// assumes a single writer, last writer wins.
pub struct TypedStorage {
    backend: Arc<dyn StorageBackend>,
    defaults: Map<String, Value>,
    snapshot: Mutex<Map<String, Value>>,
}

impl TypedStorage {
    /// Load the snapshot from `backend`, overlaying `defaults`.
    pub fn load(backend: Arc<dyn StorageBackend>, defaults: Map<String, Value>) -> Self {
        let mut snapshot = defaults.clone();
        match backend.read() {
            Some(text) => match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(persisted) => {
                    for (key, value) in persisted {
                        snapshot.insert(key, value);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "persisted snapshot unparseable, using defaults");
                }
            },
            None => {
                tracing::debug!("no persisted snapshot, using defaults");
            }
        }
        Self {
            backend,
            defaults,
            snapshot: Mutex::new(snapshot),
        }
    }

    /// Read and decode one top-level key.
    ///
    /// # Errors
    ///
    /// [`StorageError::MissingKey`] when the key was never stored nor
    /// declared, [`StorageError::Decode`] when the stored value does not
    /// match `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<T> {
        let value = self
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::MissingKey {
                key: key.to_string(),
            })?;
        serde_json::from_value(value).map_err(|err| StorageError::Decode {
            key: key.to_string(),
            detail: err.to_string(),
        })
    }

    /// Replace one top-level key and persist the full snapshot.
    ///
    /// # Errors
    ///
    /// [`StorageError::Encode`] when the value cannot be serialized,
    /// [`StorageError::Io`] when persisting fails.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let value = serde_json::to_value(value).map_err(|err| StorageError::Encode {
            detail: err.to_string(),
        })?;
        let mut snapshot = self.lock();
        snapshot.insert(key.to_string(), value);
        self.persist(&snapshot)
    }

    /// Restore one top-level key to its declared default and persist.
    ///
    /// # Errors
    ///
    /// [`StorageError::MissingKey`] when the key has no declared default,
    /// [`StorageError::Io`] when persisting fails.
    pub fn clear(&self, key: &str) -> StorageResult<()> {
        let default = self
            .defaults
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::MissingKey {
                key: key.to_string(),
            })?;
        let mut snapshot = self.lock();
        snapshot.insert(key.to_string(), default);
        self.persist(&snapshot)
    }

    fn persist(&self, snapshot: &Map<String, Value>) -> StorageResult<()> {
        let text = serde_json::to_string(snapshot).map_err(|err| StorageError::Encode {
            detail: err.to_string(),
        })?;
        self.backend.write(&text)
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
