use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::kv::{KeyValueStore, StorageEstimate};

/// Typed, fail-soft JSON access to a [`KeyValueStore`].
///
/// Reads never fail: missing, unreadable or corrupt values come back as
/// `T::default()`. Writes report success as a `bool`; a `false` means nothing
/// was persisted.
pub struct Persistence {
    backend: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    pub fn read<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let raw = match self.backend.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read stored value, using default");
                return T::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value is corrupt, using default");
                T::default()
            }
        }
    }

    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(key, error = %e, "failed to serialize value");
                return false;
            }
        };

        match self.backend.set_item(key, &json) {
            Ok(()) => {
                tracing::debug!(key, bytes = json.len(), "persisted");
                true
            }
            Err(e) => {
                tracing::error!(key, error = %e, "failed to persist value");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove_item(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to remove value");
                false
            }
        }
    }

    /// Size in bytes of the raw stored value (0 when absent or unreadable)
    pub fn raw_len(&self, key: &str) -> u64 {
        match self.backend.get_item(key) {
            Ok(Some(raw)) => raw.len() as u64,
            _ => 0,
        }
    }

    pub fn estimate(&self) -> Option<StorageEstimate> {
        self.backend.estimate()
    }
}
