//! String-keyed persistent stores the engine can sit on top of.

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Quota exceeded: {requested} bytes requested, limit is {quota} bytes")]
    QuotaExceeded { requested: u64, quota: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Usage reported by a backend that knows its own limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub usage: u64,
    pub quota: u64,
}

impl StorageEstimate {
    /// `usage / quota`, or `None` for a zero quota
    pub fn ratio(&self) -> Option<f64> {
        if self.quota == 0 {
            None
        } else {
            Some(self.usage as f64 / self.quota as f64)
        }
    }
}

/// A synchronous, string-keyed persistent store.
///
/// Implementations must be cheap to call and never block for long; the engine
/// treats every call as an in-process operation.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    /// Usage and quota, if the backend can tell. `None` means "assume space is available".
    fn estimate(&self) -> Option<StorageEstimate> {
        None
    }
}

/// In-process store, optionally capped at a byte quota (keys and values both count)
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    fn usage(items: &HashMap<String, String>) -> u64 {
        items
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut items = self.items.write();
        if let Some(quota) = self.quota {
            let existing = items.get(key).map(|v| (key.len() + v.len()) as u64).unwrap_or(0);
            let requested = Self::usage(&items) - existing + (key.len() + value.len()) as u64;
            if requested > quota {
                return Err(StoreError::QuotaExceeded { requested, quota });
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.items.write().remove(key);
        Ok(())
    }

    fn estimate(&self) -> Option<StorageEstimate> {
        let quota = self.quota?;
        Some(StorageEstimate {
            usage: Self::usage(&self.items.read()),
            quota,
        })
    }
}
