//! Directory-backed key-value store.
//!
//! Each key lives in its own `<sanitized key>.json` file inside the data directory.
//! Writes go to a temp file first and are then renamed over the target, so an
//! interrupted write never leaves a half-written value behind.

use std::path::{Path, PathBuf};

use super::kv::{KeyValueStore, StorageEstimate, StoreError};

const FILE_EXTENSION: &str = "json";

pub struct FileStore {
    dir: PathBuf,
    quota: Option<u64>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, quota: None })
    }

    /// Cap the total size of the stored values
    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.{}", name, FILE_EXTENSION))
    }

    /// Total size of every value file in the directory
    fn usage(&self) -> Result<u64, StoreError> {
        let mut total = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION) {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);

        if let Some(quota) = self.quota {
            let existing = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let requested = self.usage()?.saturating_sub(existing) + value.len() as u64;
            if requested > quota {
                return Err(StoreError::QuotaExceeded { requested, quota });
            }
        }

        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, value)?;
        std::fs::rename(&temp, &path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()), // Already gone is success
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn estimate(&self) -> Option<StorageEstimate> {
        let quota = self.quota?;
        let usage = self.usage().ok()?;
        Some(StorageEstimate { usage, quota })
    }
}
