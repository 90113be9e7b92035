use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Where on disk the engine keeps its data
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        match dirs::data_dir() {
            Some(dir) => Self::new(dir.join("outbox")),
            None => Self::new("outbox_data"),
        }
    }
}

/// Tunables for the storage engine. Every field has a default, so `{}` is a valid
/// config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Namespace for every persisted key (`<prefix>:offline-queue`, ...)
    pub key_prefix: String,
    pub max_messages: usize,
    pub max_drafts: usize,
    pub max_queue_size: usize,
    pub auto_save_delay_ms: u64,
    /// Backoff schedule; the last entry is reused once retries run past the end
    pub retry_delays_ms: Vec<u64>,
    pub default_max_retries: u32,
    pub quota_warning_ratio: f64,
    pub exhausted_retention_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_prefix: constants::DEFAULT_KEY_PREFIX.to_string(),
            max_messages: constants::MAX_MESSAGES,
            max_drafts: constants::MAX_DRAFTS,
            max_queue_size: constants::MAX_QUEUE_SIZE,
            auto_save_delay_ms: constants::AUTO_SAVE_DELAY_MS,
            retry_delays_ms: constants::RETRY_DELAYS_MS.to_vec(),
            default_max_retries: constants::DEFAULT_MAX_RETRIES,
            quota_warning_ratio: constants::STORAGE_QUOTA_WARNING,
            exhausted_retention_ms: constants::EXHAUSTED_RETENTION_MS,
        }
    }
}

impl EngineConfig {
    /// Load and validate a config from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("keyPrefix must not be empty".into()));
        }
        if self.max_messages == 0 || self.max_drafts == 0 || self.max_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "collection limits must be greater than zero".into(),
            ));
        }
        if self.retry_delays_ms.is_empty() {
            return Err(ConfigError::Invalid("retryDelaysMs must not be empty".into()));
        }
        if self.default_max_retries == 0 {
            return Err(ConfigError::Invalid(
                "defaultMaxRetries must be greater than zero".into(),
            ));
        }
        if !(self.quota_warning_ratio > 0.0 && self.quota_warning_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "quotaWarningRatio must be in (0, 1], got {}",
                self.quota_warning_ratio
            )));
        }
        Ok(())
    }

    pub fn auto_save_delay(&self) -> Duration {
        Duration::from_millis(self.auto_save_delay_ms)
    }
}
