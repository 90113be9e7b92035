use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use outbox_core::{CoreConfig, EngineConfig};
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Directory holding the store files; defaults to the platform data dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Byte budget for the store, enables quota-pressure cleanup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<u64>,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: CliConfig = serde_json::from_str(json).context("Failed to deserialize config")?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn core(&self) -> CoreConfig {
        match &self.data_dir {
            Some(dir) => CoreConfig::new(dir),
            None => CoreConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_minimal() {
        let config = CliConfig::from_json("{}").unwrap();
        assert!(config.data_dir.is_none());
        assert!(config.quota_bytes.is_none());
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_parse_config_full() {
        let json = r#"{
            "dataDir": "/tmp/outbox-test",
            "quotaBytes": 1048576,
            "engine": { "keyPrefix": "chat", "maxDrafts": 10 }
        }"#;
        let config = CliConfig::from_json(json).unwrap();
        assert_eq!(config.core().data_dir, PathBuf::from("/tmp/outbox-test"));
        assert_eq!(config.quota_bytes, Some(1_048_576));
        assert_eq!(config.engine.key_prefix, "chat");
        assert_eq!(config.engine.max_drafts, 10);
        assert_eq!(config.engine.max_messages, 1000);
    }

    #[test]
    fn test_invalid_engine_config_rejected() {
        let err = CliConfig::from_json(r#"{"engine": {"retryDelaysMs": []}}"#).unwrap_err();
        assert!(err.to_string().contains("retryDelaysMs"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
