use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ml::autoencoder::{AutoencoderConfig, TrainingConfig};
use crate::ml::storage::DEFAULT_DATA_DIR;
use crate::server::ServerConfig;
use crate::stream::StreamConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: AutoencoderConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or fall back to defaults
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/netpulse/config.toml"),
            PathBuf::from("netpulse.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the checkpoint, scaler and metadata
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Training table (CSV)
    #[serde(default = "default_training_data")]
    pub training_data: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            training_data: default_training_data(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_training_data() -> PathBuf {
    PathBuf::from("data/train_data.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::WindowScope;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model.seq_len, 30);
        assert_eq!(config.model.hidden_size, 128);
        assert_eq!(config.training.epochs, 80);
        assert_eq!(config.training.batch_size, 64);
        assert_eq!(config.training.threshold_sigma, 2.5);
        assert_eq!(config.stream.interval_ms, 500);
        assert_eq!(config.stream.history_capacity, 500);
        assert_eq!(config.stream.window_scope, WindowScope::Shared);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.paths.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn test_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("netpulse.toml");
        std::fs::write(
            &path,
            r#"
[training]
epochs = 5

[stream]
window_scope = "per_session"

[paths]
data_dir = "/tmp/netpulse"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.batch_size, 64);
        assert_eq!(config.stream.window_scope, WindowScope::PerSession);
        assert_eq!(config.paths.data_dir, PathBuf::from("/tmp/netpulse"));
        assert_eq!(config.paths.training_data, default_training_data());
        assert_eq!(config.model, AutoencoderConfig::default());
    }

    #[test]
    fn test_save_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let mut config = Config::default();
        config.server.port = 9100;
        config.model.hidden_size = 64;
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "[training\nepochs = ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
