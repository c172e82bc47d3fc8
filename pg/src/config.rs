//! Protograph configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Lines buffered between the reader and the converter
    #[serde(rename = "buffer-capacity")]
    pub buffer_capacity: usize,

    /// Records between progress log lines (0 disables)
    #[serde(rename = "progress-interval")]
    pub progress_interval: u64,

    /// Output sink configuration
    pub sink: SinkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            buffer_capacity: crate::DEFAULT_BUFFER_CAPACITY,
            progress_interval: 10_000,
            sink: SinkConfig::default(),
        }
    }
}

/// Output sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Mutation service URL; groups are printed as JSON lines when unset
    pub server: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            server: None,
            timeout_ms: 30_000,
        }
    }
}

impl SinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .protograph.yml
        let local_config = PathBuf::from(".protograph.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/protograph/protograph.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("protograph").join("protograph.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.buffer_capacity, 100);
        assert_eq!(config.progress_interval, 10_000);
        assert!(config.sink.server.is_none());
        assert_eq!(config.sink.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("protograph.yml");
        fs::write(
            &path,
            "log-level: debug\nbuffer-capacity: 8\nsink:\n  server: http://localhost:8000/v1/mutate\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.buffer_capacity, 8);
        assert_eq!(config.progress_interval, 10_000);
        assert_eq!(config.sink.server.as_deref(), Some("http://localhost:8000/v1/mutate"));
        assert_eq!(config.sink.timeout_ms, 30_000);
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let path = PathBuf::from("/no/such/protograph.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
