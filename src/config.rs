//! Configuration management for servertee

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::tee::{LogMode, DEFAULT_SUBSCRIBER_CAPACITY};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// File every record is appended to (`~` is expanded)
    pub log_file: PathBuf,

    /// Whether to append to or truncate an existing log file (default: append)
    #[serde(default)]
    pub log_mode: LogMode,

    /// Records queued per subscriber before new ones are dropped for it (default: 1024)
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,

    /// Port for the record stream HTTP server (default: 9898)
    #[serde(default = "default_stream_port")]
    pub stream_port: u16,

    /// Interval between SSE keep-alive comments in seconds (default: 15)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_subscriber_capacity() -> usize {
    DEFAULT_SUBSCRIBER_CAPACITY
}

fn default_stream_port() -> u16 {
    9898
}

fn default_keep_alive_secs() -> u64 {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: logs_dir().join("servertee.log"),
            log_mode: LogMode::default(),
            subscriber_capacity: default_subscriber_capacity(),
            stream_port: default_stream_port(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl Config {
    /// Load configuration from file, or return default if not found
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config file")?;
        if config.subscriber_capacity == 0 {
            anyhow::bail!("subscriber_capacity must be at least 1");
        }
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Log file path with `~` and environment variables expanded
    pub fn resolved_log_file(&self) -> PathBuf {
        let raw = self.log_file.to_string_lossy();
        match shellexpand::full(&raw) {
            Ok(expanded) => PathBuf::from(expanded.into_owned()),
            Err(e) => {
                tracing::warn!("Could not expand log file path {}: {}", raw, e);
                self.log_file.clone()
            }
        }
    }

    /// SSE keep-alive interval
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

/// Get the base configuration directory (~/.servertee)
/// Falls back to ./.servertee if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".servertee")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".servertee"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the path to the default logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Ensure all required directories exist
pub fn ensure_directories() -> Result<()> {
    std::fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
    std::fs::create_dir_all(logs_dir()).context("Failed to create logs directory")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.stream_port, 9898);
        assert_eq!(config.subscriber_capacity, 1024);
        assert_eq!(config.log_mode, LogMode::Append);
        assert!(config.log_file.ends_with("logs/servertee.log"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = Config::parse(&toml_str).unwrap();
        assert_eq!(config.stream_port, parsed.stream_port);
        assert_eq!(config.log_file, parsed.log_file);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed = Config::parse(r#"log_file = "/var/log/app.log""#).unwrap();
        assert_eq!(parsed.log_file, PathBuf::from("/var/log/app.log"));
        assert_eq!(parsed.log_mode, LogMode::Append);
        assert_eq!(parsed.keep_alive_secs, 15);
    }

    #[test]
    fn test_truncate_mode_parses() {
        let parsed = Config::parse(
            r#"
            log_file = "/tmp/out.log"
            log_mode = "truncate"
            subscriber_capacity = 8
            "#,
        )
        .unwrap();
        assert_eq!(parsed.log_mode, LogMode::Truncate);
        assert_eq!(parsed.subscriber_capacity, 8);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = Config::parse(
            r#"
            log_file = "/tmp/out.log"
            subscriber_capacity = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("subscriber_capacity"));
    }

    #[test]
    fn test_resolved_log_file_expands_tilde() {
        let config = Config {
            log_file: PathBuf::from("~/tee.log"),
            ..Config::default()
        };
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.resolved_log_file(), home.join("tee.log"));
        }
    }

    #[test]
    fn test_keep_alive_never_zero() {
        let config = Config {
            keep_alive_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.keep_alive(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_dir_does_not_panic() {
        let dir = config_dir();
        assert!(dir.ends_with(".servertee"));
    }

    #[test]
    fn test_try_config_dir() {
        if let Some(path) = try_config_dir() {
            assert!(path.ends_with(".servertee"));
        }
    }
}
