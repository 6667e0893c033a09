//! Configuration management for Napkin.
//!
//! This module handles loading, saving, and managing Napkin configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/napkin/config.toml` |
//! | macOS | `~/Library/Application Support/com.napkin.Napkin/config.toml` |
//! | Windows | `%APPDATA%\Napkin\Napkin\config\config.toml` |
//!
//! ## Example
//!
//! ```rust,ignore
//! use napkin_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Port range: {}", config.server.port_range);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::port::PortRange;

/// Main configuration struct for Napkin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upload server settings
    pub server: ServerConfig,
    /// Where received images are written
    pub storage: StorageConfig,
}

/// Upload server configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Inclusive range searched for a listening port
    pub port_range: PortRange,
    /// Maximum size of one upload request body, in bytes
    pub max_upload_size: usize,
    /// How long `stop()` waits for in-flight requests before force-closing
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
    /// Stop a session automatically after this long (0s disables)
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,
    /// What the client is told when the upload consumer fails
    pub callback_failure: CallbackFailurePolicy,
    /// Host to put in the session URL instead of the detected LAN address
    pub advertise_host: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port_range: PortRange::default(),
            max_upload_size: crate::DEFAULT_MAX_UPLOAD_SIZE,
            shutdown_grace: Duration::ZERO,
            session_timeout: Duration::from_secs(crate::DEFAULT_SESSION_TIMEOUT_SECS),
            callback_failure: CallbackFailurePolicy::Ignore,
            advertise_host: None,
        }
    }
}

/// Response policy when an upload callback returns an error or panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackFailurePolicy {
    /// Log the failure and still answer `200`; the bytes did arrive
    #[default]
    Ignore,
    /// Answer `502` so the phone knows processing failed
    Report,
}

/// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for received images (current directory when unset)
    pub output_dir: Option<PathBuf>,
    /// Prefix of generated file names
    pub file_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            file_prefix: "physical-note".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Check values that parse fine but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_upload_size == 0 {
            return Err(Error::InvalidConfig {
                key: "max_upload_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.storage.file_prefix.trim().is_empty() {
            return Err(Error::InvalidConfig {
                key: "file_prefix".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "napkin", "Napkin")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

/// Parse a duration string like `"300s"`, `"5m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        secs.parse().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        let mins: u64 = mins.parse().ok()?;
        mins.checked_mul(60).map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        let hours: u64 = hours.parse().ok()?;
        hours.checked_mul(3600).map(Duration::from_secs)
    } else {
        None
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration format '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.server.port_range, PortRange::new(8080, 8090).unwrap());
        assert_eq!(config.server.shutdown_grace, Duration::ZERO);
        assert_eq!(config.server.session_timeout, Duration::from_secs(300));
        assert_eq!(
            config.server.callback_failure,
            CallbackFailurePolicy::Ignore
        );
        assert_eq!(config.storage.file_prefix, "physical-note");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config").join("config.toml");

        let mut original = Config::default();
        original.server.port_range = PortRange::new(9000, 9010).unwrap();
        original.server.shutdown_grace = Duration::from_secs(2);
        original.server.callback_failure = CallbackFailurePolicy::Report;
        original.server.advertise_host = Some("notes.local".to_string());
        original.storage.output_dir = Some(PathBuf::from("/tmp/notes"));

        original.save_to(&config_path).expect("save");
        let loaded = Config::load_from(&config_path).expect("load");

        assert_eq!(loaded.server.port_range, original.server.port_range);
        assert_eq!(loaded.server.shutdown_grace, Duration::from_secs(2));
        assert_eq!(loaded.server.callback_failure, CallbackFailurePolicy::Report);
        assert_eq!(loaded.server.advertise_host.as_deref(), Some("notes.local"));
        assert_eq!(loaded.storage.output_dir, Some(PathBuf::from("/tmp/notes")));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port_range, PortRange::default());
    }

    #[test]
    fn test_config_deserialization_partial() {
        let partial_toml = r#"
[server]
port_range = [7000, 7005]
session_timeout = "10m"
"#;

        let config: Config = toml::from_str(partial_toml).expect("parse partial config");

        assert_eq!(config.server.port_range, PortRange::new(7000, 7005).unwrap());
        assert_eq!(config.server.session_timeout, Duration::from_secs(600));
        assert_eq!(config.server.max_upload_size, crate::DEFAULT_MAX_UPLOAD_SIZE);
        assert_eq!(config.storage.file_prefix, "physical-note");
    }

    #[test]
    fn test_inverted_port_range_rejected() {
        let result: std::result::Result<Config, _> =
            toml::from_str("[server]\nport_range = [9000, 8000]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_upload_size() {
        let mut config = Config::default();
        config.server.max_upload_size = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { ref key, .. }) if key == "max_upload_size"
        ));
    }

    #[test]
    fn test_serialization_format() {
        let toml_str = toml::to_string_pretty(&Config::default()).expect("serialize");

        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("session_timeout = \"300s\""));
        assert!(toml_str.contains("callback_failure = \"ignore\""));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("0s"), Some(Duration::ZERO));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert_eq!(parse_duration("999999999999999999m"), None);
        assert_eq!(parse_duration("999999999999999999h"), None);
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Some(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn test_config_path() {
        assert!(Config::config_path().ends_with("config.toml"));
    }
}
