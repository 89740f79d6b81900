//! # Configuration
//!
//! Teleinfo reads a small TOML file. Every field has a default, so an empty
//! file (or a missing section) is a valid configuration.
//!
//! ```toml
//! [serial]
//! device = "/dev/ttyUSB0"
//!
//! [poll]
//! interval_secs = 10
//! with_datetime = true
//!
//! [logging]
//! level = "info"
//! file = "teleinfo.log"
//! # dump_dir = "/tmp"   # keep raw bytes of rejected frames
//! ```
//!
//! The wire format itself (9600 baud, 7E1) is fixed by the protocol and has
//! no setting. Command line flags override file values:
//! CLI args > config file > defaults.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device the meter is wired to.
    #[serde(default = "default_device")]
    pub device: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
        }
    }
}

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Pause between two poll cycles, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Publish `<label>.datetime` entries for dated messages.
    #[serde(default = "default_with_datetime")]
    pub with_datetime: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            with_datetime: default_with_datetime(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_with_datetime() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
    /// Directory receiving raw dumps of rejected frames.
    #[serde(default)]
    pub dump_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            dump_dir: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial.device.trim().is_empty() {
            bail!("serial.device must not be empty");
        }
        if self.poll.interval_secs == 0 {
            bail!("poll.interval_secs must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.serial.device, "/dev/ttyUSB0");
        assert_eq!(config.poll.interval_secs, 10);
        assert!(config.poll.with_datetime);
        assert_eq!(config.poll.interval(), Duration::from_secs(10));
        assert!(config.logging.dump_dir.is_none());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("[poll]\ninterval_secs = 3\n").unwrap();
        assert_eq!(config.poll.interval_secs, 3);
        assert!(config.poll.with_datetime);
        assert_eq!(config.serial, SerialConfig::default());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = Config::default();
        config.poll.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_device_is_rejected() {
        let mut config = Config::default();
        config.serial.device = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
