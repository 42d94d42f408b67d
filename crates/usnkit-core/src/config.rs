//! Configuration management for usnkit.
//!
//! This module provides configuration loading, saving, and defaults.
//! Configuration is stored in TOML format in a platform-appropriate location.

use crate::device::BufferPolicy;
use crate::error::{Result, UsnError};
use crate::reason::Reason;
use crate::record::MAX_RECORD_SIZE;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure for usnkit.
///
/// ## Example Configuration File (usnkit.toml)
///
/// ```toml
/// [general]
/// log_level = "info"
///
/// [journal]
/// reason_mask = "create,delete,rename"
/// poll_interval_ms = 500
///
/// [buffers]
/// initial_size = 65536
/// max_size = 4194304
/// max_attempts = 3
///
/// [decode]
/// max_record_size = 12288
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Journal reading and monitoring
    pub journal: JournalConfig,

    /// Device output buffers
    pub buffers: BufferConfig,

    /// Record decoding limits
    pub decode: DecodeConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "info".to_string(),
        }
    }
}

/// Journal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Reason names to read, e.g. `"create,delete"` or `"*"`
    pub reason_mask: String,

    /// Monitor poll interval once caught up
    pub poll_interval_ms: u64,

    /// Lower bound applied to any poll interval
    pub min_poll_interval_ms: u64,

    /// Records queued per monitor subscriber
    pub listener_capacity: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        JournalConfig {
            reason_mask: "*".to_string(),
            poll_interval_ms: 1000,
            min_poll_interval_ms: 1,
            listener_capacity: 256,
        }
    }
}

/// Buffer growth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub initial_size: usize,
    pub max_size: usize,
    pub max_attempts: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        let policy = BufferPolicy::default();
        BufferConfig {
            initial_size: policy.initial_size,
            max_size: policy.max_size,
            max_attempts: policy.max_attempts,
        }
    }
}

/// Decoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Records declaring a longer length are rejected as corrupt
    pub max_record_size: u32,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        DecodeConfig {
            max_record_size: MAX_RECORD_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| UsnError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })?;

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        let contents = toml::to_string_pretty(self).map_err(|e| UsnError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "usnkit").ok_or_else(|| UsnError::ConfigError {
            reason: "Could not determine config directory".to_string(),
        })?;

        Ok(dirs.config_dir().join("usnkit.toml"))
    }

    /// Buffer growth policy for device calls.
    ///
    /// Sizes are raised to at least one minimum-size record after the
    /// position marker; at least one attempt is always made.
    pub fn buffer_policy(&self) -> BufferPolicy {
        let floor = crate::device::POSITION_MARKER_SIZE + crate::record::MIN_RECORD_SIZE;
        let initial_size = self.buffers.initial_size.max(floor);
        BufferPolicy {
            initial_size,
            max_size: self.buffers.max_size.max(initial_size),
            max_attempts: self.buffers.max_attempts.max(1),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.journal.poll_interval_ms)
    }

    pub fn min_poll_interval(&self) -> Duration {
        Duration::from_millis(self.journal.min_poll_interval_ms)
    }

    /// Parse the configured reason mask.
    pub fn reason_mask(&self) -> Result<Reason> {
        self.journal.reason_mask.parse()
    }
}
