//! Configuration module for SerialVis-RS
//!
//! This module handles the configuration of the serial link:
//! - Port settings (device identifier, baud rate, framing)
//! - Timing of the read loop and the reconnect cycle
//! - Logging output
//!
//! Settings are fixed for the lifetime of a connection. Changing the port or
//! baud rate requires a disconnect/connect cycle.
//!
//! # Config Location
//!
//! The default config file lives in the platform-appropriate config directory
//! under `dev.hxyulin.serialvis-rs`:
//!
//! - **Linux**: `~/.config/dev.hxyulin.serialvis-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.serialvis-rs/config.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.serialvis-rs\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use serialvis_rs::config::AppConfig;
//!
//! let mut config = AppConfig::load_or_default(None);
//! config.port.name = "/dev/ttyACM0".to_string();
//! config.save("serialvis.toml")?;
//! ```

use crate::error::{Result, SerialVisError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.serialvis-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default serial device
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout for a single line read in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Default delay between failed open attempts in milliseconds
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 2000;

/// Default pause after a link failure before reopening, in milliseconds
pub const DEFAULT_IO_ERROR_PAUSE_MS: u64 = 2000;

/// Default upper bound on how long disconnect waits for the worker, in milliseconds
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 3000;

/// Get the default config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Complete configuration of the serial link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Serial port settings
    #[serde(default)]
    pub port: PortSettings,

    /// Read loop and reconnect timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a config for the given port and baud rate with default timing
    pub fn for_port(name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: PortSettings::new(name, baud_rate),
            ..Default::default()
        }
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SerialVisError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            SerialVisError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the given file (or the default location), returning defaults on any error
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return Self::default(),
        };

        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SerialVisError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        std::fs::write(path, content).map_err(|e| {
            SerialVisError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject settings the serial layer cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.port.name.trim().is_empty() {
            return Err(SerialVisError::Config("Port name must not be empty".into()));
        }
        if self.port.baud_rate == 0 {
            return Err(SerialVisError::Config("Baud rate must be non-zero".into()));
        }
        if !(5..=8).contains(&self.port.data_bits) {
            return Err(SerialVisError::Config(format!(
                "Unsupported data bits: {}",
                self.port.data_bits
            )));
        }
        if !(1..=2).contains(&self.port.stop_bits) {
            return Err(SerialVisError::Config(format!(
                "Unsupported stop bits: {}",
                self.port.stop_bits
            )));
        }
        if self.timing.read_timeout_ms == 0 {
            return Err(SerialVisError::Config("Read timeout must be non-zero".into()));
        }
        Ok(())
    }
}

// ==================== Port Settings ====================

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSettings {
    /// Device identifier (e.g. `/dev/ttyUSB0`, `COM3`)
    pub name: String,

    /// Baud rate
    pub baud_rate: u32,

    /// Data bits per character (5-8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Parity checking mode
    #[serde(default)]
    pub parity: Parity,

    /// Stop bits (1 or 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

impl PortSettings {
    /// Create 8N1 settings for the given port
    pub fn new(name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name: name.into(),
            baud_rate,
            ..Default::default()
        }
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: default_data_bits(),
            parity: Parity::None,
            stop_bits: default_stop_bits(),
        }
    }
}

impl std::fmt::Display for PortSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {} baud ({}{}{})",
            self.name,
            self.baud_rate,
            self.data_bits,
            self.parity.code(),
            self.stop_bits
        )
    }
}

/// Parity setting for serial port configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    /// Single-letter code used in `8N1` style notation
    pub fn code(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

// ==================== Timing ====================

/// Timing of the read loop and the reconnect cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Timeout for a single line read (bounds how quickly stop is noticed)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Delay between failed open attempts
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Pause after a link failure before reopening
    #[serde(default = "default_io_error_pause_ms")]
    pub io_error_pause_ms: u64,

    /// Upper bound on how long disconnect waits for the worker to release the link
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}

fn default_io_error_pause_ms() -> u64 {
    DEFAULT_IO_ERROR_PAUSE_MS
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            io_error_pause_ms: DEFAULT_IO_ERROR_PAUSE_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl TimingConfig {
    /// Use the same base interval for everything (handy for fast tests)
    pub fn uniform(ms: u64) -> Self {
        Self {
            read_timeout_ms: ms,
            retry_interval_ms: ms,
            io_error_pause_ms: ms,
            shutdown_timeout_ms: ms * 20,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn io_error_pause(&self) -> Duration {
        Duration::from_millis(self.io_error_pause_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

// ==================== Logging ====================

/// Logging output configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. `info,serialvis_rs=debug`)
    #[serde(default)]
    pub filter: Option<String>,

    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}
