//! # Configuration Management
//!
//! Centralized configuration for wire connections.
//!
//! None of these settings change the wire format except the compressor kind,
//! which both ends must agree on. Thresholds only decide *when* a writer
//! compresses; the sign of the length field tells the reader what happened.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`WIRE_*` variables)

use crate::error::{Result, WireError};
use crate::utils::compression::CompressionKind;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Variable-width objects larger than this are compressed (1 MiB)
pub const COMPRESSION_THRESHOLD: usize = 1024 * 1024;

/// Byte arrays longer than this are refused on write (~1 GB)
pub const MAX_BLOCK_SIZE: usize = 1_000_000_000;

/// Read-side lengths above this are logged before allocating
pub const SUSPICIOUS_BLOCK_LENGTH: usize = 50_000_000;

/// Default capacity of the read and write buffers (32 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Maximum number of characters of a block payload written to the trace sink
pub const TRACE_PREVIEW_CHARS: usize = 200;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct WireConfig {
    /// Connection and codec settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WireConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| WireError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| WireError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| WireError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("WIRE_BUFFER_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.connection.buffer_size = val;
            }
        }

        if let Ok(threshold) = std::env::var("WIRE_COMPRESSION_THRESHOLD") {
            if let Ok(val) = threshold.parse::<usize>() {
                config.connection.compression_threshold = val;
            }
        }

        if let Ok(kind) = std::env::var("WIRE_COMPRESSION") {
            config.connection.compression = match kind.to_ascii_lowercase().as_str() {
                "lz4" => CompressionKind::Lz4,
                "zstd" => CompressionKind::Zstd,
                other => {
                    return Err(WireError::Config(format!(
                        "Unknown compression kind in WIRE_COMPRESSION: {other}"
                    )))
                }
            };
        }

        if let Ok(debug) = std::env::var("WIRE_DEBUG") {
            config.connection.debug = matches!(debug.as_str(), "1" | "true" | "yes");
        }

        if let Ok(level) = std::env::var("WIRE_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                config.logging.log_level = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WireError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| WireError::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.connection.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WireError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Character set used by `write_string` / `read_string`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    #[default]
    Utf8,
    /// ISO-8859-1, one byte per character
    Latin1,
}

/// Per-connection codec settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Capacity of the buffered reader and writer wrapping the transport
    pub buffer_size: usize,

    /// Variable-width objects strictly larger than this are compressed
    pub compression_threshold: usize,

    /// Block compressor; must match the peer
    pub compression: CompressionKind,

    /// Byte arrays longer than this are refused on write
    pub max_block_size: usize,

    /// Read-side lengths above this trigger a warning before allocation
    pub suspicious_length: usize,

    /// Upper bound on the output of a single decompression
    pub max_decompressed_size: usize,

    /// Charset for string frames
    pub charset: Charset,

    /// Initial value of the per-connection diagnostic trace flag
    pub debug: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            compression_threshold: COMPRESSION_THRESHOLD,
            compression: CompressionKind::Lz4,
            max_block_size: MAX_BLOCK_SIZE,
            suspicious_length: SUSPICIOUS_BLOCK_LENGTH,
            max_decompressed_size: MAX_BLOCK_SIZE,
            charset: Charset::Utf8,
            debug: false,
        }
    }
}

impl ConnectionConfig {
    /// Validate connection configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.buffer_size == 0 {
            errors.push("Buffer size must be greater than 0".to_string());
        } else if self.buffer_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Buffer size too large: {} bytes (maximum: 16 MB)",
                self.buffer_size
            ));
        }

        // The length field is a signed 32-bit integer
        if self.max_block_size == 0 {
            errors.push("Max block size must be greater than 0".to_string());
        } else if self.max_block_size > i32::MAX as usize {
            errors.push(format!(
                "Max block size too large: {} bytes (maximum: {})",
                self.max_block_size,
                i32::MAX
            ));
        }

        if self.compression_threshold > i32::MAX as usize {
            errors.push(format!(
                "Compression threshold too large: {} bytes (maximum: {})",
                self.compression_threshold,
                i32::MAX
            ));
        }

        if self.max_decompressed_size < self.compression_threshold {
            errors.push(
                "Max decompressed size cannot be smaller than the compression threshold"
                    .to_string(),
            );
        }

        if self.suspicious_length == 0 {
            errors.push("Suspicious length threshold must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("wire-connection"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
