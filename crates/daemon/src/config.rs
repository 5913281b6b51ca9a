//! Configuration management for the LanShare daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/lanshare/config.toml`.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the share root.
pub const ENV_ROOT: &str = "FILE_SHARE_ROOT";
/// Environment variable overriding the upload limit, in bytes.
pub const ENV_MAX_UPLOAD: &str = "FILE_SHARE_MAX_UPLOAD";
/// Environment variable overriding the archive spill threshold, in megabytes.
pub const ENV_ZIP_SPOOL_MB: &str = "FILE_SHARE_ZIP_SPOOL_MB";
/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "FILE_SHARE_LOG_LEVEL";

/// Default upload limit: 4 GiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 4 * 1024 * 1024 * 1024;
/// Default archive spill threshold in megabytes.
pub const DEFAULT_ZIP_SPOOL_MB: u64 = 256;
/// Default text preview size in bytes.
pub const DEFAULT_PREVIEW_BYTES: usize = 8000;
/// Default listening port.
pub const DEFAULT_PORT: u16 = 5000;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("bind must be an IP address, got {0}")]
    InvalidBind(String),

    #[error("max_upload_bytes must be greater than 0, got {0}")]
    InvalidMaxUpload(u64),

    #[error("zip_spool_mb must be greater than 0, got {0}")]
    InvalidZipSpool(u64),

    #[error("preview_bytes must be greater than 0, got {0}")]
    InvalidPreviewBytes(usize),

    #[error("root must not be empty")]
    EmptyRoot,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the LanShare daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Listener and logging configuration.
    pub server: ServerConfig,

    /// Shared directory and size limits.
    pub share: ShareConfig,
}

/// Listener and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory for daily rolling log files. Logs go to stderr only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

/// Shared directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShareConfig {
    /// Directory served to clients. Created at startup if missing.
    pub root: PathBuf,

    /// Largest accepted upload request body in bytes (default: 4 GiB).
    pub max_upload_bytes: u64,

    /// Archive bytes kept in memory before spilling to disk, in megabytes.
    pub zip_spool_mb: u64,

    /// Bytes of a text file shown in its preview.
    pub preview_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./shared"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            zip_spool_mb: DEFAULT_ZIP_SPOOL_MB,
            preview_bytes: DEFAULT_PREVIEW_BYTES,
        }
    }
}

impl ShareConfig {
    /// The spill threshold in bytes.
    pub fn zip_spool_bytes(&self) -> usize {
        usize::try_from(self.zip_spool_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }

    /// The upload limit as a body size.
    pub fn max_upload_usize(&self) -> usize {
        usize::try_from(self.max_upload_bytes).unwrap_or(usize::MAX)
    }
}

impl ServerConfig {
    /// The socket address to listen on.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = IpAddr::from_str(&self.bind)
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lanshare")
        .join("config.toml")
}

/// Read a positive integer override, keeping `current` when it is unusable.
fn positive_override(name: &str, raw: &str, current: u64) -> u64 {
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => {
            tracing::info!(variable = name, value, "Overriding from environment");
            value as u64
        }
        Ok(value) => {
            tracing::warn!(variable = name, value, "Ignoring non-positive override");
            current
        }
        Err(e) => {
            tracing::warn!(variable = name, value = raw, error = %e, "Ignoring unparsable override");
            current
        }
    }
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILE_SHARE_ROOT: Override the shared directory
    /// - FILE_SHARE_MAX_UPLOAD: Override the upload limit in bytes
    /// - FILE_SHARE_ZIP_SPOOL_MB: Override the archive spill threshold in megabytes
    /// - FILE_SHARE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    ///
    /// Empty values are ignored, as are numbers that fail to parse or are not
    /// positive.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var(ENV_ROOT) {
            if !root.is_empty() {
                tracing::info!("Overriding share root from environment: {}", root);
                self.share.root = PathBuf::from(root);
            }
        }

        if let Ok(raw) = std::env::var(ENV_MAX_UPLOAD) {
            if !raw.is_empty() {
                self.share.max_upload_bytes =
                    positive_override(ENV_MAX_UPLOAD, &raw, self.share.max_upload_bytes);
            }
        }

        if let Ok(raw) = std::env::var(ENV_ZIP_SPOOL_MB) {
            if !raw.is_empty() {
                self.share.zip_spool_mb =
                    positive_override(ENV_ZIP_SPOOL_MB, &raw, self.share.zip_spool_mb);
            }
        }

        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.server.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;

        if self.share.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRoot);
        }

        if self.share.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidMaxUpload(self.share.max_upload_bytes));
        }

        if self.share.zip_spool_mb == 0 {
            return Err(ConfigError::InvalidZipSpool(self.share.zip_spool_mb));
        }

        if self.share.preview_bytes == 0 {
            return Err(ConfigError::InvalidPreviewBytes(self.share.preview_bytes));
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
