//! Configuration file loading with precedence handling.

use crate::mount::{InvariantPolicy, MountOptions};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "INCMOUNT_CONFIG";

/// Environment variable overriding `incremental_mount`.
pub const INCREMENTAL_MOUNT_ENV_VAR: &str = "INCMOUNT_INCREMENTAL_MOUNT";

/// Errors that can occur during config loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file path cannot be resolved.
    #[error("Invalid config path: {0}")]
    InvalidPath(String),

    /// Failed to read an existing config file.
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError {
        /// Path that failed to read.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// Config file contains invalid TOML.
    #[error("Invalid TOML in {path}: {reason}")]
    ParseError {
        /// Path with invalid TOML.
        path: PathBuf,
        /// Parse error details.
        reason: String,
    },
}

/// TOML configuration file structure.
///
/// All fields are optional. Corresponds to `~/.config/incmount/config.toml`:
///
/// ```toml
/// incremental_mount = true
/// strict_invariants = false
/// log_file_path = "/tmp/incmount.log"
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Mount only what intersects the visible rectangle.
    #[serde(default)]
    pub incremental_mount: Option<bool>,

    /// Fail instead of healing host-ordering violations.
    #[serde(default)]
    pub strict_invariants: Option<bool>,

    /// Path to log file for tracing output.
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,
}

/// Resolved configuration after applying precedence rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Incremental mount enabled.
    pub incremental_mount: bool,
    /// Host-ordering violations are fatal.
    pub strict_invariants: bool,
    /// Path to log file for tracing output.
    pub log_file_path: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            incremental_mount: true,
            strict_invariants: cfg!(debug_assertions),
            log_file_path: default_log_path(),
        }
    }
}

impl ResolvedConfig {
    /// Engine options for this configuration.
    pub fn mount_options(&self) -> MountOptions {
        MountOptions {
            incremental: self.incremental_mount,
            policy: InvariantPolicy::from_strict(self.strict_invariants),
        }
    }
}

/// Resolve default log file path.
///
/// Returns `~/.local/state/incmount/incmount.log` on Linux, the platform
/// state directory elsewhere, or `incmount.log` in the current directory
/// when there is none.
pub fn default_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        state_dir.join("incmount").join("incmount.log")
    } else {
        PathBuf::from("incmount.log")
    }
}

/// Load configuration file from a specific path.
///
/// Returns `Ok(None)` if the file doesn't exist.
///
/// # Errors
///
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_config_file(path: impl Into<PathBuf>) -> Result<Option<ConfigFile>, ConfigError> {
    let path = path.into();

    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let config: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    Ok(Some(config))
}

/// Resolve default config file path (`~/.config/incmount/config.toml` on
/// Linux). `None` if there is no config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("incmount").join("config.toml"))
}

/// Load configuration with precedence handling.
///
/// Precedence (highest to lowest):
/// 1. Explicit `config_path` argument (CLI `--config`)
/// 2. `INCMOUNT_CONFIG` environment variable
/// 3. Default path
///
/// # Errors
///
/// Returns error only if a config file exists but cannot be read or parsed.
pub fn load_config_with_precedence(
    config_path: Option<PathBuf>,
) -> Result<Option<ConfigFile>, ConfigError> {
    if let Some(path) = config_path {
        return load_config_file(path);
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        if env_path.is_empty() {
            return Err(ConfigError::InvalidPath(format!("{CONFIG_ENV_VAR} is empty")));
        }
        return load_config_file(PathBuf::from(env_path));
    }

    if let Some(default_path) = default_config_path() {
        return load_config_file(default_path);
    }

    Ok(None)
}

/// Apply environment variable overrides.
///
/// `INCMOUNT_INCREMENTAL_MOUNT` accepts `1`/`true`/`on` and `0`/`false`/`off`;
/// other values are ignored.
pub fn apply_env_overrides(mut config: ResolvedConfig) -> ResolvedConfig {
    if let Ok(value) = std::env::var(INCREMENTAL_MOUNT_ENV_VAR) {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" => config.incremental_mount = true,
            "0" | "false" | "off" => config.incremental_mount = false,
            _ => {}
        }
    }

    config
}

/// Merge config file into defaults.
pub fn merge_config(config_file: Option<ConfigFile>) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();

    let Some(config) = config_file else {
        return defaults;
    };

    ResolvedConfig {
        incremental_mount: config
            .incremental_mount
            .unwrap_or(defaults.incremental_mount),
        strict_invariants: config
            .strict_invariants
            .unwrap_or(defaults.strict_invariants),
        log_file_path: config.log_file_path.unwrap_or(defaults.log_file_path),
    }
}

/// Apply CLI argument overrides. Only flags the user actually set are
/// passed as `Some`.
pub fn apply_cli_overrides(
    mut config: ResolvedConfig,
    incremental_override: Option<bool>,
    strict_override: Option<bool>,
) -> ResolvedConfig {
    if let Some(incremental) = incremental_override {
        config.incremental_mount = incremental;
    }

    if let Some(strict) = strict_override {
        config.strict_invariants = strict;
    }

    config
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
