//! Configuration: `config.toml`, environment overrides and CLI flags.
//!
//! Precedence, lowest to highest: defaults, config file, environment,
//! command line.

mod loader;

pub use loader::{
    apply_cli_overrides, apply_env_overrides, default_config_path, default_log_path,
    load_config_file, load_config_with_precedence, merge_config, ConfigError, ConfigFile,
    ResolvedConfig, CONFIG_ENV_VAR, INCREMENTAL_MOUNT_ENV_VAR,
};
