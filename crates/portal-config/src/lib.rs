//! Configuration system for the campus portal gateway.
//!
//! Provides TOML-based configuration with:
//! - `[server]`, `[session]`, `[invoke]` and `[logging]` sections
//! - Config file layering (user config dir + project-local overrides)
//! - Capability trait impls so the session and invocation crates never see
//!   the full schema

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, PROJECT_CONFIG_FILE, load_config, load_config_file,
    load_config_with_options, save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
