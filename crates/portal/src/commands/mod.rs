//! CLI command handlers.

use std::path::Path;

use anyhow::Result;
use portal_config::{ConfigSource, LoadedConfig};

pub mod config;
pub mod start;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Configuration as discovered or given by `--config`.
    pub loaded: LoadedConfig,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Load the explicit config file, or discover and merge the default layers.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    match explicit {
        Some(path) => {
            let config = portal_config::load_config_file(path)?;
            Ok(LoadedConfig {
                config,
                sources: vec![ConfigSource {
                    path: path.to_path_buf(),
                    loaded: true,
                }],
                warnings: Vec::new(),
            })
        }
        None => Ok(portal_config::load_config(None)?),
    }
}
