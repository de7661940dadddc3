//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use portal_config::{PROJECT_CONFIG_FILE, PortalConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration as TOML
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./portal.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local } => cmd_init(local),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;
    config.validate()?;
    print!("{}", config.resolved().to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config files (lowest precedence first):");
    for source in &ctx.loaded.sources {
        let marker = if source.loaded { "loaded" } else { "missing" };
        println!("  [{}] {}", marker, source.path.display());
    }
    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from(PROJECT_CONFIG_FILE)
    } else {
        match portal_config::user_config_path() {
            Some(path) => path,
            None => bail!("could not determine the user config directory"),
        }
    };

    if path.exists() {
        bail!("{} already exists", path.display());
    }

    portal_config::save_config(&PortalConfig::new().resolved(), &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn cmd_path() -> Result<()> {
    match portal_config::user_config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("(no user config directory on this platform)"),
    }
    Ok(())
}
