//! The `imgsizes config` command for configuration management.

use clap::{Args, Subcommand};
use imgsizes_core::config::PROJECT_CONFIG_FILE;
use imgsizes_core::Config;
use std::path::{Path, PathBuf};

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,

    /// Show which config file is in use
    Path,

    /// Write a config file with defaults
    Init {
        /// Write to the user config directory instead of ./imgsizes.toml
        #[arg(long)]
        global: bool,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub async fn execute(
    config: Config,
    config_path: Option<PathBuf>,
    args: ConfigArgs,
) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(active_path);
            if path.exists() {
                println!("{}", path.display());
            } else {
                println!("{} (not found, using defaults)", path.display());
            }
        }

        ConfigCommand::Init { global, force } => {
            let path = if global {
                Config::default_path()
            } else {
                PathBuf::from(PROJECT_CONFIG_FILE)
            };
            init(&path, force)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// The file `Config::load` would read.
fn active_path() -> PathBuf {
    let local = PathBuf::from(PROJECT_CONFIG_FILE);
    if local.exists() {
        local
    } else {
        Config::default_path()
    }
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, Config::default().to_toml()?)?;
    Ok(())
}
