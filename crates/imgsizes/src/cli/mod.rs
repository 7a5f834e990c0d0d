//! Subcommand implementations.

pub mod config;
pub mod run;
pub mod types;

use imgsizes_core::Config;
use std::path::Path;

/// Load the explicit config file if given, otherwise the usual lookup.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file does not exist: {}", path.display());
            }
            Ok(Config::load_from(path)?)
        }
        None => Ok(Config::load()?),
    }
}
