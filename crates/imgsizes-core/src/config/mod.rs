//! Configuration management for imgsizes.
//!
//! Configuration is read once per run from `imgsizes.toml` (project
//! directory first, then the platform config directory) and never mutated
//! afterwards. Every section implements `Default` with the documented values.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "imgsizes.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source images and derivative settings
    pub images: ImagesConfig,

    /// Scheduling settings
    pub pipeline: PipelineConfig,

    /// Manifest settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the first location that exists.
    ///
    /// Checks `./imgsizes.toml`, then [`Config::default_path`]. Returns the
    /// default configuration if neither exists.
    ///
    /// # Errors
    ///
    /// A file that exists but cannot be read, parsed, or validated is an
    /// error; it is never silently replaced by defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let project = PathBuf::from(PROJECT_CONFIG_FILE);
        if project.exists() {
            return Self::load_from(&project);
        }
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the user-level config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.imgsizes.imgsizes/config.toml
    /// - Linux: ~/.config/imgsizes/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\imgsizes\config\config.toml
    ///
    /// Falls back to ~/.imgsizes/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "imgsizes", "imgsizes")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".imgsizes").join("config.toml")
            })
    }

    /// Root directories with `~` expanded.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.images
            .dir
            .iter()
            .map(|dir| {
                let raw = dir.to_string_lossy();
                PathBuf::from(shellexpand::tilde(&raw).into_owned())
            })
            .collect()
    }

    /// Whether every required list is present and non-empty.
    ///
    /// An incomplete configuration is not an error: the run simply has
    /// nothing to do.
    pub fn is_complete(&self) -> bool {
        !self.images.dir.is_empty()
            && !self.images.size.is_empty()
            && !self.images.input_format.is_empty()
            && !self.images.output_format.is_empty()
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
