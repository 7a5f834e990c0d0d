//! Configuration validation with range checks.
//!
//! Missing or empty lists are left to [`Config::is_complete`]; only values
//! that can never produce a sensible run are rejected here.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality > 100 {
            return Err(ConfigError::ValidationError(
                "images.quality must be between 0 and 100".into(),
            ));
        }
        if self.images.size.contains(&0) {
            return Err(ConfigError::ValidationError(
                "images.size entries must be > 0".into(),
            ));
        }
        if self
            .images
            .output_format
            .iter()
            .chain(&self.images.input_format)
            .any(|token| token.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "images.input_format and images.output_format must not contain empty entries"
                    .into(),
            ));
        }
        if self.pipeline.max_parallel == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_parallel must be > 0".into(),
            ));
        }
        Ok(())
    }
}
