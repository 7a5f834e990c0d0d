//! Sub-configuration structs with their documented defaults.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// A value that may be written either as a single item or as a list.
///
/// `size = 640` and `size = [640, 320]` are both accepted; [`arrayify`]
/// turns either form into a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Normalize a scalar-or-list value into a list.
///
/// Lists keep their elements in order; anything else becomes a
/// single-element list.
pub fn arrayify<T>(value: OneOrMany<T>) -> Vec<T> {
    value.into_vec()
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    OneOrMany::deserialize(deserializer).map(arrayify)
}

/// What to do with a target wider than the source when upscaling is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndersizedPolicy {
    /// Produce nothing for that width
    #[default]
    Skip,
    /// Point the derivative path at the original file
    Link,
}

/// Source image selection and derivative settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Root directories to search
    #[serde(deserialize_with = "one_or_many")]
    pub dir: Vec<PathBuf>,

    /// Target widths in pixels
    #[serde(deserialize_with = "one_or_many")]
    pub size: Vec<u32>,

    /// Source extensions to pick up
    #[serde(deserialize_with = "one_or_many")]
    pub input_format: Vec<String>,

    /// Output format tokens (`match` reuses the source extension)
    #[serde(deserialize_with = "one_or_many")]
    pub output_format: Vec<String>,

    /// Encode quality, 0-100
    pub quality: u8,

    /// Allow targets wider than the source
    pub force_upscale: bool,

    /// Leave derivatives that already exist untouched
    pub skip_existing: bool,

    /// Handling of targets wider than the source when not upscaling
    pub undersized: UndersizedPolicy,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: vec![],
            size: vec![1400, 1024, 640, 320],
            input_format: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            output_format: vec!["jpg".to_string()],
            quality: 65,
            force_upscale: false,
            skip_existing: true,
            undersized: UndersizedPolicy::Skip,
        }
    }
}

/// Scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Build stage this step is attached to
    pub hook: String,

    /// Max images decoded/encoded at once
    pub max_parallel: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hook: "renderStart".to_string(),
            max_parallel: 4,
        }
    }
}

/// Manifest file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    /// One JSON array
    #[default]
    Json,
    /// One record per line
    Jsonl,
}

/// Manifest output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where to write the list of generated files, if anywhere
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,

    /// Manifest encoding
    pub manifest_format: ManifestFormat,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: pretty, json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
