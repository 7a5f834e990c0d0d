//! CLI enum types mirroring the core configuration enums.

use clap::ValueEnum;
use imgsizes_core::{ManifestFormat, UndersizedPolicy};

/// What to do with widths larger than the source.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Undersized {
    /// Produce nothing for that width
    Skip,
    /// Link the derivative path to the original
    Link,
}

impl From<Undersized> for UndersizedPolicy {
    fn from(value: Undersized) -> Self {
        match value {
            Undersized::Skip => UndersizedPolicy::Skip,
            Undersized::Link => UndersizedPolicy::Link,
        }
    }
}

/// Manifest encoding.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ManifestKind {
    /// Single JSON array
    Json,
    /// One JSON object per line
    Jsonl,
}

impl From<ManifestKind> for ManifestFormat {
    fn from(value: ManifestKind) -> Self {
        match value {
            ManifestKind::Json => ManifestFormat::Json,
            ManifestKind::Jsonl => ManifestFormat::Jsonl,
        }
    }
}
