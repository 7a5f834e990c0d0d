//! Target planning: which (width, format) derivatives an image still needs.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::ImagesConfig;
use crate::records::GeneratedFiles;
use crate::sink::OutputSink;
use crate::types::{GeneratedFile, OutputTarget};

/// Format token that stands for the source image's own extension.
pub const MATCH_FORMAT: &str = "match";

/// A discovered source image with its derived stem and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    /// Path to the source image
    pub path: PathBuf,
    /// Path with the trailing extension removed
    pub stem: PathBuf,
    /// Native extension, as written in the file name
    pub extension: String,
}

impl ImageCandidate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path.with_extension("");
        Self {
            path,
            stem,
            extension,
        }
    }

    /// Destination of a derivative: `{stem}@{width}w.{format}`.
    pub fn derivative_path(&self, target: &OutputTarget) -> PathBuf {
        let mut name = OsString::from(self.stem.as_os_str());
        name.push(format!("@{}w.{}", target.width, target.format));
        PathBuf::from(name)
    }
}

/// Resolve configured format tokens for one image.
///
/// `match` becomes the native extension first, then `jpeg` collapses to
/// `jpg`, and only then are duplicates dropped (first occurrence wins).
pub fn resolve_formats(tokens: &[String], native_extension: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .iter()
        .map(|token| {
            if token == MATCH_FORMAT {
                native_extension
            } else {
                token.as_str()
            }
        })
        .map(|token| if token == "jpeg" { "jpg" } else { token })
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}

/// Outcome of planning one image.
#[derive(Debug, Clone)]
pub struct PlannedImage {
    pub candidate: ImageCandidate,
    /// Targets that still need producing; empty means no queued work
    pub targets: Vec<OutputTarget>,
    /// Targets dropped because their derivative already existed
    pub pre_existing: usize,
}

/// Computes the resolved target list for each image.
#[derive(Debug, Clone)]
pub struct TargetPlanner {
    widths: Vec<u32>,
    formats: Vec<String>,
    skip_existing: bool,
}

impl TargetPlanner {
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            widths: config.size.clone(),
            formats: config.output_format.clone(),
            skip_existing: config.skip_existing,
        }
    }

    /// Every target for the image, before the skip-existing filter.
    ///
    /// Widths-major order, duplicates collapsed.
    pub fn targets(&self, candidate: &ImageCandidate) -> Vec<OutputTarget> {
        let formats = resolve_formats(&self.formats, &candidate.extension);
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.widths.len() * formats.len());
        for &width in &self.widths {
            for format in &formats {
                let target = OutputTarget::new(width, format.as_str());
                if seen.insert(target.clone()) {
                    targets.push(target);
                }
            }
        }
        targets
    }

    /// Plan one image.
    ///
    /// With skip-existing on, targets already present on `sink` are removed
    /// and recorded in `records` as generated.
    pub fn plan(
        &self,
        candidate: ImageCandidate,
        sink: &dyn OutputSink,
        records: &GeneratedFiles,
    ) -> PlannedImage {
        let mut targets = self.targets(&candidate);
        let mut pre_existing = 0;

        if self.skip_existing {
            targets.retain(|target| {
                let exists = sink.exists(&candidate.derivative_path(target));
                if exists {
                    records.record(GeneratedFile::new(&candidate.path, target));
                    pre_existing += 1;
                }
                !exists
            });
        }

        tracing::trace!(
            "Planned {:?}: {} to generate, {} already present",
            candidate.path,
            targets.len(),
            pre_existing
        );

        PlannedImage {
            candidate,
            targets,
            pre_existing,
        }
    }
}
