//! Core data types shared by the planner, the crop generator, and the run
//! orchestrator.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One derivative to produce: a width and an output format token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputTarget {
    /// Target width in pixels
    pub width: u32,
    /// Output format token, already alias-resolved ("jpg", "png", "webp", ...)
    pub format: String,
}

impl OutputTarget {
    pub fn new(width: u32, format: impl Into<String>) -> Self {
        Self {
            width,
            format: format.into(),
        }
    }
}

/// A derivative that exists after the run, either pre-existing or freshly
/// produced. This is the manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Source image path
    pub image: PathBuf,
    /// Derivative width in pixels
    pub width: u32,
    /// Derivative format token
    pub format: String,
}

impl GeneratedFile {
    pub fn new(image: &Path, target: &OutputTarget) -> Self {
        Self {
            image: image.to_path_buf(),
            width: target.width,
            format: target.format.clone(),
        }
    }
}

/// Settled result of a single (width, format) target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum TargetStatus {
    /// Resized, encoded, and written
    Written,
    /// Derivative path now points at the original
    Linked,
    /// Wider than the source and upscaling is off; nothing produced
    SkippedUndersized,
    /// Decode, resize, encode, or write failed for this target
    Failed(String),
}

/// Outcome of one target, with the destination it was aimed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub target: OutputTarget,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: TargetStatus,
}

impl TargetOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, TargetStatus::Failed(_))
    }
}

/// Everything that happened to one discovered image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageReport {
    /// Source image path
    pub image: PathBuf,
    /// Targets skipped because their derivative already existed
    pub pre_existing: usize,
    /// Outcomes of the targets that were queued (empty if none were)
    pub outcomes: Vec<TargetOutcome>,
}

impl ImageReport {
    /// Whether this image needed no queued work.
    pub fn fully_skipped(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn count(&self, pred: impl Fn(&TargetStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Candidate images found by discovery
    pub discovered: usize,
    /// Images that went through the work queue
    pub submitted: usize,
    /// Images whose every target already existed
    pub skipped_images: usize,
    /// Derivatives written this run
    pub written: usize,
    /// Derivatives linked to their original
    pub linked: usize,
    /// Derivatives left alone because they already existed
    pub pre_existing: usize,
    /// Targets dropped for being wider than the source
    pub undersized: usize,
    /// Targets that failed
    pub failed: usize,
    /// Every derivative that exists after the run
    pub files: Vec<GeneratedFile>,
}

impl RunSummary {
    /// Fold one image's report into the totals.
    pub fn absorb(&mut self, report: &ImageReport) {
        self.pre_existing += report.pre_existing;
        if report.fully_skipped() {
            self.skipped_images += 1;
            return;
        }
        self.submitted += 1;
        self.written += report.count(|s| matches!(s, TargetStatus::Written));
        self.linked += report.count(|s| matches!(s, TargetStatus::Linked));
        self.undersized += report.count(|s| matches!(s, TargetStatus::SkippedUndersized));
        self.failed += report.count(|s| matches!(s, TargetStatus::Failed(_)));
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
