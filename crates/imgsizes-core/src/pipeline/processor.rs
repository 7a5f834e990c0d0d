//! Discovery, planning, and crop generation wired to one output sink.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinError;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::records::GeneratedFiles;
use crate::sink::OutputSink;

use super::crop::CropGenerator;
use super::discovery::FileDiscovery;
use super::plan::{ImageCandidate, PlannedImage, TargetPlanner};

/// Bundles the pipeline stages for one run.
pub struct ImageProcessor {
    discovery: Arc<FileDiscovery>,
    planner: TargetPlanner,
    crops: CropGenerator,
    sink: Arc<dyn OutputSink>,
}

impl ImageProcessor {
    pub fn new(config: &Config, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            discovery: Arc::new(FileDiscovery::new(&config.images.input_format)),
            planner: TargetPlanner::new(&config.images),
            crops: CropGenerator::new(&config.images, sink.clone()),
            sink,
        }
    }

    /// Find every source image under `roots`, off the async runtime.
    pub async fn discover(&self, roots: Vec<PathBuf>) -> PipelineResult<Vec<PathBuf>> {
        let discovery = self.discovery.clone();
        let root_hint = roots.first().cloned().unwrap_or_default();
        tokio::task::spawn_blocking(move || discovery.discover(&roots))
            .await
            .map_err(|e| PipelineError::Discovery {
                root: root_hint,
                message: format!("Task join error: {}", e),
            })?
    }

    /// Plan every image against the sink, recording pre-existing
    /// derivatives in `records`.
    ///
    /// Existence checks hit the filesystem, so the whole batch runs on the
    /// blocking pool. Plans come back in the order of `paths`.
    pub async fn plan_all(
        &self,
        paths: Vec<PathBuf>,
        records: &GeneratedFiles,
    ) -> Result<Vec<PlannedImage>, JoinError> {
        let planner = self.planner.clone();
        let sink = self.sink.clone();
        let records = records.clone();
        tokio::task::spawn_blocking(move || {
            paths
                .into_iter()
                .map(|path| planner.plan(ImageCandidate::new(path), sink.as_ref(), &records))
                .collect::<Vec<_>>()
        })
        .await
    }

    /// A handle to the crop generator for use inside a spawned task.
    pub fn crops(&self) -> CropGenerator {
        self.crops.clone()
    }
}
