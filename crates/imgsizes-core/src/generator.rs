//! Whole-run orchestration: discover, plan, queue, drain, write manifest.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::Result;
use crate::output::write_manifest;
use crate::pipeline::{ImageProcessor, WorkQueue};
use crate::records::GeneratedFiles;
use crate::sink::{FsSink, OutputSink};
use crate::types::{ImageReport, RunSummary};

/// Runs the resize step for every image under the configured directories.
pub struct SizeGenerator {
    config: Config,
    processor: ImageProcessor,
}

impl SizeGenerator {
    /// Create a generator writing derivatives next to the originals.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_sink(config, Arc::new(FsSink))
    }

    /// Create a generator writing through a custom sink.
    ///
    /// # Errors
    ///
    /// Returns [`SizesError::Config`](crate::SizesError::Config) if the
    /// configuration fails validation. An incomplete configuration is not
    /// an error; [`run`](Self::run) simply has nothing to do.
    pub fn with_sink(config: Config, sink: Arc<dyn OutputSink>) -> Result<Self> {
        config.validate()?;
        let processor = ImageProcessor::new(&config, sink);
        Ok(Self { config, processor })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run once and return the totals.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_with(|_| {}).await
    }

    /// Run once, calling `on_image` as each image is accounted for.
    ///
    /// # Arguments
    ///
    /// * `on_image` - Called once per discovered image with its report.
    ///
    /// # Notes
    ///
    /// - Images whose derivatives all exist are reported during planning;
    ///   the rest are reported from their task as it finishes, in
    ///   completion order.
    /// - Per-target failures are counted in the summary, never returned
    ///   as an error.
    pub async fn run_with<F>(&self, on_image: F) -> Result<RunSummary>
    where
        F: Fn(&ImageReport) + Send + Sync + 'static,
    {
        if !self.config.is_complete() {
            tracing::debug!("Directories, sizes, or formats not configured; nothing to do");
            return Ok(RunSummary::default());
        }

        let start = Instant::now();
        let images = self.processor.discover(self.config.dirs()).await?;
        tracing::info!("Found {} source image(s)", images.len());

        let records = GeneratedFiles::new();
        let on_image = Arc::new(on_image);
        let mut summary = RunSummary {
            discovered: images.len(),
            ..RunSummary::default()
        };

        let mut queue: WorkQueue<ImageReport> = WorkQueue::new(self.config.pipeline.max_parallel);
        queue.on_drained(move || {
            tracing::debug!("Work queue drained after {:?}", start.elapsed());
        });
        queue.expect(images.len());

        for planned in self.processor.plan_all(images, &records).await? {
            if planned.targets.is_empty() {
                let report = ImageReport {
                    image: planned.candidate.path,
                    pre_existing: planned.pre_existing,
                    outcomes: vec![],
                };
                tracing::debug!("All derivatives of {:?} already exist", report.image);
                summary.absorb(&report);
                on_image(&report);
                queue.resolve_skipped();
                continue;
            }

            let crops = self.processor.crops();
            let records = records.clone();
            let on_image = on_image.clone();
            queue
                .submit(async move {
                    let outcomes = crops
                        .generate(&planned.candidate, &planned.targets, &records)
                        .await;
                    let report = ImageReport {
                        image: planned.candidate.path,
                        pre_existing: planned.pre_existing,
                        outcomes,
                    };
                    on_image(&report);
                    report
                })
                .await?;
        }

        for report in queue.drain().await? {
            summary.absorb(&report);
        }

        let mut files = records.take();
        files.sort();
        if let Some(manifest) = &self.config.output.manifest {
            write_manifest(manifest, self.config.output.manifest_format, &files)?;
        }
        summary.files = files;

        tracing::info!(
            "Done in {:?}: {} written, {} linked, {} already present, {} too small, {} failed",
            start.elapsed(),
            summary.written,
            summary.linked,
            summary.pre_existing,
            summary.undersized,
            summary.failed
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::read_manifest;
    use crate::sink::MemorySink;
    use crate::types::GeneratedFile;
    use image::RgbImage;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn write_image(path: &Path, width: u32, height: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_fn(width, height, |x, _| image::Rgb([(x % 256) as u8, 40, 200]))
            .save(path)
            .unwrap();
    }

    fn config(dirs: Vec<PathBuf>, size: &[u32], formats: &[&str]) -> Config {
        let mut config = Config::default();
        config.images.dir = dirs;
        config.images.size = size.to_vec();
        config.images.output_format = formats.iter().map(|f| f.to_string()).collect();
        config.images.quality = 50;
        config.pipeline.max_parallel = 2;
        config
    }

    #[tokio::test]
    async fn test_incomplete_config_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("a.jpg"), 300, 200);

        let mut config = config(vec![dir.path().to_path_buf()], &[100], &["jpg"]);
        config.images.output_format.clear();
        let summary = SizeGenerator::new(config).unwrap().run().await.unwrap();

        assert_eq!(summary.discovered, 0);
        assert!(!dir.path().join("a@100w.jpg").exists());
    }

    #[tokio::test]
    async fn test_run_writes_derivatives_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("static");
        write_image(&root.join("a.jpg"), 300, 200);
        write_image(&root.join("nested/b.png"), 150, 150);

        let mut config = config(vec![root.clone()], &[200, 100], &["match", "jpeg"]);
        let manifest = dir.path().join("dist/sizes.json");
        config.output.manifest = Some(manifest.clone());

        let summary = SizeGenerator::new(config).unwrap().run().await.unwrap();

        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.submitted, 2);
        // a.jpg: 200w and 100w as jpg; b.png: 100w as png and jpg, 200w too wide
        assert_eq!(summary.written, 4);
        assert_eq!(summary.undersized, 2);
        assert_eq!(summary.failed, 0);
        assert!(root.join("a@200w.jpg").exists());
        assert!(root.join("nested/b@100w.png").exists());
        assert!(!root.join("nested/b@200w.png").exists());

        let written = read_manifest(&manifest).unwrap();
        assert_eq!(written, summary.files);
        assert!(written.contains(&GeneratedFile {
            image: root.join("nested/b.png"),
            width: 100,
            format: "jpg".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("a.jpg"), 300, 200);
        write_image(&dir.path().join("b.jpg"), 300, 200);
        let config = config(vec![dir.path().to_path_buf()], &[250, 120], &["jpg", "png"]);

        let first = SizeGenerator::new(config.clone()).unwrap().run().await.unwrap();
        assert_eq!(first.written, 8);

        let modified = std::fs::metadata(dir.path().join("a@250w.jpg"))
            .unwrap()
            .modified()
            .unwrap();
        let second = SizeGenerator::new(config).unwrap().run().await.unwrap();

        assert_eq!(second.written, 0);
        assert_eq!(second.submitted, 0);
        assert_eq!(second.skipped_images, 2);
        assert_eq!(second.pre_existing, 8);
        assert_eq!(second.files, first.files);
        assert_eq!(
            std::fs::metadata(dir.path().join("a@250w.jpg"))
                .unwrap()
                .modified()
                .unwrap(),
            modified
        );
    }

    #[tokio::test]
    async fn test_every_image_skipped_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let mut existing = Vec::new();
        for name in ["a", "b", "c"] {
            write_image(&dir.path().join(format!("{name}.jpg")), 50, 50);
            existing.push(dir.path().join(format!("{name}@40w.jpg")));
        }
        let sink = MemorySink::new().with_existing(existing);
        let config = config(vec![dir.path().to_path_buf()], &[40], &["jpg"]);

        let reported = Arc::new(AtomicUsize::new(0));
        let counter = reported.clone();
        let summary = SizeGenerator::with_sink(config, Arc::new(sink.clone()))
            .unwrap()
            .run_with(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert_eq!(reported.load(Ordering::SeqCst), 3);
        assert_eq!(summary.skipped_images, 3);
        assert_eq!(summary.files.len(), 3);
        assert!(sink.assets().is_empty());
    }

    #[tokio::test]
    async fn test_partially_existing_image_is_submitted_once() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("test-image.jpg");
        write_image(&image, 600, 300);
        let sink = MemorySink::new().with_existing([dir.path().join("test-image@800w.jpg")]);
        let mut config = config(vec![dir.path().to_path_buf()], &[400, 800], &["match"]);
        config.images.force_upscale = true;

        let reports = Arc::new(Mutex::new(Vec::new()));
        let collected = reports.clone();
        let summary = SizeGenerator::with_sink(config, Arc::new(sink.clone()))
            .unwrap()
            .run_with(move |report| collected.lock().unwrap().push(report.clone()))
            .await
            .unwrap();

        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.pre_existing, 1);
        assert_eq!(summary.written, 1);
        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].outcomes.len(), 1);
        assert_eq!(reports[0].outcomes[0].target.width, 400);
        assert_eq!(
            summary.files,
            vec![
                GeneratedFile {
                    image: image.clone(),
                    width: 400,
                    format: "jpg".to_string(),
                },
                GeneratedFile {
                    image,
                    width: 800,
                    format: "jpg".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("good.jpg"), 100, 100);
        std::fs::write(dir.path().join("bad.jpg"), b"garbage").unwrap();
        let config = config(vec![dir.path().to_path_buf()], &[50], &["jpg"]);

        let summary = SizeGenerator::with_sink(config, Arc::new(MemorySink::new()))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = config(vec![PathBuf::from("static")], &[640, 0], &["jpg"]);
        assert!(matches!(
            SizeGenerator::new(config.clone()),
            Err(crate::SizesError::Config(_))
        ));

        config.images.size = vec![640];
        config.images.quality = 101;
        assert!(SizeGenerator::new(config).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upscale_over_linked_derivative_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.jpg");
        write_image(&original, 300, 200);

        let mut config = config(vec![dir.path().to_path_buf()], &[800], &["jpg"]);
        config.images.undersized = crate::config::UndersizedPolicy::Link;
        let first = SizeGenerator::new(config.clone()).unwrap().run().await.unwrap();
        assert_eq!(first.linked, 1);

        config.images.skip_existing = false;
        config.images.force_upscale = true;
        let second = SizeGenerator::new(config).unwrap().run().await.unwrap();
        assert_eq!(second.written, 1);
        assert_eq!(second.failed, 0);

        let derivative = dir.path().join("a@800w.jpg");
        assert!(!derivative.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(image::image_dimensions(&derivative).unwrap(), (800, 533));
        assert_eq!(image::image_dimensions(&original).unwrap(), (300, 200));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_link_policy_rerun_without_skip_existing() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("a.jpg"), 300, 200);

        let mut config = config(vec![dir.path().to_path_buf()], &[800], &["jpg"]);
        config.images.undersized = crate::config::UndersizedPolicy::Link;
        config.images.skip_existing = false;

        for _ in 0..2 {
            let summary = SizeGenerator::new(config.clone()).unwrap().run().await.unwrap();
            assert_eq!(summary.linked, 1);
            assert_eq!(summary.failed, 0);
        }
        assert_eq!(
            std::fs::read_link(dir.path().join("a@800w.jpg")).unwrap(),
            PathBuf::from("a.jpg")
        );
    }
}
