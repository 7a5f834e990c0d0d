//! Producing the derivatives of one image from a single decode.

use futures_util::future::join_all;
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;

use crate::config::{ImagesConfig, UndersizedPolicy};
use crate::error::{PipelineError, PipelineResult};
use crate::records::GeneratedFiles;
use crate::sink::OutputSink;
use crate::types::{GeneratedFile, OutputTarget, TargetOutcome, TargetStatus};

use super::codec::{DecodedImage, ImageCodec};
use super::plan::ImageCandidate;

/// Decodes an image once and writes every requested (width, format).
#[derive(Clone)]
pub struct CropGenerator {
    codec: ImageCodec,
    sink: Arc<dyn OutputSink>,
    quality: u8,
    force_upscale: bool,
    undersized: UndersizedPolicy,
}

impl CropGenerator {
    pub fn new(config: &ImagesConfig, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            codec: ImageCodec,
            sink,
            quality: config.quality,
            force_upscale: config.force_upscale,
            undersized: config.undersized,
        }
    }

    /// Produce every target of one image.
    ///
    /// Never fails as a whole: each target settles on its own and a failure
    /// in one does not stop the others. Successful writes are recorded in
    /// `records`.
    pub async fn generate(
        &self,
        candidate: &ImageCandidate,
        targets: &[OutputTarget],
        records: &GeneratedFiles,
    ) -> Vec<TargetOutcome> {
        if targets.is_empty() {
            return vec![];
        }

        let start = std::time::Instant::now();
        let decoded = match self.codec.decode(&candidate.path).await {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::error!("{}", e);
                let message = e.to_string();
                return targets
                    .iter()
                    .map(|t| outcome(candidate, t, TargetStatus::Failed(message.clone())))
                    .collect();
            }
        };
        tracing::trace!(
            "  Decode {:?}: {:?} ({}x{})",
            candidate.path,
            start.elapsed(),
            decoded.width,
            decoded.height
        );

        let mut widths: Vec<u32> = Vec::new();
        for target in targets {
            if !widths.contains(&target.width) {
                widths.push(target.width);
            }
        }

        let groups = widths.into_iter().map(|width| {
            let at_width: Vec<&OutputTarget> =
                targets.iter().filter(|t| t.width == width).collect();
            self.generate_width(candidate, &decoded, width, at_width, records)
        });
        let outcomes: Vec<TargetOutcome> = join_all(groups).await.into_iter().flatten().collect();

        tracing::debug!(
            "Generated {}/{} derivative(s) of {:?} in {:?}",
            outcomes
                .iter()
                .filter(|o| matches!(o.status, TargetStatus::Written | TargetStatus::Linked))
                .count(),
            outcomes.len(),
            candidate.path,
            start.elapsed()
        );
        outcomes
    }

    /// All formats requested at one width, sharing one resized buffer.
    async fn generate_width(
        &self,
        candidate: &ImageCandidate,
        decoded: &DecodedImage,
        width: u32,
        targets: Vec<&OutputTarget>,
        records: &GeneratedFiles,
    ) -> Vec<TargetOutcome> {
        if width > decoded.width && !self.force_upscale {
            return match self.undersized {
                UndersizedPolicy::Skip => {
                    tracing::debug!(
                        "Skipping {}w for {:?}: source is only {}w",
                        width,
                        candidate.path,
                        decoded.width
                    );
                    targets
                        .into_iter()
                        .map(|t| outcome(candidate, t, TargetStatus::SkippedUndersized))
                        .collect()
                }
                UndersizedPolicy::Link => {
                    join_all(
                        targets
                            .into_iter()
                            .map(|t| self.link_one(candidate, t, records)),
                    )
                    .await
                }
            };
        }

        let resized = if width == decoded.width {
            Ok(decoded.image.clone())
        } else {
            self.codec.resize(decoded, width, &candidate.path).await
        };
        let resized = match resized {
            Ok(resized) => resized,
            Err(e) => {
                tracing::error!("{}", e);
                let message = e.to_string();
                return targets
                    .into_iter()
                    .map(|t| outcome(candidate, t, TargetStatus::Failed(message.clone())))
                    .collect();
            }
        };

        join_all(
            targets
                .into_iter()
                .map(|t| self.write_one(candidate, resized.clone(), t, records)),
        )
        .await
    }

    async fn write_one(
        &self,
        candidate: &ImageCandidate,
        image: Arc<DynamicImage>,
        target: &OutputTarget,
        records: &GeneratedFiles,
    ) -> TargetOutcome {
        let path = candidate.derivative_path(target);
        match self.encode_and_write(image, target, &path).await {
            Ok(()) => {
                records.record(GeneratedFile::new(&candidate.path, target));
                tracing::trace!("  Wrote {:?}", path);
                outcome(candidate, target, TargetStatus::Written)
            }
            Err(e) => {
                tracing::error!("{}", e);
                outcome(candidate, target, TargetStatus::Failed(e.to_string()))
            }
        }
    }

    async fn encode_and_write(
        &self,
        image: Arc<DynamicImage>,
        target: &OutputTarget,
        path: &Path,
    ) -> PipelineResult<()> {
        let bytes = self
            .codec
            .encode(image, &target.format, self.quality, path)
            .await?;
        self.sink
            .write(path, bytes)
            .await
            .map_err(|e| PipelineError::Write {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    async fn link_one(
        &self,
        candidate: &ImageCandidate,
        target: &OutputTarget,
        records: &GeneratedFiles,
    ) -> TargetOutcome {
        let path = candidate.derivative_path(target);
        match self.sink.link(&candidate.path, &path).await {
            Ok(()) => {
                records.record(GeneratedFile::new(&candidate.path, target));
                outcome(candidate, target, TargetStatus::Linked)
            }
            Err(e) => {
                let e = PipelineError::Write {
                    path,
                    message: e.to_string(),
                };
                tracing::error!("{}", e);
                outcome(candidate, target, TargetStatus::Failed(e.to_string()))
            }
        }
    }
}

fn outcome(
    candidate: &ImageCandidate,
    target: &OutputTarget,
    status: TargetStatus,
) -> TargetOutcome {
    TargetOutcome {
        target: target.clone(),
        path: candidate.derivative_path(target),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{AssetSource, FsSink, MemorySink};
    use image::{GenericImageView, RgbImage};
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        candidate: ImageCandidate,
    }

    /// A 600x300 JPEG: wider than 400, narrower than 800.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-image.jpg");
        RgbImage::from_fn(600, 300, |x, y| image::Rgb([(x / 3) as u8, (y / 2) as u8, 128]))
            .save(&path)
            .unwrap();
        Fixture {
            candidate: ImageCandidate::new(path),
            _dir: dir,
        }
    }

    fn generator(
        force_upscale: bool,
        undersized: UndersizedPolicy,
        sink: Arc<dyn OutputSink>,
    ) -> CropGenerator {
        CropGenerator::new(
            &ImagesConfig {
                quality: 50,
                force_upscale,
                undersized,
                ..ImagesConfig::default()
            },
            sink,
        )
    }

    fn derivative(fixture: &Fixture, width: u32, format: &str) -> PathBuf {
        fixture
            .candidate
            .derivative_path(&OutputTarget::new(width, format))
    }

    fn targets(pairs: &[(u32, &str)]) -> Vec<OutputTarget> {
        pairs.iter().map(|(w, f)| OutputTarget::new(*w, *f)).collect()
    }

    #[tokio::test]
    async fn test_no_upscale_skips_wider_targets() {
        let fixture = fixture();
        let records = GeneratedFiles::new();
        let crops = generator(false, UndersizedPolicy::Skip, Arc::new(FsSink));

        let outcomes = crops
            .generate(&fixture.candidate, &targets(&[(400, "jpg"), (800, "jpg")]), &records)
            .await;

        assert!(derivative(&fixture, 400, "jpg").exists());
        assert!(!derivative(&fixture, 400, "png").exists());
        assert!(!derivative(&fixture, 800, "jpg").exists());
        assert_eq!(records.len(), 1);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .any(|o| o.target.width == 800 && o.status == TargetStatus::SkippedUndersized));
    }

    #[tokio::test]
    async fn test_force_upscale_writes_every_width() {
        let fixture = fixture();
        let records = GeneratedFiles::new();
        let crops = generator(true, UndersizedPolicy::Skip, Arc::new(FsSink));

        crops
            .generate(
                &fixture.candidate,
                &targets(&[(400, "jpg"), (600, "jpg"), (800, "jpg")]),
                &records,
            )
            .await;

        assert!(derivative(&fixture, 400, "jpg").exists());
        assert!(derivative(&fixture, 600, "jpg").exists());
        assert!(derivative(&fixture, 800, "jpg").exists());
        assert_eq!(records.len(), 3);

        let upscaled = image::open(derivative(&fixture, 800, "jpg")).unwrap();
        assert_eq!(upscaled.dimensions(), (800, 400));
    }

    #[tokio::test]
    async fn test_multiple_formats_at_one_width() {
        let fixture = fixture();
        let records = GeneratedFiles::new();
        let crops = generator(true, UndersizedPolicy::Skip, Arc::new(FsSink));

        crops
            .generate(&fixture.candidate, &targets(&[(400, "jpg"), (400, "png")]), &records)
            .await;

        assert!(derivative(&fixture, 400, "jpg").exists());
        assert!(derivative(&fixture, 400, "png").exists());
        assert!(!derivative(&fixture, 800, "jpg").exists());
        assert_eq!(records.len(), 2);

        let png = image::open(derivative(&fixture, 400, "png")).unwrap();
        assert_eq!(png.dimensions(), (400, 200));
    }

    #[tokio::test]
    async fn test_all_targets_too_wide() {
        let fixture = fixture();
        let records = GeneratedFiles::new();
        let sink = MemorySink::new();
        let crops = generator(false, UndersizedPolicy::Skip, Arc::new(sink.clone()));

        let outcomes = crops
            .generate(&fixture.candidate, &targets(&[(800, "jpg"), (800, "png")]), &records)
            .await;

        assert!(sink.assets().is_empty());
        assert!(records.is_empty());
        assert!(outcomes.iter().all(|o| !o.is_failure()));
    }

    #[tokio::test]
    async fn test_empty_target_list() {
        let fixture = fixture();
        let records = GeneratedFiles::new();
        let sink = MemorySink::new();
        let crops = generator(false, UndersizedPolicy::Skip, Arc::new(sink.clone()));

        let outcomes = crops.generate(&fixture.candidate, &[], &records).await;

        assert!(outcomes.is_empty());
        assert!(sink.assets().is_empty());
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_failed_format_does_not_stop_siblings() {
        let fixture = fixture();
        let records = GeneratedFiles::new();
        let sink = MemorySink::new();
        let crops = generator(false, UndersizedPolicy::Skip, Arc::new(sink.clone()));

        let outcomes = crops
            .generate(
                &fixture.candidate,
                &targets(&[(400, "bogus"), (400, "jpg"), (200, "png")]),
                &records,
            )
            .await;

        assert_eq!(outcomes.iter().filter(|o| o.is_failure()).count(), 1);
        assert_eq!(records.len(), 2);
        let names: Vec<PathBuf> = sink.assets().into_iter().map(|a| a.file_name).collect();
        assert_eq!(
            names,
            vec![derivative(&fixture, 200, "png"), derivative(&fixture, 400, "jpg")]
        );
    }

    #[tokio::test]
    async fn test_unreadable_image_fails_every_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let records = GeneratedFiles::new();
        let crops = generator(false, UndersizedPolicy::Skip, Arc::new(MemorySink::new()));

        let outcomes = crops
            .generate(&ImageCandidate::new(path), &targets(&[(400, "jpg"), (200, "jpg")]), &records)
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(TargetOutcome::is_failure));
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_link_policy_points_at_original() {
        let fixture = fixture();
        let records = GeneratedFiles::new();
        let sink = MemorySink::new();
        let crops = generator(false, UndersizedPolicy::Link, Arc::new(sink.clone()));

        let outcomes = crops
            .generate(&fixture.candidate, &targets(&[(800, "jpg")]), &records)
            .await;

        assert_eq!(outcomes[0].status, TargetStatus::Linked);
        assert_eq!(records.len(), 1);
        assert_eq!(
            sink.assets()[0].source,
            AssetSource::Link(fixture.candidate.path.clone())
        );
    }
}
