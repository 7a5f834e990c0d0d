//! Decode, resize, and encode through the `image` crate.
//!
//! All pixel work runs on the blocking pool so the per-image tasks stay
//! cooperative.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};

/// A decoded source image, shareable across the tasks that resize it.
#[derive(Clone)]
pub struct DecodedImage {
    /// The decoded pixels
    pub image: Arc<DynamicImage>,
    /// Native width in pixels
    pub width: u32,
    /// Native height in pixels
    pub height: u32,
}

/// Stateless front end to the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    /// Read and decode an image file.
    pub async fn decode(&self, path: &Path) -> PipelineResult<DecodedImage> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot read file: {}", e),
            })?;
        let path_owned = path.to_path_buf();

        tokio::task::spawn_blocking(move || Self::decode_bytes_sync(bytes, &path_owned))
            .await
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            })?
    }

    /// Resize to `width`, keeping the aspect ratio.
    pub async fn resize(
        &self,
        decoded: &DecodedImage,
        width: u32,
        path: &Path,
    ) -> PipelineResult<Arc<DynamicImage>> {
        let height = scaled_height(decoded.width, decoded.height, width);
        let source = decoded.image.clone();

        tokio::task::spawn_blocking(move || {
            Arc::new(source.resize_exact(width, height, FilterType::Lanczos3))
        })
        .await
        .map_err(|e| PipelineError::Resize {
            path: path.to_path_buf(),
            width,
            message: format!("Task join error: {}", e),
        })
    }

    /// Encode into the format named by `token` at the given quality.
    ///
    /// `path` is the destination, used for error context only.
    pub async fn encode(
        &self,
        image: Arc<DynamicImage>,
        token: &str,
        quality: u8,
        path: &Path,
    ) -> PipelineResult<Vec<u8>> {
        let format = output_format(token).ok_or_else(|| PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: token.to_string(),
        })?;
        let path_owned: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            Self::encode_sync(&image, format, quality).map_err(|e| PipelineError::Encode {
                path: path_owned,
                message: e.to_string(),
            })
        })
        .await
        .map_err(|e| PipelineError::Encode {
            path: path.to_path_buf(),
            message: format!("Task join error: {}", e),
        })?
    }

    /// Synchronous decode from bytes (runs in spawn_blocking).
    fn decode_bytes_sync(bytes: Vec<u8>, path: &Path) -> PipelineResult<DecodedImage> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        if reader.format().is_none() {
            return Err(PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image: Arc::new(image),
            width,
            height,
        })
    }

    fn encode_sync(
        image: &DynamicImage,
        format: ImageFormat,
        quality: u8,
    ) -> image::ImageResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        match format {
            // JPEG has no alpha channel and is the only format here with a
            // quality knob.
            ImageFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
            }
            _ => image.write_to(&mut buffer, format)?,
        }
        Ok(buffer.into_inner())
    }
}

/// Map an output token ("jpg", "png", "webp", ...) to an encoder format.
pub fn output_format(token: &str) -> Option<ImageFormat> {
    ImageFormat::from_extension(token).filter(|format| format.writing_enabled())
}

/// Height that keeps the aspect ratio at `target_width`, never below 1.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return height.max(1);
    }
    let scaled = (height as f64 * target_width as f64 / width as f64).round();
    (scaled as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn write_fixture(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 255) as u8, (y % 255) as u8, 90]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_scaled_height() {
        assert_eq!(scaled_height(600, 300, 400), 200);
        assert_eq!(scaled_height(600, 300, 1200), 600);
        assert_eq!(scaled_height(1000, 1, 10), 1);
        assert_eq!(scaled_height(3, 2, 2), 1);
    }

    #[test]
    fn test_output_format() {
        assert_eq!(output_format("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(output_format("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(output_format("png"), Some(ImageFormat::Png));
        assert_eq!(output_format("webp"), Some(ImageFormat::WebP));
        assert_eq!(output_format("bogus"), None);
    }

    #[tokio::test]
    async fn test_decode_resize_encode() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "src.png", 600, 300);
        let codec = ImageCodec;

        let decoded = codec.decode(&path).await.unwrap();
        assert_eq!((decoded.width, decoded.height), (600, 300));

        let resized = codec.resize(&decoded, 400, &path).await.unwrap();
        assert_eq!(resized.dimensions(), (400, 200));

        let jpg = codec
            .encode(resized.clone(), "jpg", 50, &path)
            .await
            .unwrap();
        assert_eq!(&jpg[0..2], &[0xFF, 0xD8]);

        let png = codec.encode(resized, "png", 50, &path).await.unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[tokio::test]
    async fn test_encode_unknown_format() {
        let codec = ImageCodec;
        let image = Arc::new(DynamicImage::new_rgb8(4, 4));
        let err = codec
            .encode(image, "bogus", 50, Path::new("a@4w.bogus"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn test_decode_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(ImageCodec.decode(&path).await.is_err());
    }
}
