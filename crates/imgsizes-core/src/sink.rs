//! Output sinks: where derivatives end up.
//!
//! [`FsSink`] writes next to the originals on disk. [`MemorySink`] plays the
//! role of a build tool's asset emitter: it keeps every emitted asset so the
//! host can hand them to its own bundle.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Destination for derivatives.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Whether a derivative is already present at `path`.
    ///
    /// Planning is synchronous, so this must not block on the runtime.
    fn exists(&self, path: &Path) -> bool;

    /// Store encoded bytes at `path`.
    async fn write(&self, path: &Path, bytes: Vec<u8>) -> io::Result<()>;

    /// Make `path` refer to `original` instead of holding its own pixels.
    async fn link(&self, original: &Path, path: &Path) -> io::Result<()>;
}

/// Writes derivatives to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSink;

#[async_trait]
impl OutputSink for FsSink {
    fn exists(&self, path: &Path) -> bool {
        // symlink_metadata so a dangling link from an earlier run still counts.
        // Blocking; callers plan on the blocking pool.
        path.symlink_metadata().is_ok()
    }

    /// Write `bytes` to `path` without following an existing link.
    ///
    /// # Notes
    ///
    /// A derivative left by the link policy is a symlink to the source
    /// image. The bytes go to a sibling `.part` file that is renamed over
    /// `path`, so the rename replaces the link itself and the source is
    /// never written through.
    async fn write(&self, path: &Path, bytes: Vec<u8>) -> io::Result<()> {
        let staging = staging_path(path);
        tokio::fs::write(&staging, bytes).await?;
        if let Err(e) = tokio::fs::rename(&staging, path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }
        Ok(())
    }

    async fn link(&self, original: &Path, path: &Path) -> io::Result<()> {
        // Derivatives sit next to their original, so a bare file name is a
        // valid relative link target and survives moving the directory.
        let target = original
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| original.to_path_buf());

        // Replace whatever a previous run left at the destination.
        if tokio::fs::symlink_metadata(path).await.is_ok() {
            tokio::fs::remove_file(path).await?;
        }

        #[cfg(unix)]
        {
            tokio::fs::symlink(target, path).await
        }
        #[cfg(windows)]
        {
            tokio::fs::symlink_file(target, path).await
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = target;
            tokio::fs::copy(original, path).await.map(|_| ())
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Contents of an emitted asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// Encoded image bytes
    Bytes(Vec<u8>),
    /// Refers to the original image
    Link(PathBuf),
}

/// An asset handed to the build tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    pub file_name: PathBuf,
    pub source: AssetSource,
}

/// Keeps derivatives in memory, keyed by destination path.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    assets: Arc<Mutex<BTreeMap<PathBuf, AssetSource>>>,
    existing: Arc<Mutex<Vec<PathBuf>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark paths as already present, as if emitted by an earlier run.
    pub fn with_existing<I, P>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if let Ok(mut existing) = self.existing.lock() {
            existing.extend(paths.into_iter().map(Into::into));
        }
        self
    }

    /// Every asset emitted so far, ordered by file name.
    pub fn assets(&self) -> Vec<EmittedAsset> {
        self.assets
            .lock()
            .map(|assets| {
                assets
                    .iter()
                    .map(|(file_name, source)| EmittedAsset {
                        file_name: file_name.clone(),
                        source: source.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn emit(&self, path: &Path, source: AssetSource) -> io::Result<()> {
        let mut assets = self
            .assets
            .lock()
            .map_err(|_| io::Error::other("asset store poisoned"))?;
        assets.insert(path.to_path_buf(), source);
        Ok(())
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    fn exists(&self, path: &Path) -> bool {
        let emitted = self
            .assets
            .lock()
            .map(|assets| assets.contains_key(path))
            .unwrap_or(false);
        emitted
            || self
                .existing
                .lock()
                .map(|existing| existing.iter().any(|p| p == path))
                .unwrap_or(false)
    }

    async fn write(&self, path: &Path, bytes: Vec<u8>) -> io::Result<()> {
        self.emit(path, AssetSource::Bytes(bytes))
    }

    async fn link(&self, original: &Path, path: &Path) -> io::Result<()> {
        self.emit(path, AssetSource::Link(original.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_sink_write_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a@400w.jpg");

        assert!(!FsSink.exists(&path));
        FsSink.write(&path, vec![1, 2, 3]).await.unwrap();
        assert!(FsSink.exists(&path));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fs_sink_link_is_relative() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.jpg");
        std::fs::write(&original, b"pixels").unwrap();
        let path = dir.path().join("a@4000w.jpg");

        FsSink.link(&original, &path).await.unwrap();

        assert_eq!(std::fs::read_link(&path).unwrap(), PathBuf::from("a.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"pixels");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fs_sink_write_replaces_link_not_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.jpg");
        std::fs::write(&original, b"pixels").unwrap();
        let path = dir.path().join("a@800w.jpg");

        FsSink.link(&original, &path).await.unwrap();
        FsSink.write(&path, b"upscaled".to_vec()).await.unwrap();

        assert_eq!(std::fs::read(&original).unwrap(), b"pixels");
        assert_eq!(std::fs::read(&path).unwrap(), b"upscaled");
        assert!(!path.symlink_metadata().unwrap().file_type().is_symlink());
        assert!(!dir.path().join("a@800w.jpg.part").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fs_sink_link_twice() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.jpg");
        std::fs::write(&original, b"pixels").unwrap();
        let path = dir.path().join("a@4000w.jpg");

        FsSink.link(&original, &path).await.unwrap();
        FsSink.link(&original, &path).await.unwrap();
        assert_eq!(std::fs::read_link(&path).unwrap(), PathBuf::from("a.jpg"));

        // A regular file left by an earlier upscale is replaced too
        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, b"old derivative").unwrap();
        FsSink.link(&original, &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_memory_sink_emits_assets() {
        let sink = MemorySink::new().with_existing(["old@400w.jpg"]);
        assert!(sink.exists(Path::new("old@400w.jpg")));
        assert!(!sink.exists(Path::new("a@400w.jpg")));

        sink.write(Path::new("a@400w.jpg"), vec![9]).await.unwrap();
        sink.link(Path::new("a.jpg"), Path::new("a@900w.jpg"))
            .await
            .unwrap();

        assert!(sink.exists(Path::new("a@400w.jpg")));
        assert_eq!(
            sink.assets(),
            vec![
                EmittedAsset {
                    file_name: PathBuf::from("a@400w.jpg"),
                    source: AssetSource::Bytes(vec![9]),
                },
                EmittedAsset {
                    file_name: PathBuf::from("a@900w.jpg"),
                    source: AssetSource::Link(PathBuf::from("a.jpg")),
                },
            ]
        );
    }
}
