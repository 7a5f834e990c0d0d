//! Finding source images under the configured root directories.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{PipelineError, PipelineResult};

/// Characters that mark a file as an already-generated derivative.
pub const DERIVATIVE_MARKERS: [char; 2] = ['@', '#'];

/// Discovers source images in directories.
pub struct FileDiscovery {
    extensions: Vec<String>,
}

impl FileDiscovery {
    /// Create a discovery instance matching the given input extensions.
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Recursively find every source image under `roots`.
    ///
    /// Missing roots are skipped with a warning. A root that exists but
    /// cannot be read is an error. Paths are deduplicated and sorted so the
    /// submission order is deterministic.
    pub fn discover(&self, roots: &[PathBuf]) -> PipelineResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for root in roots {
            if !root.exists() {
                tracing::warn!("Image directory {:?} does not exist, skipping", root);
                continue;
            }

            for entry in WalkDir::new(root).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.depth() == 0 => {
                        return Err(PipelineError::Discovery {
                            root: root.clone(),
                            message: e.to_string(),
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Skipping unreadable entry under {:?}: {}", root, e);
                        continue;
                    }
                };

                let path = entry.path();
                if entry.file_type().is_file() && self.is_candidate(path) {
                    files.push(path.to_path_buf());
                }
            }
        }

        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Whether a path is a source image (matching extension, no marker).
    pub fn is_candidate(&self, path: &Path) -> bool {
        !is_derivative(path) && self.is_supported(path)
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.extensions.iter().any(|fmt| *fmt == ext_lower)
            })
            .unwrap_or(false)
    }
}

/// Whether a path carries a derivative marker anywhere in it.
pub fn is_derivative(path: &Path) -> bool {
    path.to_string_lossy().contains(DERIVATIVE_MARKERS)
}
