//! Manifest output in JSON or JSON Lines.

use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::ManifestFormat;
use crate::types::GeneratedFile;

/// A writer that serializes items as a JSON array or as JSON Lines.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: ManifestFormat,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: ManifestFormat) -> Self {
        Self {
            writer,
            format,
            items_written: 0,
        }
    }

    /// Write all items: one array for JSON, one line each for JSONL.
    pub fn write_all<T: Serialize>(&mut self, items: &[T]) -> io::Result<()> {
        match self.format {
            ManifestFormat::Json => {
                serde_json::to_writer(&mut self.writer, items).map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
            ManifestFormat::Jsonl => {
                for item in items {
                    serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
                    writeln!(self.writer)?;
                }
            }
        }
        self.items_written += items.len();
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Write the generated-file list to `path`, creating parent directories.
///
/// # Arguments
///
/// * `path` - Manifest destination; an existing file is overwritten.
/// * `format` - JSON array or one JSON object per line.
/// * `files` - Entries in the order they should appear.
pub fn write_manifest(
    path: &Path,
    format: ManifestFormat,
    files: &[GeneratedFile],
) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = OutputWriter::new(BufWriter::new(File::create(path)?), format);
    writer.write_all(files)?;
    writer.flush()?;
    tracing::info!("Manifest with {} entries written to {:?}", files.len(), path);
    Ok(())
}

/// Read a manifest back (either format).
pub fn read_manifest(path: &Path) -> io::Result<Vec<GeneratedFile>> {
    let content = std::fs::read_to_string(path)?;
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(io::Error::other);
    }
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(io::Error::other))
        .collect()
}
