//! Shared accumulator of generated-file records.
//!
//! Planning records pre-existing derivatives and concurrently running image
//! tasks record fresh ones; both go through the same handle. Each
//! (image, width, format) is stored once no matter how often it is reported.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::GeneratedFile;

#[derive(Default)]
struct Inner {
    files: Vec<GeneratedFile>,
    seen: HashSet<GeneratedFile>,
}

/// Cloneable handle to the run's record list.
#[derive(Clone, Default)]
pub struct GeneratedFiles {
    inner: Arc<Mutex<Inner>>,
}

impl GeneratedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Returns `false` if it was already present.
    pub fn record(&self, file: GeneratedFile) -> bool {
        let mut inner = self.lock();
        if inner.seen.contains(&file) {
            tracing::debug!(
                "Duplicate record ignored: {:?} @{}w.{}",
                file.image,
                file.width,
                file.format
            );
            return false;
        }
        inner.seen.insert(file.clone());
        inner.files.push(file);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the records in the order they were appended.
    pub fn snapshot(&self) -> Vec<GeneratedFile> {
        self.lock().files.clone()
    }

    /// Take the records out, leaving the accumulator empty.
    pub fn take(&self) -> Vec<GeneratedFile> {
        let mut inner = self.lock();
        inner.seen.clear();
        std::mem::take(&mut inner.files)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a task panicked mid-append; the list
        // itself is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for GeneratedFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedFiles")
            .field("len", &self.len())
            .finish()
    }
}
