//! Registry of partially written files.
//!
//! A destination path is registered before its first byte is written and
//! unregistered once the file is complete or removed. Whatever is still
//! registered after a crash or cancellation is an orphan that
//! [`InFlight::cleanup`] deletes.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

/// Shared handle to the registry; clones refer to the same set.
#[derive(Clone, Debug, Default)]
pub struct InFlight {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl InFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn paths(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // A panic while holding the lock leaves the set itself intact.
        self.paths
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn register(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        trace!("in flight: {}", path.display());
        self.paths().insert(path);
    }

    pub fn unregister(&self, path: &Path) {
        if self.paths().remove(path) {
            trace!("landed: {}", path.display());
        }
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths().contains(path)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths().is_empty()
    }

    /// Registered paths, sorted.
    #[must_use]
    pub fn paths_sorted(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.paths().iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Deletes every registered file and clears the registry.
    ///
    /// Returns the number of files removed. Files that are already gone
    /// are dropped from the registry silently.
    pub fn cleanup(&self) -> usize {
        let paths: Vec<PathBuf> = self.paths().drain().collect();
        let mut removed = 0;
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("removed partial file {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("could not remove partial file {}: {e}", path.display()),
            }
        }
        removed
    }
}
