//! Shutdown save hook
//!
//! The host registers one [`SaveHook`] per process and calls [`SaveHook::run`]
//! from its exit path. Only the first call writes; later calls (for example
//! from a second exit path racing the first) return without touching the file.

use crate::data::ProjectData;
use crate::io;
use crate::result::ContarResult;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Flushes counters into the data model and writes the coverage file once
#[derive(Debug)]
pub struct SaveHook {
    project: Arc<ProjectData>,
    path: PathBuf,
    version: u32,
    done: AtomicBool,
}

impl SaveHook {
    /// Create a hook writing `project` to `path` with the given protocol version
    #[must_use]
    pub fn new(project: Arc<ProjectData>, path: impl Into<PathBuf>, version: u32) -> Self {
        Self {
            project,
            path: path.into(),
            version,
            done: AtomicBool::new(false),
        }
    }

    /// Destination file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the hook already ran
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Apply hits and save; returns `false` when a previous call already did
    pub fn run(&self) -> ContarResult<bool> {
        if self.done.swap(true, Ordering::AcqRel) {
            debug!(path = %self.path.display(), "coverage already saved");
            return Ok(false);
        }
        self.project.apply_hits();
        match io::save(&self.project, &self.path, self.version) {
            Ok(()) => {
                info!(
                    path = %self.path.display(),
                    classes = self.project.class_count(),
                    "coverage saved"
                );
                Ok(true)
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to save coverage");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::lock_class;
    use std::thread;

    #[test]
    fn test_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage.ic");
        let project = Arc::new(ProjectData::new());
        let handle = project.get_or_create_class_data("a.B");
        let _ = lock_class(&handle).get_or_create_line(3, "m()V");

        let hook = SaveHook::new(Arc::clone(&project), &path, 4);
        assert!(!hook.has_run());
        assert!(hook.run().unwrap());
        let first = std::fs::read(&path).unwrap();

        let _ = lock_class(&handle).get_or_create_line(4, "m()V");
        assert!(!hook.run().unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), first);
        assert!(hook.has_run());
    }

    #[test]
    fn test_concurrent_runs_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let hook = Arc::new(SaveHook::new(
            Arc::new(ProjectData::new()),
            dir.path().join("c.ic"),
            4,
        ));
        let writes: usize = (0..4)
            .map(|_| {
                let hook = Arc::clone(&hook);
                thread::spawn(move || hook.run().unwrap())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(writes, 1);
    }

    #[test]
    fn test_save_error_reported() {
        let dir = tempfile::tempdir().unwrap();
        let hook = SaveHook::new(
            Arc::new(ProjectData::new()),
            dir.path().join("missing").join("c.ic"),
            4,
        );
        assert!(hook.run().is_err());
        assert!(hook.has_run());
    }
}
