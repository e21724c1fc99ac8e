//! Filesystem collaborator and per-node change detection.
//!
//! The tree never walks directories. Each node owns a [`FileWatch`] on its
//! entry file and compares modification times through a [`FileProbe`] when
//! its staleness gate allows a check.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Minimal filesystem surface the tree needs.
#[cfg_attr(test, mockall::automock)]
pub trait FileProbe: Send + Sync {
    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Modification time of the file at `path`, or `None` if it is missing.
    fn modified(&self, path: &Path) -> Option<SystemTime>;
}

/// [`FileProbe`] backed by `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFs;

impl FileProbe for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        let metadata = std::fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        metadata.modified().ok()
    }
}

/// Outcome of comparing the entry file against the last observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileChange {
    /// Same state as last time (missing both times, or same mtime).
    Unchanged,
    /// The file appeared.
    Created,
    /// The file's modification time moved.
    Modified,
    /// The file disappeared.
    Removed,
}

impl FileChange {
    /// Anything other than [`FileChange::Unchanged`].
    pub fn is_change(self) -> bool {
        self != Self::Unchanged
    }
}

/// Watches one file by modification time.
#[derive(Clone, Debug)]
pub struct FileWatch {
    file: PathBuf,
    last_modified: Option<SystemTime>,
}

impl FileWatch {
    /// Watch `file`. Nothing has been observed yet.
    pub fn new(file: PathBuf) -> Self {
        Self {
            file,
            last_modified: None,
        }
    }

    /// The watched file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Directory containing the watched file.
    pub fn directory(&self) -> &Path {
        self.file.parent().unwrap_or(&self.file)
    }

    /// Whether the file existed at the last check.
    pub fn exists(&self) -> bool {
        self.last_modified.is_some()
    }

    /// Record the file's current state without reporting a change.
    pub fn sync(&mut self, fs: &dyn FileProbe) {
        self.last_modified = fs.modified(&self.file);
    }

    /// Compare the file against the previous observation and remember the
    /// new state.
    pub fn changed_since_last_check(&mut self, fs: &dyn FileProbe) -> FileChange {
        let current = fs.modified(&self.file);
        let change = match (self.last_modified, current) {
            (None, None) => FileChange::Unchanged,
            (None, Some(_)) => FileChange::Created,
            (Some(_), None) => FileChange::Removed,
            (Some(before), Some(now)) if before != now => FileChange::Modified,
            (Some(_), Some(_)) => FileChange::Unchanged,
        };
        self.last_modified = current;
        change
    }
}
