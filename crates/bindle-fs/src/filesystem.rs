//! The `FileSystem` trait and change-event types.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::sync::broadcast;

use crate::Result;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File was created.
    Created,
    /// File content was modified.
    Modified,
    /// File was removed.
    Deleted,
}

/// A single file-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// A coalesced queue of change events delivered as one unit.
///
/// Watchers debounce raw notifications and flush everything observed in the
/// quiet window as a single batch, so consumers process an edit burst (editor
/// save, branch switch) atomically instead of once per file.
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    pub events: Vec<ChangeEvent>,
}

impl ChangeBatch {
    pub fn new(events: Vec<ChangeEvent>) -> Self {
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Queryable, watchable view of the project tree.
///
/// All resolution and graph code goes through this trait; nothing above
/// `bindle-fs` touches `std::fs` directly. Implementations must be cheap to
/// query: `exists` in particular is called in tight candidate-probing loops.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Whether a file exists at `path`. Directories return `false`.
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` names a directory.
    fn is_directory(&self, path: &Path) -> bool;

    /// Names (not paths) of the direct children of the directory at `path`.
    fn read_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Read the file at `path` as UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Subscribe to change batches.
    ///
    /// Every subscriber receives every batch; a filesystem with no watcher
    /// attached simply never sends.
    fn watch(&self) -> broadcast::Receiver<ChangeBatch>;
}
