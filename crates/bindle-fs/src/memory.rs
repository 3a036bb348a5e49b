//! In-memory filesystem for deterministic tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use path_clean::PathClean;
use tokio::sync::broadcast;

use crate::filesystem::{ChangeBatch, ChangeEvent, ChangeKind, FileSystem};
use crate::{FsError, Result};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A [`FileSystem`] holding its whole tree in a map.
///
/// Directories are implicit: a path is a directory iff some file lives below
/// it. Mutations emit the same [`ChangeBatch`]es a watched [`OsFileSystem`]
/// would, one event per call, so watcher wiring can be exercised without
/// touching a real disk.
///
/// [`OsFileSystem`]: crate::OsFileSystem
#[derive(Debug)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<PathBuf, String>>,
    changes: broadcast::Sender<ChangeBatch>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            files: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    /// Build a filesystem from `(path, content)` pairs.
    pub fn with_files<I, P, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let fs = Self::new();
        {
            let mut files = fs.files.write();
            for (path, content) in entries {
                files.insert(path.into().clean(), content.into());
            }
        }
        fs
    }

    /// Create or overwrite a file, emitting the corresponding change event.
    pub fn write_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let path = path.into().clean();
        let kind = {
            let mut files = self.files.write();
            match files.insert(path.clone(), content.into()) {
                Some(_) => ChangeKind::Modified,
                None => ChangeKind::Created,
            }
        };
        self.emit(kind, path);
    }

    /// Remove a file, emitting a deletion event. Removing a missing path is a
    /// no-op.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf().clean();
        let removed = self.files.write().remove(&path).is_some();
        if removed {
            self.emit(ChangeKind::Deleted, path);
        }
    }

    fn emit(&self, kind: ChangeKind, path: PathBuf) {
        let _ = self
            .changes
            .send(ChangeBatch::new(vec![ChangeEvent::new(kind, path)]));
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(&path.to_path_buf().clean())
    }

    fn is_directory(&self, path: &Path) -> bool {
        let path = path.to_path_buf().clean();
        let files = self.files.read();
        files
            .range(path.clone()..)
            .take_while(|(p, _)| p.starts_with(&path))
            .any(|(p, _)| *p != path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<String>> {
        let path = path.to_path_buf().clean();
        let files = self.files.read();
        let mut names = BTreeSet::new();
        for child in files.keys() {
            if let Ok(rest) = child.strip_prefix(&path) {
                if let Some(first) = rest.components().next() {
                    if let Some(name) = first.as_os_str().to_str() {
                        names.insert(name.to_string());
                    }
                }
            }
        }
        if names.is_empty() {
            return Err(FsError::NotFound(path));
        }
        Ok(names.into_iter().collect())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let path = path.to_path_buf().clean();
        self.files
            .read()
            .get(&path)
            .cloned()
            .ok_or(FsError::NotFound(path))
    }

    fn watch(&self) -> broadcast::Receiver<ChangeBatch> {
        self.changes.subscribe()
    }
}
