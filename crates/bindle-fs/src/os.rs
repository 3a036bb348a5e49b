//! OS-backed filesystem with an optional debounced `notify` watcher.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::filesystem::{ChangeBatch, ChangeEvent, ChangeKind, FileSystem};
use crate::{FsError, Result};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// `std::fs`-backed [`FileSystem`].
///
/// Created plain with [`OsFileSystem::new`] (no change events) or with
/// [`OsFileSystem::watching`], which attaches a recursive watcher to a root
/// directory and flushes one [`ChangeBatch`] per debounce window.
pub struct OsFileSystem {
    changes: broadcast::Sender<ChangeBatch>,
    // Kept alive for the lifetime of this filesystem; dropping it stops the
    // native watch.
    _watcher: Mutex<Option<RecommendedWatcher>>,
}

impl std::fmt::Debug for OsFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsFileSystem")
            .field("watching", &self._watcher.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl OsFileSystem {
    /// A filesystem with no watcher attached. `watch()` receivers never fire.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            changes,
            _watcher: Mutex::new(None),
        }
    }

    /// A filesystem watching `root` recursively.
    ///
    /// Raw notifications are coalesced: after the first event arrives, the
    /// collector keeps draining until `debounce` elapses with no further
    /// events, then broadcasts everything as a single batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the native watcher cannot be created or `root`
    /// cannot be watched.
    pub fn watching(root: &Path, debounce: Duration) -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::channel::<ChangeEvent>();
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(error) => {
                    debug!("watch error: {error}");
                    return;
                }
            };
            let kind = match event.kind {
                EventKind::Create(_) => ChangeKind::Created,
                EventKind::Modify(_) => ChangeKind::Modified,
                EventKind::Remove(_) => ChangeKind::Deleted,
                _ => return,
            };
            for path in event.paths {
                let _ = raw_tx.send(ChangeEvent::new(kind, path));
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        let batch_tx = changes.clone();
        std::thread::spawn(move || {
            while let Ok(first) = raw_rx.recv() {
                let mut events = vec![first];
                while let Ok(event) = raw_rx.recv_timeout(debounce) {
                    events.push(event);
                }
                // No receivers is fine; batches are only interesting once a
                // graph subscribes.
                let _ = batch_tx.send(ChangeBatch::new(events));
            }
        });

        Ok(Self {
            changes,
            _watcher: Mutex::new(Some(watcher)),
        })
    }
}

impl Default for OsFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
    }

    fn is_directory(&self, path: &Path) -> bool {
        fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<String>> {
        let entries = fs::read_dir(path).map_err(|source| io_error(path, source))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(path, source))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
            io::ErrorKind::InvalidData => FsError::NotUtf8(path.to_path_buf()),
            _ => io_error(path, source),
        })
    }

    fn watch(&self) -> broadcast::Receiver<ChangeBatch> {
        self.changes.subscribe()
    }
}

fn io_error(path: &Path, source: io::Error) -> FsError {
    FsError::Io {
        path: PathBuf::from(path),
        source,
    }
}
