//! # bindle-fs
//!
//! The filesystem oracle used by the bindle resolver and dependency graph.
//!
//! Everything above this crate talks to the project tree exclusively through
//! the [`FileSystem`] trait: existence checks, directory listings, file reads,
//! and a change subscription. Two implementations are provided:
//!
//! - [`OsFileSystem`], backed by `std::fs`, with an optional `notify`-based
//!   recursive watcher that debounces raw events into [`ChangeBatch`]es.
//! - `MemoryFileSystem` (feature `test-utils`), an in-memory tree for
//!   deterministic tests, with the same change-event surface.
//!
//! Queries are synchronous: resolution probes them in tight loops and the
//! backing data is either the OS dentry cache or an in-memory map. Change
//! events are delivered through a `tokio::sync::broadcast` channel so any
//! number of graphs can subscribe to one filesystem.

mod filesystem;
#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod os;

use std::path::PathBuf;

pub use filesystem::{ChangeBatch, ChangeEvent, ChangeKind, FileSystem};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryFileSystem;
pub use os::OsFileSystem;

/// Errors that can occur while querying or watching the filesystem.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// Path does not exist or is not the expected kind of entry.
    #[error("no such file: {}", .0.display())]
    NotFound(PathBuf),

    /// Underlying I/O failure.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not contain valid UTF-8.
    #[error("{} is not valid utf-8", .0.display())]
    NotUtf8(PathBuf),

    /// Failure setting up or running the file watcher.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Result type alias for filesystem operations.
pub type Result<T> = std::result::Result<T, FsError>;
