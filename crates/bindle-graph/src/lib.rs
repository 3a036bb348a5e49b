//! # bindle-graph
//!
//! The persistent, incrementally-maintained dependency graph.
//!
//! A [`DependencyGraph`] is built once from a set of entry points and then
//! patched edge-by-edge as files change: the [`DeltaCoordinator`] batches
//! watcher notifications and runs [`IncrementalTraversal`] over exactly the
//! files whose edges may have moved, returning the set of added/modified and
//! deleted modules per request.
//!
//! Graph nodes are [`DependencyEdge`]s keyed by absolute path in an arena,
//! with explicit forward and inverse adjacency: removal is a
//! reference-count-to-zero cascade, and cycles are handled by visiting each
//! node at most once per pass.
//!
//! Reading a module's declared reference strings is delegated to the
//! [`Transformer`] collaborator; this crate never parses file content itself.

mod delta;
mod edges;
mod graph;
mod transformer;
mod traversal;

use std::path::PathBuf;

pub use bindle_resolver::ResolveError;
pub use delta::{DeltaCoordinator, DeltaResult};
pub use edges::{DependencyEdge, EdgeGraph};
pub use graph::DependencyGraph;
pub use transformer::{TransformError, TransformOptions, Transformer};
pub use traversal::{IncrementalTraversal, TraversalResult};

/// Errors surfaced while building or patching the graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A reference string could not be resolved to a file.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The transformer collaborator failed to produce a reference list.
    #[error("failed to read references of `{}`: {source}", path.display())]
    Transform {
        path: PathBuf,
        #[source]
        source: TransformError,
    },

    /// An entry path matched none of the configured roots.
    #[error("entry file `{}` not found in any project root", .0.display())]
    EntryNotFound(PathBuf),

    /// The requested platform is not one of the configured platforms.
    #[error("unrecognized platform `{0}`")]
    UnknownPlatform(String),
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
