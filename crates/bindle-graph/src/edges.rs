//! The edge arena: graph nodes keyed by path with explicit adjacency.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

/// One module's adjacency in the graph.
///
/// `dependencies` maps each declared reference string to the path it resolved
/// to, in declaration order. `inverse_dependencies` is the set of modules
/// currently holding an edge to this one; it is empty only transiently,
/// immediately before the node is cascade-removed.
#[derive(Debug, Clone, Default)]
pub struct DependencyEdge {
    pub(crate) dependencies: IndexMap<String, PathBuf>,
    pub(crate) inverse_dependencies: FxHashSet<PathBuf>,
}

impl DependencyEdge {
    /// Reference string → resolved path, in declaration order.
    pub fn dependencies(&self) -> &IndexMap<String, PathBuf> {
        &self.dependencies
    }

    /// Paths of the modules that depend on this one.
    pub fn inverse_dependencies(&self) -> &FxHashSet<PathBuf> {
        &self.inverse_dependencies
    }
}

/// Arena of [`DependencyEdge`]s keyed by absolute module path.
///
/// A path has a node here iff it is reachable from a traversed entry point
/// and not yet removed. Cycles are plain data: adjacency is stored as paths,
/// never as references between nodes.
#[derive(Debug, Default)]
pub struct EdgeGraph {
    edges: FxHashMap<PathBuf, DependencyEdge>,
}

impl EdgeGraph {
    /// Insert an empty node for `path`, replacing any existing node.
    pub fn create(&mut self, path: &Path) -> &mut DependencyEdge {
        let edge = self.edges.entry(path.to_path_buf()).or_default();
        *edge = DependencyEdge::default();
        edge
    }

    /// Remove the node for `path`.
    pub fn destroy(&mut self, path: &Path) {
        self.edges.remove(path);
    }

    pub fn get(&self, path: &Path) -> Option<&DependencyEdge> {
        self.edges.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut DependencyEdge> {
        self.edges.get_mut(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.edges.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Paths of every node currently in the graph.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.edges.keys()
    }
}
