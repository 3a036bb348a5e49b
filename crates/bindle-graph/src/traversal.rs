//! Incremental traversal: patches the edge arena for a set of changed files.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::edges::EdgeGraph;
use crate::graph::DependencyGraph;
use crate::transformer::{TransformOptions, Transformer};
use crate::{GraphError, Result};

/// Paths added to and removed from the graph by one traversal call.
#[derive(Debug, Default)]
pub struct TraversalResult {
    pub added: FxHashSet<PathBuf>,
    pub deleted: FxHashSet<PathBuf>,
}

impl TraversalResult {
    fn merge(&mut self, other: TraversalResult) {
        self.added.extend(other.added);
        self.deleted.extend(other.deleted);
    }
}

/// One traversal pass over the shared graph.
///
/// Instead of re-walking the whole project, a pass diffs each changed file's
/// current reference list against its recorded edges: new references are
/// resolved and traversed into (visiting each node at most once, which makes
/// cycles safe), dropped references are removed with a reference-counted
/// cascade through everything they solely kept alive.
pub struct IncrementalTraversal<'a, T: Transformer + ?Sized> {
    graph: &'a DependencyGraph,
    transformer: &'a T,
    options: &'a TransformOptions,
}

impl<'a, T: Transformer + ?Sized> IncrementalTraversal<'a, T> {
    pub fn new(
        graph: &'a DependencyGraph,
        transformer: &'a T,
        options: &'a TransformOptions,
    ) -> Self {
        Self {
            graph,
            transformer,
            options,
        }
    }

    /// Seed the graph with an entry point and traverse everything reachable
    /// from it. Called exactly once per entry, before any incremental pass.
    pub async fn initial_traversal(&self, entry: &Path) -> Result<TraversalResult> {
        self.graph.edges_mut().create(entry);
        self.traverse_single_file(entry).await
    }

    /// Re-traverse a batch of changed files.
    ///
    /// Sub-traversals run concurrently and all of them complete; if any
    /// failed, the batch result is the first error.
    pub async fn traverse_changed_files(&self, paths: &[PathBuf]) -> Result<TraversalResult> {
        let outcomes = join_all(
            paths
                .iter()
                .map(|path| self.traverse_single_file(path)),
        )
        .await;

        let mut merged = TraversalResult::default();
        for outcome in outcomes {
            merged.merge(outcome?);
        }
        Ok(merged)
    }

    /// Diff one file's declared references against its recorded edges.
    ///
    /// Every *current* reference is resolved before any mutation, so a
    /// resolution error introduced by an unrelated filesystem change (a
    /// sibling disappearing, say) aborts the call with the graph untouched.
    /// The diff runs on `(reference, resolved target)` pairs: a pair is stale
    /// when the reference is gone or now resolves elsewhere. Removals are
    /// applied before additions so a reference whose target moved is recorded
    /// against the new path.
    async fn traverse_single_file(&self, path: &Path) -> Result<TraversalResult> {
        if !self.graph.contains(path) {
            // The file is not part of the graph (any more); nothing to do.
            return Ok(TraversalResult::default());
        }

        let references = self.shallow_references(path).await?;
        let parent = self.graph.module_for_path(path);
        let platform = self.options.platform.as_deref();

        let mut current: IndexMap<String, PathBuf> = IndexMap::new();
        for reference in &references {
            let target = self.graph.resolve_dependency(&parent, reference, platform)?;
            current.insert(reference.clone(), target.path().to_path_buf());
        }
        let current_targets: FxHashSet<&PathBuf> = current.values().collect();

        let previous: Vec<(String, PathBuf)> = self
            .graph
            .edges()
            .get(path)
            .map(|edge| {
                edge.dependencies()
                    .iter()
                    .map(|(reference, target)| (reference.clone(), target.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let previous_map: FxHashMap<&String, &PathBuf> =
            previous.iter().map(|(reference, target)| (reference, target)).collect();

        let mut result = TraversalResult::default();

        {
            let mut edges = self.graph.edges_mut();
            for (reference, target) in &previous {
                if current.get(reference) == Some(target) {
                    continue;
                }
                if current_targets.contains(target) {
                    // Another reference still reaches the target; only the
                    // stale entry goes.
                    if let Some(edge) = edges.get_mut(path) {
                        edge.dependencies.shift_remove(reference);
                    }
                } else {
                    remove_dependency(&mut edges, path, reference, path, &mut result.deleted);
                }
            }
        }

        for (reference, target) in &current {
            if previous_map.get(reference) == Some(&target) {
                continue;
            }
            self.add_dependency(path, reference, &mut result.added)
                .await?;
        }

        // Reinstate declaration order: incremental edits append re-added
        // references at the end of the map otherwise.
        {
            let mut edges = self.graph.edges_mut();
            if let Some(edge) = edges.get_mut(path) {
                edge.dependencies = current;
            }
        }

        debug!(
            "traversed {}: +{} -{}",
            path.display(),
            result.added.len(),
            result.deleted.len()
        );
        Ok(result)
    }

    /// Record one new edge and traverse into the target if it is new to the
    /// graph.
    ///
    /// The worklist replaces recursion: a target that already has a node only
    /// gains an inverse link and is not revisited, so reference cycles
    /// terminate and fan-in costs one set insertion.
    async fn add_dependency(
        &self,
        parent: &Path,
        reference: &str,
        added: &mut FxHashSet<PathBuf>,
    ) -> Result<()> {
        let platform = self.options.platform.as_deref();
        let mut queue: VecDeque<(PathBuf, String)> = VecDeque::new();
        queue.push_back((parent.to_path_buf(), reference.to_string()));

        while let Some((from_path, reference)) = queue.pop_front() {
            let from_module = self.graph.module_for_path(&from_path);
            let target = self
                .graph
                .resolve_dependency(&from_module, &reference, platform)?;
            let target_path = target.path().to_path_buf();

            let newly_created = {
                let mut edges = self.graph.edges_mut();
                if let Some(from_edge) = edges.get_mut(&from_path) {
                    from_edge
                        .dependencies
                        .insert(reference.clone(), target_path.clone());
                }
                match edges.get_mut(&target_path) {
                    Some(target_edge) => {
                        target_edge.inverse_dependencies.insert(from_path.clone());
                        false
                    }
                    None => {
                        let target_edge = edges.create(&target_path);
                        target_edge.inverse_dependencies.insert(from_path.clone());
                        true
                    }
                }
            };
            if !newly_created {
                continue;
            }

            added.insert(target_path.clone());
            for child in self.shallow_references(&target_path).await? {
                queue.push_back((target_path.clone(), child));
            }
        }
        Ok(())
    }

    /// Reference list of a module; assets and JSON carry none.
    async fn shallow_references(&self, path: &Path) -> Result<Vec<String>> {
        let module = self.graph.module_for_path(path);
        if module.kind().is_asset() || module.kind().is_json() {
            return Ok(Vec::new());
        }
        self.transformer
            .shallow_references(path, self.options)
            .await
            .map_err(|source| GraphError::Transform {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Drop `parent`'s edge for `reference`; if that leaves the target without
/// referrers, remove it and cascade through its own recorded edges.
///
/// The target is looked up through the parent's own dependency map, not by
/// re-resolving the reference string: the referenced file may already be gone
/// from disk. `protected` is the file whose pass this is; a cycle running
/// back through it must not destroy the node mid-diff.
fn remove_dependency(
    edges: &mut EdgeGraph,
    parent: &Path,
    reference: &str,
    protected: &Path,
    deleted: &mut FxHashSet<PathBuf>,
) {
    let Some(target) = edges
        .get(parent)
        .and_then(|edge| edge.dependencies.get(reference))
        .cloned()
    else {
        return;
    };
    if !edges.contains(&target) {
        return;
    }

    if let Some(parent_edge) = edges.get_mut(parent) {
        parent_edge.dependencies.shift_remove(reference);
    }

    let orphaned = match edges.get_mut(&target) {
        Some(target_edge) => {
            target_edge.inverse_dependencies.remove(parent);
            target_edge.inverse_dependencies.is_empty()
        }
        None => return,
    };
    if !orphaned || target == protected {
        // Still used elsewhere, or the file this pass is diffing; the node
        // stays.
        return;
    }

    deleted.insert(target.clone());
    let sub_references: Vec<String> = edges
        .get(&target)
        .map(|edge| edge.dependencies.keys().cloned().collect())
        .unwrap_or_default();
    for sub_reference in &sub_references {
        remove_dependency(edges, &target, sub_reference, protected, deleted);
    }
    edges.destroy(&target);
}
