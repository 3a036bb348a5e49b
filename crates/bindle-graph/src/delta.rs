//! Single-flight delta computation over the shared graph.

use std::path::PathBuf;
use std::sync::Arc;

use bindle_fs::{ChangeBatch, ChangeKind};
use bindle_resolver::Module;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::broadcast;
use tracing::debug;

use crate::Result;
use crate::graph::DependencyGraph;
use crate::transformer::{TransformOptions, Transformer};
use crate::traversal::IncrementalTraversal;

const NOTIFY_CHANNEL_CAPACITY: usize = 16;

/// What changed since the previous [`DeltaCoordinator::get_delta`] call.
#[derive(Debug, Default)]
pub struct DeltaResult {
    /// Modules that were added or whose content changed, by path.
    pub modified: FxHashMap<PathBuf, Arc<Module>>,
    /// Paths removed from the graph.
    pub deleted: FxHashSet<PathBuf>,
    /// True for the first build, which reports every discovered module as
    /// modified.
    pub reset: bool,
}

impl DeltaResult {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Batches change notifications and turns them into graph deltas.
///
/// Builds are single-flight: at most one traversal runs at a time, and
/// concurrent `get_delta` callers serialize by awaiting the build lock.
/// Changes arriving *during* a build accumulate for the next call: the
/// pending set is swapped out atomically before each build and restored
/// wholesale if the build fails, so a failed batch is retried in full.
pub struct DeltaCoordinator<T: Transformer> {
    graph: Arc<DependencyGraph>,
    transformer: T,
    options: TransformOptions,
    entry_points: Vec<PathBuf>,
    build_lock: tokio::sync::Mutex<()>,
    pending: Mutex<FxHashSet<PathBuf>>,
    notifications: broadcast::Sender<()>,
}

impl<T: Transformer> DeltaCoordinator<T> {
    /// Create a coordinator for a set of entry points.
    ///
    /// An explicit platform must be one of the configured platforms; with no
    /// platform set, one is inferred from the first entry's file name when it
    /// carries a qualifier.
    pub fn new(
        graph: Arc<DependencyGraph>,
        transformer: T,
        mut options: TransformOptions,
        entry_points: Vec<PathBuf>,
    ) -> Result<Self> {
        if let Some(entry) = entry_points.first() {
            options.platform = graph.request_platform(entry, options.platform.as_deref())?;
        }
        let (notifications, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        Ok(Self {
            graph,
            transformer,
            options,
            entry_points,
            build_lock: tokio::sync::Mutex::new(()),
            pending: Mutex::new(FxHashSet::default()),
            notifications,
        })
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    /// Subscribe to change notifications. A notification fires after every
    /// delta with a non-empty `modified` set, and intentionally not for
    /// pure-deletion deltas.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notifications.subscribe()
    }

    /// Feed a watcher batch into the coordinator.
    ///
    /// Caches are invalidated immediately; modified and created paths
    /// accumulate as pending work. Deletions are not tracked as pending: a
    /// deleted file's edges disappear when a referrer's re-traversal stops
    /// mentioning it.
    pub fn notify_changed(&self, batch: &ChangeBatch) {
        self.graph.process_file_changes(&batch.events);
        let mut pending = self.pending.lock();
        for event in &batch.events {
            if event.kind == ChangeKind::Deleted {
                continue;
            }
            pending.insert(event.path.clone());
        }
    }

    /// Forward every batch from a filesystem watch subscription into this
    /// coordinator.
    pub fn spawn_watch_task(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<ChangeBatch>,
    ) -> tokio::task::JoinHandle<()>
    where
        T: 'static,
    {
        tokio::spawn(async move {
            while let Ok(batch) = changes.recv().await {
                self.notify_changed(&batch);
            }
        })
    }

    /// Compute the delta since the previous call.
    ///
    /// The first call traverses every entry point and reports `reset: true`
    /// with all discovered modules as modified. Later calls re-traverse only
    /// the pending changed files that are actually in the graph; saving a
    /// file outside the reachable set returns an empty delta without
    /// touching the traversal at all.
    pub async fn get_delta(&self) -> Result<DeltaResult> {
        let _build = self.build_lock.lock().await;

        let pending: FxHashSet<PathBuf> = std::mem::take(&mut *self.pending.lock());
        match self.build_delta(&pending).await {
            Ok(delta) => {
                if !delta.modified.is_empty() {
                    let _ = self.notifications.send(());
                }
                Ok(delta)
            }
            Err(error) => {
                // Nothing was committed for these files; put them back so the
                // next call retries the whole batch.
                self.pending.lock().extend(pending);
                Err(error)
            }
        }
    }

    async fn build_delta(&self, changed: &FxHashSet<PathBuf>) -> Result<DeltaResult> {
        let traversal = IncrementalTraversal::new(&self.graph, &self.transformer, &self.options);

        if self.graph.is_empty() {
            debug!(
                "building initial graph from {} entry point(s)",
                self.entry_points.len()
            );
            if let Err(error) = self.build_initial(&traversal).await {
                // A half-built graph would make the next call take the
                // incremental path and never finish discovery.
                self.graph.clear_edges();
                return Err(error);
            }
            let modified = self
                .graph
                .module_paths()
                .into_iter()
                .map(|path| {
                    let module = self.graph.module_for_path(&path);
                    (path, module)
                })
                .collect();
            return Ok(DeltaResult {
                modified,
                deleted: FxHashSet::default(),
                reset: true,
            });
        }

        // Edits to files outside the reachable set are irrelevant.
        let changed_in_graph: Vec<PathBuf> = changed
            .iter()
            .filter(|path| self.graph.contains(path))
            .cloned()
            .collect();
        if changed_in_graph.is_empty() {
            return Ok(DeltaResult::default());
        }

        let mut modified: FxHashMap<PathBuf, Arc<Module>> = changed_in_graph
            .iter()
            .map(|path| (path.clone(), self.graph.module_for_path(path)))
            .collect();

        let result = traversal.traverse_changed_files(&changed_in_graph).await?;
        for path in result.added {
            let module = self.graph.module_for_path(&path);
            modified.insert(path, module);
        }

        Ok(DeltaResult {
            modified,
            deleted: result.deleted,
            reset: false,
        })
    }

    async fn build_initial(&self, traversal: &IncrementalTraversal<'_, T>) -> Result<()> {
        for entry in &self.entry_points {
            let entry_path = self.graph.absolute_path(entry)?;
            traversal.initial_traversal(&entry_path).await?;
        }
        Ok(())
    }
}
