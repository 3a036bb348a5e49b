//! Graph orchestration: owns the edge arena, the caches, and resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bindle_fs::{ChangeEvent, FileSystem};
use bindle_resolver::{
    Module, ModuleResolver, NameRegistry, ResolutionCache, ResolutionRequest, ResolverConfig,
    platform_from_file_name,
};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use path_clean::PathClean;

use crate::edges::EdgeGraph;
use crate::{GraphError, Result};

/// The persistent dependency graph of one project.
///
/// Owns the edge arena, the module/descriptor caches (through the resolver),
/// and the resolution cache. Mutation happens only inside
/// [`IncrementalTraversal`](crate::IncrementalTraversal), under the
/// [`DeltaCoordinator`](crate::DeltaCoordinator)'s single-flight discipline;
/// everything else reads.
#[derive(Debug)]
pub struct DependencyGraph {
    resolver: ModuleResolver,
    resolution_cache: ResolutionCache,
    edges: RwLock<EdgeGraph>,
}

impl DependencyGraph {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        config: ResolverConfig,
        registry: Arc<dyn NameRegistry>,
    ) -> Self {
        Self {
            resolver: ModuleResolver::new(fs, config, registry),
            resolution_cache: ResolutionCache::new(),
            edges: RwLock::new(EdgeGraph::default()),
        }
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub fn resolution_cache(&self) -> &ResolutionCache {
        &self.resolution_cache
    }

    /// The module object for a path.
    pub fn module_for_path(&self, path: &Path) -> Arc<Module> {
        self.resolver.module_for_path(path)
    }

    /// Resolve one reference as declared by `from`, through the graph's
    /// resolution cache.
    pub fn resolve_dependency(
        &self,
        from: &Module,
        reference: &str,
        platform: Option<&str>,
    ) -> Result<Arc<Module>> {
        let request = ResolutionRequest::new(&self.resolver, &self.resolution_cache, platform);
        Ok(request.resolve_dependency(from, reference)?)
    }

    /// Normalize an entry path: absolute paths pass through (cleaned),
    /// relative ones are probed against each configured root in order.
    pub fn absolute_path(&self, entry: &Path) -> Result<PathBuf> {
        if entry.is_absolute() {
            return Ok(entry.to_path_buf().clean());
        }
        let fs = self.resolver.fs();
        for root in &self.resolver.config().roots {
            let candidate = root.join(entry).clean();
            if fs.exists(&candidate) {
                return Ok(candidate);
            }
        }
        Err(GraphError::EntryNotFound(entry.to_path_buf()))
    }

    /// Validate an explicit platform, or infer one from a platform-qualified
    /// entry file name (`index.ios.js` implies `ios`).
    pub fn request_platform(
        &self,
        entry: &Path,
        platform: Option<&str>,
    ) -> Result<Option<String>> {
        let platforms = &self.resolver.config().platforms;
        match platform {
            Some(platform) if platforms.contains(platform) => Ok(Some(platform.to_string())),
            Some(platform) => Err(GraphError::UnknownPlatform(platform.to_string())),
            None => Ok(platform_from_file_name(entry, platforms)),
        }
    }

    /// React to a filesystem change batch.
    ///
    /// Caches are invalidated wholesale (resolution memo, descriptors) and
    /// the touched module objects dropped for re-classification. This runs on
    /// every watched event, whether or not a traversal is in flight.
    pub fn process_file_changes(&self, events: &[ChangeEvent]) {
        self.resolution_cache.clear();
        self.resolver.packages().clear();
        for event in events {
            self.resolver.modules().remove(&event.path);
        }
    }

    /// Whether `path` currently has a node in the graph.
    pub fn contains(&self, path: &Path) -> bool {
        self.edges.read().contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.read().len()
    }

    /// Paths of every module currently in the graph.
    pub fn module_paths(&self) -> Vec<PathBuf> {
        self.edges.read().paths().cloned().collect()
    }

    /// A module's forward edges in declaration order, if it is in the graph.
    pub fn dependencies_of(&self, path: &Path) -> Option<Vec<(String, PathBuf)>> {
        self.edges.read().get(path).map(|edge| {
            edge.dependencies()
                .iter()
                .map(|(reference, target)| (reference.clone(), target.clone()))
                .collect()
        })
    }

    /// A module's inverse edges, sorted, if it is in the graph.
    pub fn inverse_dependencies_of(&self, path: &Path) -> Option<Vec<PathBuf>> {
        self.edges.read().get(path).map(|edge| {
            let mut paths: Vec<PathBuf> = edge.inverse_dependencies().iter().cloned().collect();
            paths.sort();
            paths
        })
    }

    /// Throw away every node. Used when an initial build fails partway so the
    /// next build starts from scratch instead of seeing a half-built graph.
    pub(crate) fn clear_edges(&self) {
        *self.edges.write() = EdgeGraph::default();
    }

    pub(crate) fn edges(&self) -> RwLockReadGuard<'_, EdgeGraph> {
        self.edges.read()
    }

    pub(crate) fn edges_mut(&self) -> RwLockWriteGuard<'_, EdgeGraph> {
        self.edges.write()
    }
}
