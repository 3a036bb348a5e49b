//! Per-request resolution policy and the memoizing resolution cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::module::Module;
use crate::resolver::ModuleResolver;
use crate::{Result, is_relative_reference};

/// Memoizes `(fromPath, reference, platform) → module`.
///
/// Owned by whoever owns the graph and passed by reference into requests, so
/// independent graphs (tests, multiple projects in one process) never share
/// entries. Invalidation is wholesale: any watched filesystem change clears
/// the entire cache.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: DashMap<(PathBuf, String, Option<String>), Arc<Module>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, from: &Path, reference: &str, platform: Option<&str>) -> Option<Arc<Module>> {
        self.entries
            .get(&(
                from.to_path_buf(),
                reference.to_string(),
                platform.map(str::to_string),
            ))
            .map(|module| Arc::clone(&module))
    }

    fn insert(&self, from: &Path, reference: &str, platform: Option<&str>, module: Arc<Module>) {
        self.entries.insert(
            (
                from.to_path_buf(),
                reference.to_string(),
                platform.map(str::to_string),
            ),
            module,
        );
    }

    /// Drop every memoized resolution.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One resolution context: a resolver, a cache, and a platform.
///
/// Policy lives here: path references and references originating inside
/// vendor trees go straight to the vendor mechanics; everything else tries
/// the global-name registry first and falls back to the vendor walk only on
/// the "nothing matched" failure kind; ambiguity errors propagate.
pub struct ResolutionRequest<'a> {
    resolver: &'a ModuleResolver,
    cache: &'a ResolutionCache,
    platform: Option<String>,
}

impl<'a> ResolutionRequest<'a> {
    pub fn new(
        resolver: &'a ModuleResolver,
        cache: &'a ResolutionCache,
        platform: Option<&str>,
    ) -> Self {
        Self {
            resolver,
            cache,
            platform: platform.map(str::to_string),
        }
    }

    /// Resolve `reference` as declared by `from`.
    pub fn resolve_dependency(&self, from: &Module, reference: &str) -> Result<Arc<Module>> {
        let platform = self.platform.as_deref();
        if let Some(module) = self.cache.get(from.path(), reference, platform) {
            return Ok(module);
        }

        let is_path_reference =
            is_relative_reference(reference) || Path::new(reference).is_absolute();
        let module = if !self.resolver.is_vendor_path(from.path()) && !is_path_reference {
            match self
                .resolver
                .resolve_registry_dependency(from, reference, platform)
            {
                Ok(module) => Ok(module),
                Err(error) if error.is_unresolved() => {
                    trace!(
                        "registry miss for `{reference}` from `{}`, searching vendor directories",
                        from.path().display()
                    );
                    self.resolver
                        .resolve_vendor_dependency(from, reference, platform)
                }
                Err(error) => Err(error),
            }
        } else {
            self.resolver
                .resolve_vendor_dependency(from, reference, platform)
        }?;

        self.cache
            .insert(from.path(), reference, platform, Arc::clone(&module));
        Ok(module)
    }
}
