//! Module model and the lazily-populated module cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bindle_fs::FileSystem;
use dashmap::DashMap;
use rustc_hash::FxHashSet;

use crate::assets::parse_asset_name;
use crate::package::DESCRIPTOR_FILENAME;

/// What a module file is, decided once when the module object is created.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleKind {
    /// Ordinary source file.
    Script,
    /// JSON data file; carries no references of its own.
    Json,
    /// Asset file; `scale` is the density variant parsed from the file name
    /// (`img@2x.png` has scale 2.0, a bare `img.png` has 1.0).
    Asset { scale: f64 },
    /// Host-injected module, never produced by resolution.
    Polyfill,
}

impl ModuleKind {
    pub fn is_asset(&self) -> bool {
        matches!(self, Self::Asset { .. })
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_polyfill(&self) -> bool {
        matches!(self, Self::Polyfill)
    }
}

/// A module, identified by its absolute file path.
///
/// Two modules are the same module iff their paths are equal. Instances are
/// created by [`ModuleCache`] and shared as `Arc`; they are immutable, and a
/// content change drops the cache entry so the next access re-derives the
/// classification.
#[derive(Debug, Clone)]
pub struct Module {
    path: PathBuf,
    kind: ModuleKind,
    package: Option<PathBuf>,
}

impl Module {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    /// Descriptor file of the package this module belongs to, if any.
    pub fn package(&self) -> Option<&Path> {
        self.package.as_deref()
    }
}

/// Process-lifetime cache of [`Module`] objects keyed by path.
#[derive(Debug)]
pub struct ModuleCache {
    fs: Arc<dyn FileSystem>,
    asset_exts: FxHashSet<String>,
    platforms: FxHashSet<String>,
    modules: DashMap<PathBuf, Arc<Module>>,
}

impl ModuleCache {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        asset_exts: FxHashSet<String>,
        platforms: FxHashSet<String>,
    ) -> Self {
        Self {
            fs,
            asset_exts,
            platforms,
            modules: DashMap::new(),
        }
    }

    /// Get or create the module at `path`.
    pub fn get(&self, path: &Path) -> Arc<Module> {
        if let Some(module) = self.modules.get(path) {
            return Arc::clone(&module);
        }
        let module = Arc::new(Module {
            path: path.to_path_buf(),
            kind: self.classify(path),
            package: self.owning_package(path),
        });
        self.modules.insert(path.to_path_buf(), Arc::clone(&module));
        module
    }

    /// Get or create the asset module at `path`.
    ///
    /// Classification by extension already yields an asset kind for asset
    /// paths; this exists so call sites that *require* an asset say so.
    pub fn get_asset(&self, path: &Path) -> Arc<Module> {
        self.get(path)
    }

    /// Register a host-injected polyfill module.
    pub fn create_polyfill(&self, path: &Path) -> Arc<Module> {
        let module = Arc::new(Module {
            path: path.to_path_buf(),
            kind: ModuleKind::Polyfill,
            package: None,
        });
        self.modules.insert(path.to_path_buf(), Arc::clone(&module));
        module
    }

    /// Drop the cached object for `path` so the next access re-classifies it.
    pub fn remove(&self, path: &Path) {
        self.modules.remove(path);
    }

    /// Whether a file name (or path) has an asset extension.
    pub fn is_asset_file(&self, name: &str) -> bool {
        extension_of(name)
            .map(|ext| self.asset_exts.contains(ext))
            .unwrap_or(false)
    }

    fn classify(&self, path: &Path) -> ModuleKind {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return ModuleKind::Script;
        };
        match extension_of(name) {
            Some("json") => ModuleKind::Json,
            Some(ext) if self.asset_exts.contains(ext) => {
                let scale = parse_asset_name(name, &self.platforms)
                    .map(|asset| asset.scale)
                    .unwrap_or(1.0);
                ModuleKind::Asset { scale }
            }
            _ => ModuleKind::Script,
        }
    }

    /// Walk ancestor directories for the closest package descriptor.
    fn owning_package(&self, path: &Path) -> Option<PathBuf> {
        let mut dir = path.parent()?;
        loop {
            let candidate = dir.join(DESCRIPTOR_FILENAME);
            if self.fs.exists(&candidate) {
                return Some(candidate);
            }
            dir = dir.parent()?;
        }
    }
}

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindle_fs::MemoryFileSystem;

    fn cache() -> ModuleCache {
        let fs = Arc::new(MemoryFileSystem::with_files([
            ("/root/index.js", ""),
            ("/root/data.json", "{}"),
            ("/root/img@2x.png", ""),
            ("/root/pkg/package.json", "{}"),
            ("/root/pkg/lib/main.js", ""),
        ]));
        ModuleCache::new(
            fs,
            ["png".to_string()].into_iter().collect(),
            FxHashSet::default(),
        )
    }

    #[test]
    fn test_classification_by_extension() {
        let cache = cache();
        assert_eq!(
            *cache.get(Path::new("/root/index.js")).kind(),
            ModuleKind::Script
        );
        assert_eq!(
            *cache.get(Path::new("/root/data.json")).kind(),
            ModuleKind::Json
        );
        assert_eq!(
            *cache.get(Path::new("/root/img@2x.png")).kind(),
            ModuleKind::Asset { scale: 2.0 }
        );
    }

    #[test]
    fn test_owning_package_walks_ancestors() {
        let cache = cache();
        let inner = cache.get(Path::new("/root/pkg/lib/main.js"));
        assert_eq!(
            inner.package(),
            Some(Path::new("/root/pkg/package.json"))
        );
        let outer = cache.get(Path::new("/root/index.js"));
        assert_eq!(outer.package(), None);
    }

    #[test]
    fn test_remove_forces_reclassification() {
        let cache = cache();
        let first = cache.get(Path::new("/root/index.js"));
        let again = cache.get(Path::new("/root/index.js"));
        assert!(Arc::ptr_eq(&first, &again));

        cache.remove(Path::new("/root/index.js"));
        let fresh = cache.get(Path::new("/root/index.js"));
        assert!(!Arc::ptr_eq(&first, &fresh));
    }

    #[test]
    fn test_polyfill_kind() {
        let cache = cache();
        let polyfill = cache.create_polyfill(Path::new("/polyfills/require.js"));
        assert!(polyfill.kind().is_polyfill());
    }
}
