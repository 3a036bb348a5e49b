//! The global-name registry collaborator.
//!
//! A registry maps a logical module or package name to a file path,
//! independent of where that file lives. The host builds the registry
//! (typically from a project-wide crawl); resolution only queries it.

use std::fmt;
use std::path::PathBuf;

use rustc_hash::FxHashMap;

/// Two or more files claim the same logical name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("name `{name}` is claimed by both `{}` and `{}`", first.display(), second.display())]
pub struct AmbiguousNameError {
    pub name: String,
    pub first: PathBuf,
    pub second: PathBuf,
}

/// Result of a registry lookup: a path, nothing, or an ambiguity.
pub type RegistryLookup = Result<Option<PathBuf>, AmbiguousNameError>;

/// Project-wide table of logical names.
///
/// `module_path` answers for individual modules; `package_path` answers for
/// whole packages and returns the path of the package's *descriptor file*.
/// Implementations may use the platform to pick between per-platform
/// registrations.
pub trait NameRegistry: Send + Sync + fmt::Debug {
    fn module_path(&self, name: &str, platform: Option<&str>) -> RegistryLookup;

    fn package_path(&self, name: &str, platform: Option<&str>) -> RegistryLookup;
}

/// A registry with no entries. Every lookup misses.
#[derive(Debug, Default)]
pub struct EmptyRegistry;

impl NameRegistry for EmptyRegistry {
    fn module_path(&self, _name: &str, _platform: Option<&str>) -> RegistryLookup {
        Ok(None)
    }

    fn package_path(&self, _name: &str, _platform: Option<&str>) -> RegistryLookup {
        Ok(None)
    }
}

/// Map-backed registry for tests and hosts with a precomputed name table.
///
/// Registering the same name twice records both claimants; lookups then fail
/// with [`AmbiguousNameError`] instead of silently picking one.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    modules: FxHashMap<String, Vec<PathBuf>>,
    packages: FxHashMap<String, Vec<PathBuf>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.modules.entry(name.into()).or_default().push(path.into());
    }

    pub fn register_package(&mut self, name: impl Into<String>, descriptor: impl Into<PathBuf>) {
        self.packages
            .entry(name.into())
            .or_default()
            .push(descriptor.into());
    }
}

fn lookup(table: &FxHashMap<String, Vec<PathBuf>>, name: &str) -> RegistryLookup {
    match table.get(name).map(Vec::as_slice) {
        None | Some([]) => Ok(None),
        Some([path]) => Ok(Some(path.clone())),
        Some([first, second, ..]) => Err(AmbiguousNameError {
            name: name.to_string(),
            first: first.clone(),
            second: second.clone(),
        }),
    }
}

impl NameRegistry for StaticRegistry {
    fn module_path(&self, name: &str, _platform: Option<&str>) -> RegistryLookup {
        lookup(&self.modules, name)
    }

    fn package_path(&self, name: &str, _platform: Option<&str>) -> RegistryLookup {
        lookup(&self.packages, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_static_registry_lookup() {
        let mut registry = StaticRegistry::new();
        registry.register_module("Box", "/root/lib/Box.js");
        registry.register_package("widgets", "/root/widgets/package.json");

        assert_eq!(
            registry.module_path("Box", None).unwrap(),
            Some(PathBuf::from("/root/lib/Box.js"))
        );
        assert_eq!(registry.module_path("Unknown", None).unwrap(), None);
        assert_eq!(
            registry.package_path("widgets", None).unwrap(),
            Some(PathBuf::from("/root/widgets/package.json"))
        );
    }

    #[test]
    fn test_duplicate_names_are_ambiguous() {
        let mut registry = StaticRegistry::new();
        registry.register_module("Box", "/a/Box.js");
        registry.register_module("Box", "/b/Box.js");

        let err = registry.module_path("Box", None).unwrap_err();
        assert_eq!(err.name, "Box");
        assert_eq!(err.first, Path::new("/a/Box.js"));
        assert_eq!(err.second, Path::new("/b/Box.js"));
    }
}
