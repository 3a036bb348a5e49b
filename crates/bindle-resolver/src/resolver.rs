//! The reference-to-file resolution algorithm.
//!
//! `ModuleResolver` holds the mechanics: registry resolution, the vendor
//! directory walk, and the file-or-directory loading chain. Per-request
//! policy (which mechanic runs first, memoization) lives in
//! [`ResolutionRequest`](crate::ResolutionRequest).

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bindle_fs::FileSystem;
use path_clean::PathClean;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::assets::resolve_asset;
use crate::candidates::{
    DirCandidates, FileAndDirCandidates, FileCandidateResolver, FileCandidates,
};
use crate::module::{Module, ModuleCache};
use crate::package::{DESCRIPTOR_FILENAME, PackageCache, PackageDescriptor, Redirect};
use crate::registry::{AmbiguousNameError, NameRegistry};
use crate::{ResolveError, Result, is_relative_reference};

/// Static configuration of a resolver instance.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Source extensions tried in order (`js` before `json` means `foo.js`
    /// shadows `foo.json`).
    pub source_exts: Vec<String>,
    /// Extensions resolved as scaled assets rather than source files.
    pub asset_exts: FxHashSet<String>,
    /// Platforms recognized in file-name qualifiers.
    pub platforms: FxHashSet<String>,
    /// Whether to try `.native.<ext>` variants between the platform-qualified
    /// and bare names.
    pub prefer_native_platform: bool,
    /// Name of the vendor directory searched in every ancestor (for JS
    /// projects, `node_modules`).
    pub vendor_dir_name: String,
    /// Containment boundary for path references. Empty means unconstrained.
    pub roots: Vec<PathBuf>,
    /// Out-of-tree override: top-level reference segment to the directory
    /// that provides it.
    pub extra_vendor_modules: FxHashMap<String, PathBuf>,
    /// The well-known module every excluded reference resolves to.
    pub empty_module_path: PathBuf,
}

impl ResolverConfig {
    pub fn new(roots: Vec<PathBuf>, empty_module_path: PathBuf) -> Self {
        Self {
            source_exts: vec!["js".to_string(), "json".to_string()],
            asset_exts: ["png", "jpg", "jpeg", "gif", "webp", "svg"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            platforms: FxHashSet::default(),
            prefer_native_platform: false,
            vendor_dir_name: "node_modules".to_string(),
            roots,
            extra_vendor_modules: FxHashMap::default(),
            empty_module_path,
        }
    }
}

/// Resolves reference strings to modules. See the crate docs for the
/// algorithm; this type owns the module and descriptor caches it resolves
/// through.
#[derive(Debug)]
pub struct ModuleResolver {
    fs: Arc<dyn FileSystem>,
    config: ResolverConfig,
    registry: Arc<dyn NameRegistry>,
    modules: ModuleCache,
    packages: PackageCache,
}

impl ModuleResolver {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        config: ResolverConfig,
        registry: Arc<dyn NameRegistry>,
    ) -> Self {
        let modules = ModuleCache::new(
            Arc::clone(&fs),
            config.asset_exts.clone(),
            config.platforms.clone(),
        );
        let packages = PackageCache::new(Arc::clone(&fs));
        Self {
            fs,
            config,
            registry,
            modules,
            packages,
        }
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn modules(&self) -> &ModuleCache {
        &self.modules
    }

    pub fn packages(&self) -> &PackageCache {
        &self.packages
    }

    /// The module object for a path, classified by extension.
    pub fn module_for_path(&self, path: &Path) -> Arc<Module> {
        self.modules.get(path)
    }

    /// Whether `path` lives inside a vendor tree. Such modules skip the name
    /// registry so identically-named modules vendored by independent packages
    /// cannot collide.
    pub fn is_vendor_path(&self, path: &Path) -> bool {
        path.components()
            .any(|c| c.as_os_str() == self.config.vendor_dir_name.as_str())
    }

    /// The universal empty module that excluded references resolve to.
    pub fn empty_module(&self) -> Arc<Module> {
        self.modules.get(&self.config.empty_module_path)
    }

    /// Resolve through the global-name registry: an exact module-name match,
    /// or an owning-package match with the remainder resolved inside that
    /// package.
    pub fn resolve_registry_dependency(
        &self,
        from: &Module,
        to_name: &str,
        platform: Option<&str>,
    ) -> Result<Arc<Module>> {
        let name = normalize_specifier(to_name);
        let real = match self.redirect_through_package(from, &name) {
            Redirect::Empty => return Ok(self.empty_module()),
            Redirect::To(real) => real,
        };

        if let Some(path) = self
            .registry
            .module_path(&real, platform)
            .map_err(|source| self.ambiguous(from, to_name, source))?
        {
            return Ok(self.modules.get(&path));
        }

        // `pkg/lib/thing` may be addressed by the registered package `pkg`;
        // walk the name from most to least specific.
        let mut package_name = Path::new(real.as_str());
        loop {
            let candidate = package_name.to_string_lossy();
            if candidate.is_empty() || candidate == "." {
                break;
            }
            if let Some(descriptor_path) = self
                .registry
                .package_path(&candidate, platform)
                .map_err(|source| self.ambiguous(from, to_name, source))?
            {
                let Some(package) = self.packages.get(&descriptor_path) else {
                    return Err(ResolveError::unresolved(
                        from.path(),
                        to_name,
                        format!(
                            "package descriptor `{}` could not be read",
                            descriptor_path.display()
                        ),
                    ));
                };
                let rest = Path::new(real.as_str())
                    .strip_prefix(package_name)
                    .unwrap_or(Path::new(""));
                let potential = package.root().join(rest).clean();
                return self.load_or_error(&potential, from, to_name, platform);
            }
            match package_name.parent() {
                Some(parent) => package_name = parent,
                None => break,
            }
        }

        Err(ResolveError::unresolved(
            from.path(),
            to_name,
            "unknown name in the global registry",
        ))
    }

    /// Resolve a path reference directly, or a bare reference through the
    /// vendor-directory walk and the external override table.
    pub fn resolve_vendor_dependency(
        &self,
        from: &Module,
        to_name: &str,
        platform: Option<&str>,
    ) -> Result<Arc<Module>> {
        if is_relative_reference(to_name) || Path::new(to_name).is_absolute() {
            return self.resolve_file_or_dir(from, to_name, platform);
        }

        let real = match self.redirect_through_package(from, to_name) {
            Redirect::Empty => return Ok(self.empty_module()),
            Redirect::To(real) => real,
        };

        // A redirect may turn a bare specifier into a path; anchor it at the
        // vendored package the requesting module belongs to.
        if is_relative_reference(&real) || Path::new(&real).is_absolute() {
            let anchored = self
                .vendor_package_root(from.path())
                .unwrap_or_else(|| from_dir(from).to_path_buf())
                .join(&real);
            return self.resolve_file_or_dir(
                from,
                anchored.clean().to_string_lossy().as_ref(),
                platform,
            );
        }

        let mut search_queue = Vec::new();
        for ancestor in from_dir(from).ancestors() {
            if ancestor.parent().is_none() {
                break;
            }
            search_queue.push(
                ancestor
                    .join(&self.config.vendor_dir_name)
                    .join(&real)
                    .clean(),
            );
        }

        if !self.config.extra_vendor_modules.is_empty() {
            let mut segments = real.split('/');
            if let Some(first) = segments.next() {
                if let Some(base) = self.config.extra_vendor_modules.get(first) {
                    let mut candidate = base.clone();
                    for segment in segments {
                        candidate.push(segment);
                    }
                    search_queue.push(candidate.clean());
                }
            }
        }

        for candidate in &search_queue {
            if let Ok(module) = self.load_as_file_or_dir(candidate, platform) {
                return Ok(module);
            }
        }

        let searched: Vec<String> = search_queue
            .iter()
            .filter(|candidate| self.fs.is_directory(candidate))
            .map(|candidate| candidate.display().to_string())
            .collect();
        Err(ResolveError::unresolved_with_candidates(
            from.path(),
            to_name,
            "not found in any vendor directory",
            searched,
        ))
    }

    /// Path-reference resolution (`./x`, `../x`, `/abs/x`), constrained to
    /// the configured roots.
    fn resolve_file_or_dir(
        &self,
        from: &Module,
        to_name: &str,
        platform: Option<&str>,
    ) -> Result<Arc<Module>> {
        let potential = if Path::new(to_name).is_absolute() {
            PathBuf::from(to_name).clean()
        } else {
            from_dir(from).join(to_name).clean()
        };

        let real = match self
            .redirect_through_package(from, potential.to_string_lossy().as_ref())
        {
            Redirect::Empty => return Ok(self.empty_module()),
            Redirect::To(real) => PathBuf::from(real).clean(),
        };

        if !self.within_roots(&real) && real != self.config.empty_module_path {
            return Err(ResolveError::unresolved(
                from.path(),
                to_name,
                format!("`{}` is outside of the project roots", real.display()),
            ));
        }

        self.load_or_error(&real, from, to_name, platform)
    }

    fn load_or_error(
        &self,
        potential: &Path,
        from: &Module,
        to_name: &str,
        platform: Option<&str>,
    ) -> Result<Arc<Module>> {
        match self.load_as_file_or_dir(potential, platform) {
            Ok(module) => Ok(module),
            Err(candidates) => {
                let reason = match &candidates.dir {
                    DirCandidates::Package { .. } => format!(
                        "`{}` contains a package, but its entry file could not be resolved",
                        potential.display()
                    ),
                    DirCandidates::Index { .. } => format!(
                        "`{}` could not be resolved as a file or a directory",
                        potential.display()
                    ),
                };
                Err(ResolveError::unresolved_with_candidates(
                    from.path(),
                    to_name,
                    reason,
                    candidates.into_attempted(),
                ))
            }
        }
    }

    /// A base path can name a file (with decorations) or a directory (with a
    /// package descriptor or an index file). Files win.
    fn load_as_file_or_dir(
        &self,
        potential: &Path,
        platform: Option<&str>,
    ) -> std::result::Result<Arc<Module>, FileAndDirCandidates> {
        let dir = potential.parent().unwrap_or(Path::new("/"));
        let hint = potential
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");

        let file = match self.load_as_file(dir, hint, platform) {
            Ok(module) => return Ok(module),
            Err(candidates) => candidates,
        };
        match self.load_as_dir(potential, platform) {
            Ok(module) => Ok(module),
            Err(dir_candidates) => Err(FileAndDirCandidates {
                file,
                dir: dir_candidates,
            }),
        }
    }

    fn load_as_file(
        &self,
        dir: &Path,
        hint: &str,
        platform: Option<&str>,
    ) -> std::result::Result<Arc<Module>, FileCandidates> {
        if self.modules.is_asset_file(hint) {
            return match resolve_asset(
                self.fs.as_ref(),
                dir,
                hint,
                platform,
                &self.config.platforms,
            ) {
                Some(resolution) => Ok(self.modules.get_asset(&dir.join(resolution.file_name))),
                None => Err(FileCandidates::Asset {
                    name: hint.to_string(),
                }),
            };
        }

        let mut resolver = FileCandidateResolver::new(self.fs.as_ref(), dir);
        if let Some(name) = self.try_all_file_names(&mut resolver, hint, platform) {
            return Ok(self.modules.get(&dir.join(name)));
        }
        Err(FileCandidates::Sources {
            file_names: resolver.into_tried(),
        })
    }

    /// Try the bare prefix, then per extension the platform-qualified,
    /// native-preferred and bare variants, in that order.
    fn try_all_file_names(
        &self,
        resolver: &mut FileCandidateResolver<'_>,
        prefix: &str,
        platform: Option<&str>,
    ) -> Option<String> {
        if !prefix.is_empty() && resolver.try_file(prefix) {
            return Some(prefix.to_string());
        }
        for ext in &self.config.source_exts {
            if let Some(platform) = platform {
                let name = format!("{prefix}.{platform}.{ext}");
                if resolver.try_file(&name) {
                    return Some(name);
                }
            }
            if self.config.prefer_native_platform {
                let name = format!("{prefix}.native.{ext}");
                if resolver.try_file(&name) {
                    return Some(name);
                }
            }
            let name = format!("{prefix}.{ext}");
            if resolver.try_file(&name) {
                return Some(name);
            }
        }
        None
    }

    fn load_as_dir(
        &self,
        dir_path: &Path,
        platform: Option<&str>,
    ) -> std::result::Result<Arc<Module>, DirCandidates> {
        let descriptor = dir_path.join(DESCRIPTOR_FILENAME);
        if self.fs.exists(&descriptor) {
            if let Some(package) = self.packages.get(&descriptor) {
                return self.load_as_package(&package, platform);
            }
            // Malformed descriptor: this directory is not a package.
            debug!(
                "descriptor `{}` is unreadable; falling through to index lookup",
                descriptor.display()
            );
        }
        self.load_as_file(dir_path, "index", platform)
            .map_err(|file| DirCandidates::Index { file })
    }

    fn load_as_package(
        &self,
        package: &PackageDescriptor,
        platform: Option<&str>,
    ) -> std::result::Result<Arc<Module>, DirCandidates> {
        let entry = match package.entry() {
            Redirect::Empty => return Ok(self.empty_module()),
            Redirect::To(entry) => PathBuf::from(entry).clean(),
        };

        let dir = entry.parent().unwrap_or(Path::new("/"));
        let hint = entry
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");
        let file = match self.load_as_file(dir, hint, platform) {
            Ok(module) => return Ok(module),
            Err(candidates) => candidates,
        };
        match self.load_as_dir(&entry, platform) {
            Ok(module) => Ok(module),
            Err(dir_candidates) => Err(DirCandidates::Package {
                dir: Box::new(dir_candidates),
                file,
            }),
        }
    }

    /// Apply the requesting module's package redirect table, if it has one.
    fn redirect_through_package(&self, from: &Module, name: &str) -> Redirect {
        let Some(descriptor) = from.package() else {
            return Redirect::To(name.to_string());
        };
        match self.packages.get(descriptor) {
            Some(package) => package.redirect(name),
            None => Redirect::To(name.to_string()),
        }
    }

    fn within_roots(&self, path: &Path) -> bool {
        self.config.roots.is_empty()
            || self.config.roots.iter().any(|root| path.starts_with(root))
    }

    /// Root directory of the vendored package containing `path`, e.g.
    /// `/app/node_modules/dep` for `/app/node_modules/dep/lib/a.js`. Scoped
    /// package names (`@scope/dep`) span two path segments.
    fn vendor_package_root(&self, path: &Path) -> Option<PathBuf> {
        let components: Vec<Component<'_>> = path.components().collect();
        let vendor_idx = components
            .iter()
            .rposition(|c| c.as_os_str() == self.config.vendor_dir_name.as_str())?;

        let mut end = vendor_idx + 2;
        let scoped = components
            .get(vendor_idx + 1)
            .and_then(|c| c.as_os_str().to_str())
            .is_some_and(|segment| segment.starts_with('@'));
        if scoped {
            end += 1;
        }
        if end > components.len() {
            return None;
        }
        Some(components[..end].iter().copied().collect())
    }

    fn ambiguous(&self, from: &Module, reference: &str, source: AmbiguousNameError) -> ResolveError {
        ResolveError::Ambiguous {
            from: from.path().to_path_buf(),
            reference: reference.to_string(),
            source,
        }
    }
}

fn from_dir(from: &Module) -> &Path {
    from.path().parent().unwrap_or(Path::new("/"))
}

/// Collapse dot segments and strip any trailing separator from a specifier.
fn normalize_specifier(name: &str) -> String {
    Path::new(name).clean().to_string_lossy().into_owned()
}
