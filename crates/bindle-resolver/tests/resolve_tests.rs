//! End-to-end resolution tests against an in-memory project tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bindle_fs::MemoryFileSystem;
use bindle_resolver::{
    EmptyRegistry, Module, ModuleKind, ModuleResolver, NameRegistry, ResolutionCache,
    ResolutionRequest, ResolveError, ResolverConfig, StaticRegistry,
};

const EMPTY_MODULE: &str = "/bindle/empty-module.js";

struct Fixture {
    resolver: ModuleResolver,
    cache: ResolutionCache,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Self {
        Self::with_registry(files, EmptyRegistry)
    }

    fn with_registry(files: &[(&str, &str)], registry: impl NameRegistry + 'static) -> Self {
        Self::build(files, registry, |_| {})
    }

    fn build(
        files: &[(&str, &str)],
        registry: impl NameRegistry + 'static,
        configure: impl FnOnce(&mut ResolverConfig),
    ) -> Self {
        let mut entries: Vec<(&str, &str)> = files.to_vec();
        entries.push((EMPTY_MODULE, ""));
        let fs = Arc::new(MemoryFileSystem::with_files(entries));

        let mut config =
            ResolverConfig::new(vec![PathBuf::from("/root")], PathBuf::from(EMPTY_MODULE));
        config.platforms = ["ios".to_string(), "android".to_string()]
            .into_iter()
            .collect();
        configure(&mut config);

        let resolver = ModuleResolver::new(fs, config, Arc::new(registry));
        Self {
            resolver,
            cache: ResolutionCache::new(),
        }
    }

    fn module(&self, path: &str) -> Arc<Module> {
        self.resolver.module_for_path(Path::new(path))
    }

    fn resolve(
        &self,
        from: &str,
        reference: &str,
        platform: Option<&str>,
    ) -> Result<Arc<Module>, ResolveError> {
        let request = ResolutionRequest::new(&self.resolver, &self.cache, platform);
        request.resolve_dependency(&self.module(from), reference)
    }

    fn resolve_path(&self, from: &str, reference: &str, platform: Option<&str>) -> PathBuf {
        self.resolve(from, reference, platform)
            .unwrap()
            .path()
            .to_path_buf()
    }
}

#[test]
fn test_platform_variant_preferred_over_generic() {
    let fixture = Fixture::new(&[
        ("/root/index.js", ""),
        ("/root/a.ios.js", ""),
        ("/root/a.js", ""),
    ]);
    assert_eq!(
        fixture.resolve_path("/root/index.js", "./a", Some("ios")),
        PathBuf::from("/root/a.ios.js")
    );
    // No android variant exists, so the bare name wins.
    assert_eq!(
        fixture.resolve_path("/root/index.js", "./a", Some("android")),
        PathBuf::from("/root/a.js")
    );
}

#[test]
fn test_native_variant_between_platform_and_bare() {
    let fixture = Fixture::build(
        &[
            ("/root/index.js", ""),
            ("/root/a.native.js", ""),
            ("/root/a.js", ""),
        ],
        EmptyRegistry,
        |config| config.prefer_native_platform = true,
    );
    assert_eq!(
        fixture.resolve_path("/root/index.js", "./a", Some("ios")),
        PathBuf::from("/root/a.native.js")
    );
}

#[test]
fn test_exact_file_name_wins_over_decorations() {
    let fixture = Fixture::new(&[
        ("/root/index.js", ""),
        ("/root/a.js", ""),
        ("/root/a.js.js", ""),
    ]);
    assert_eq!(
        fixture.resolve_path("/root/index.js", "./a.js", None),
        PathBuf::from("/root/a.js")
    );
}

#[test]
fn test_package_entry_redirected_to_client_variant() {
    let mut registry = StaticRegistry::new();
    registry.register_package("pkg", "/root/pkg/package.json");
    let fixture = Fixture::with_registry(
        &[
            ("/root/index.js", ""),
            (
                "/root/pkg/package.json",
                r#"{"main": "main.js", "browser": {"./main.js": "./client.js"}}"#,
            ),
            ("/root/pkg/main.js", ""),
            ("/root/pkg/client.js", ""),
        ],
        registry,
    );
    assert_eq!(
        fixture.resolve_path("/root/index.js", "pkg", None),
        PathBuf::from("/root/pkg/client.js")
    );
}

#[test]
fn test_registry_package_subpath() {
    let mut registry = StaticRegistry::new();
    registry.register_package("pkg", "/root/pkg/package.json");
    let fixture = Fixture::with_registry(
        &[
            ("/root/index.js", ""),
            ("/root/pkg/package.json", r#"{"name": "pkg"}"#),
            ("/root/pkg/lib/util.js", ""),
        ],
        registry,
    );
    assert_eq!(
        fixture.resolve_path("/root/index.js", "pkg/lib/util", None),
        PathBuf::from("/root/pkg/lib/util.js")
    );
}

#[test]
fn test_registry_module_beats_vendor_directory() {
    let mut registry = StaticRegistry::new();
    registry.register_module("Box", "/root/lib/Box.js");
    let fixture = Fixture::with_registry(
        &[
            ("/root/index.js", ""),
            ("/root/lib/Box.js", ""),
            ("/root/node_modules/Box/index.js", ""),
        ],
        registry,
    );
    assert_eq!(
        fixture.resolve_path("/root/index.js", "Box", None),
        PathBuf::from("/root/lib/Box.js")
    );
}

#[test]
fn test_vendor_origin_skips_the_registry() {
    let mut registry = StaticRegistry::new();
    registry.register_module("Box", "/root/lib/Box.js");
    let fixture = Fixture::with_registry(
        &[
            ("/root/lib/Box.js", ""),
            ("/root/node_modules/dep/index.js", ""),
            ("/root/node_modules/Box/index.js", ""),
        ],
        registry,
    );
    // The same name from a vendored module must resolve through the vendor
    // walk, not the registry.
    assert_eq!(
        fixture.resolve_path("/root/node_modules/dep/index.js", "Box", None),
        PathBuf::from("/root/node_modules/Box/index.js")
    );
}

#[test]
fn test_vendor_walk_prefers_innermost_ancestor() {
    let fixture = Fixture::new(&[
        ("/root/src/deep.js", ""),
        ("/root/src/node_modules/dep/index.js", ""),
        ("/root/node_modules/dep/index.js", ""),
    ]);
    assert_eq!(
        fixture.resolve_path("/root/src/deep.js", "dep", None),
        PathBuf::from("/root/src/node_modules/dep/index.js")
    );
}

#[test]
fn test_vendor_package_with_descriptor_entry() {
    let fixture = Fixture::new(&[
        ("/root/index.js", ""),
        (
            "/root/node_modules/dep/package.json",
            r#"{"main": "lib/entry.js"}"#,
        ),
        ("/root/node_modules/dep/lib/entry.js", ""),
    ]);
    assert_eq!(
        fixture.resolve_path("/root/index.js", "dep", None),
        PathBuf::from("/root/node_modules/dep/lib/entry.js")
    );
}

#[test]
fn test_extra_vendor_override_by_top_level_segment() {
    let fixture = Fixture::build(
        &[
            ("/root/index.js", ""),
            ("/elsewhere/linked/lib/main.js", ""),
        ],
        EmptyRegistry,
        |config| {
            config
                .extra_vendor_modules
                .insert("linked".to_string(), PathBuf::from("/elsewhere/linked"));
        },
    );
    assert_eq!(
        fixture.resolve_path("/root/index.js", "linked/lib/main", None),
        PathBuf::from("/elsewhere/linked/lib/main.js")
    );
}

#[test]
fn test_excluded_reference_resolves_to_empty_module() {
    let fixture = Fixture::new(&[
        ("/root/app/package.json", r#"{"browser": {"fs": false}}"#),
        ("/root/app/main.js", ""),
    ]);
    let module = fixture.resolve("/root/app/main.js", "fs", None).unwrap();
    assert_eq!(module.path(), Path::new(EMPTY_MODULE));
}

#[test]
fn test_excluded_relative_reference_resolves_to_empty_module() {
    let fixture = Fixture::new(&[
        (
            "/root/app/package.json",
            r#"{"browser": {"./server.js": false}}"#,
        ),
        ("/root/app/main.js", ""),
        ("/root/app/server.js", ""),
    ]);
    let module = fixture
        .resolve("/root/app/main.js", "./server", None)
        .unwrap();
    assert_eq!(module.path(), Path::new(EMPTY_MODULE));
}

#[test]
fn test_directory_index_fallback() {
    let fixture = Fixture::new(&[("/root/index.js", ""), ("/root/dir/index.js", "")]);
    assert_eq!(
        fixture.resolve_path("/root/index.js", "./dir", None),
        PathBuf::from("/root/dir/index.js")
    );
}

#[test]
fn test_malformed_descriptor_falls_back_to_index() {
    let fixture = Fixture::new(&[
        ("/root/index.js", ""),
        ("/root/bad/package.json", "{not valid json"),
        ("/root/bad/index.js", ""),
    ]);
    assert_eq!(
        fixture.resolve_path("/root/index.js", "./bad", None),
        PathBuf::from("/root/bad/index.js")
    );
}

#[test]
fn test_asset_reference_carries_scale() {
    let fixture = Fixture::new(&[
        ("/root/index.js", ""),
        ("/root/assets/logo.png", ""),
        ("/root/assets/logo@2x.png", ""),
        ("/root/assets/logo@3x.ios.png", ""),
    ]);

    let generic = fixture
        .resolve("/root/index.js", "./assets/logo.png", None)
        .unwrap();
    assert_eq!(generic.path(), Path::new("/root/assets/logo.png"));
    assert_eq!(*generic.kind(), ModuleKind::Asset { scale: 1.0 });

    let ios = fixture
        .resolve("/root/index.js", "./assets/logo.png", Some("ios"))
        .unwrap();
    assert_eq!(ios.path(), Path::new("/root/assets/logo@3x.ios.png"));
    assert_eq!(*ios.kind(), ModuleKind::Asset { scale: 3.0 });
}

#[test]
fn test_reference_escaping_roots_is_rejected() {
    let fixture = Fixture::new(&[("/root/index.js", ""), ("/outside.js", "")]);
    let err = fixture
        .resolve("/root/index.js", "../outside", None)
        .unwrap_err();
    match err {
        ResolveError::UnableToResolve { reason, .. } => {
            assert!(reason.contains("outside of the project roots"), "{reason}");
        }
        other => panic!("expected UnableToResolve, got {other:?}"),
    }
}

#[test]
fn test_ambiguous_registry_name_is_not_swallowed() {
    let mut registry = StaticRegistry::new();
    registry.register_module("Box", "/a/Box.js");
    registry.register_module("Box", "/b/Box.js");
    let fixture = Fixture::with_registry(
        &[
            ("/root/index.js", ""),
            // A vendor fallback exists, but ambiguity must surface instead.
            ("/root/node_modules/Box/index.js", ""),
        ],
        registry,
    );
    let err = fixture.resolve("/root/index.js", "Box", None).unwrap_err();
    assert!(matches!(err, ResolveError::Ambiguous { .. }));
}

#[test]
fn test_failed_resolution_reports_candidates() {
    let fixture = Fixture::new(&[("/root/index.js", "")]);
    let err = fixture
        .resolve("/root/index.js", "./missing", None)
        .unwrap_err();
    match err {
        ResolveError::UnableToResolve {
            from,
            reference,
            candidates,
            ..
        } => {
            assert_eq!(from, PathBuf::from("/root/index.js"));
            assert_eq!(reference, "./missing");
            assert!(candidates.iter().any(|c| c == "missing.js"), "{candidates:?}");
            assert!(candidates.iter().any(|c| c == "index.js"), "{candidates:?}");
        }
        other => panic!("expected UnableToResolve, got {other:?}"),
    }
}

#[test]
fn test_resolution_cache_round_trip() {
    let fixture = Fixture::new(&[("/root/index.js", ""), ("/root/a.js", "")]);
    let first = fixture.resolve("/root/index.js", "./a", None).unwrap();
    let second = fixture.resolve("/root/index.js", "./a", None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fixture.cache.len(), 1);

    fixture.cache.clear();
    assert!(fixture.cache.is_empty());
    let third = fixture.resolve("/root/index.js", "./a", None).unwrap();
    assert_eq!(third.path(), first.path());
}

#[test]
fn test_json_module_classification() {
    let fixture = Fixture::new(&[("/root/index.js", ""), ("/root/config.json", "{}")]);
    let module = fixture
        .resolve("/root/index.js", "./config", None)
        .unwrap();
    assert_eq!(module.path(), Path::new("/root/config.json"));
    assert!(module.kind().is_json());
}
