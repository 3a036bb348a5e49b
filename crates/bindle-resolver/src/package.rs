//! Package descriptors: entry files and redirect/exclude tables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bindle_fs::FileSystem;
use dashmap::DashMap;
use path_clean::PathClean;
use serde::Deserialize;
use tracing::debug;

/// File name of a package descriptor.
pub(crate) const DESCRIPTOR_FILENAME: &str = "package.json";

/// Extensions a redirect-table lookup will add or strip when matching.
const REDIRECT_EXTENSIONS: [&str; 2] = [".js", ".json"];

/// Outcome of applying a redirect table to a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Resolve this (possibly rewritten) specifier or absolute path.
    To(String),
    /// The specifier is excluded; resolve to the universal empty module.
    Empty,
}

#[derive(Debug, Clone)]
enum Replacement {
    To(String),
    Exclude,
}

/// Raw serde view of a descriptor file. Only the fields resolution cares
/// about; everything else in the file is ignored.
#[derive(Debug, Default, Deserialize)]
struct RawDescriptor {
    name: Option<String>,
    main: Option<String>,
    browser: Option<serde_json::Value>,
}

/// Parsed, immutable view of one package descriptor.
///
/// The `browser` field follows the browser-field spec: a string is an
/// alternate entry point, a table remaps specifiers, and a `false` value in
/// the table excludes the specifier entirely.
#[derive(Debug)]
pub struct PackageDescriptor {
    path: PathBuf,
    root: PathBuf,
    name: Option<String>,
    main: Option<String>,
    entry_override: Option<String>,
    replacements: HashMap<String, Replacement>,
}

impl PackageDescriptor {
    fn parse(path: &Path, content: &str) -> Option<Self> {
        let raw: RawDescriptor = match serde_json::from_str(content) {
            Ok(raw) => raw,
            Err(error) => {
                debug!("ignoring malformed package descriptor {}: {error}", path.display());
                return None;
            }
        };

        let mut entry_override = None;
        let mut replacements = HashMap::new();
        match raw.browser {
            Some(serde_json::Value::String(entry)) => entry_override = Some(entry),
            Some(serde_json::Value::Object(table)) => {
                for (key, value) in table {
                    match value {
                        serde_json::Value::String(to) => {
                            replacements.insert(key, Replacement::To(to));
                        }
                        serde_json::Value::Bool(false) => {
                            replacements.insert(key, Replacement::Exclude);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        let root = path.parent()?.to_path_buf();
        Some(Self {
            path: path.to_path_buf(),
            root,
            name: raw.name,
            main: raw.main,
            entry_override,
            replacements,
        })
    }

    /// Path of the descriptor file itself.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the descriptor governs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Declared package name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The declared entry file as an absolute path, with the redirect table
    /// already applied to it.
    ///
    /// The raw entry is the string `browser` field, else `main`, else
    /// `index`; the redirect lookup tries the entry with and without a `./`
    /// prefix and with the first-class extensions added or stripped.
    pub fn entry(&self) -> Redirect {
        let mut main = self
            .entry_override
            .as_deref()
            .or(self.main.as_deref())
            .unwrap_or("index")
            .to_string();

        if !self.replacements.is_empty() {
            let variants = if let Some(stripped) = main.strip_prefix("./") {
                [main.clone(), stripped.to_string()]
            } else {
                [main.clone(), format!("./{main}")]
            };
            'variants: for variant in &variants {
                for key in redirect_keys(variant) {
                    match self.replacements.get(&key) {
                        Some(Replacement::To(to)) => {
                            main = to.clone();
                            break 'variants;
                        }
                        Some(Replacement::Exclude) => return Redirect::Empty,
                        None => {}
                    }
                }
            }
        }

        Redirect::To(self.root.join(main).clean().to_string_lossy().into_owned())
    }

    /// Apply the redirect table to a specifier or absolute path.
    ///
    /// Bare specifiers match the table verbatim only. Absolute paths inside
    /// the package are matched by their `./`-relative form, with the
    /// first-class extensions tried as fallbacks; a hit maps back to an
    /// absolute path under the package root.
    pub fn redirect(&self, name: &str) -> Redirect {
        if self.replacements.is_empty() {
            return Redirect::To(name.to_string());
        }

        if !Path::new(name).is_absolute() {
            return match self.replacements.get(name) {
                Some(Replacement::Exclude) => Redirect::Empty,
                Some(Replacement::To(to)) => Redirect::To(to.clone()),
                None => Redirect::To(name.to_string()),
            };
        }

        let Ok(relative) = Path::new(name).strip_prefix(&self.root) else {
            return Redirect::To(name.to_string());
        };
        let relative = format!("./{}", relative.display());

        for key in redirect_keys(&relative) {
            match self.replacements.get(&key) {
                Some(Replacement::Exclude) => return Redirect::Empty,
                Some(Replacement::To(to)) => {
                    return Redirect::To(
                        self.root.join(to).clean().to_string_lossy().into_owned(),
                    );
                }
                None => {}
            }
        }
        Redirect::To(name.to_string())
    }
}

/// The lookup keys a redirect match tries for one specifier, in order:
/// verbatim, with each first-class extension appended, and with a first-class
/// extension stripped.
fn redirect_keys(specifier: &str) -> Vec<String> {
    let mut keys = vec![specifier.to_string()];
    for ext in REDIRECT_EXTENSIONS {
        keys.push(format!("{specifier}{ext}"));
    }
    for ext in REDIRECT_EXTENSIONS {
        if let Some(stripped) = specifier.strip_suffix(ext) {
            keys.push(stripped.to_string());
            break;
        }
    }
    keys
}

/// Cache of parsed descriptors keyed by descriptor path.
///
/// Malformed descriptors cache as `None`: the directory is treated as not
/// being a package and resolution falls through to index lookup. The cache is
/// cleared wholesale on any watched filesystem change.
#[derive(Debug)]
pub struct PackageCache {
    fs: Arc<dyn FileSystem>,
    packages: DashMap<PathBuf, Option<Arc<PackageDescriptor>>>,
}

impl PackageCache {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            packages: DashMap::new(),
        }
    }

    /// Load (or recall) the descriptor at `path`. `None` means the file is
    /// missing or malformed.
    pub fn get(&self, path: &Path) -> Option<Arc<PackageDescriptor>> {
        if let Some(cached) = self.packages.get(path) {
            return cached.clone();
        }
        let parsed = self
            .fs
            .read_to_string(path)
            .ok()
            .and_then(|content| PackageDescriptor::parse(path, &content))
            .map(Arc::new);
        self.packages.insert(path.to_path_buf(), parsed.clone());
        parsed
    }

    /// Drop every cached descriptor.
    pub fn clear(&self) {
        self.packages.clear();
    }
}
