//! # bindle-resolver
//!
//! Turns a dependency-reference string plus a "from" module into a concrete
//! module file, honoring:
//!
//! - relative and absolute path references, constrained to the project roots;
//! - a project-wide name registry ([`NameRegistry`]) mapping logical module
//!   and package names to files, skipped for modules living inside vendor
//!   trees;
//! - the nested vendor-directory search (innermost ancestor outward), plus a
//!   configurable override table for out-of-tree packages;
//! - per-platform file variants (`foo.ios.js` / `foo.native.js` / `foo.js`);
//! - package descriptors with entry files and redirect/exclude tables;
//! - scaled asset variants (`img@2x.png`).
//!
//! The two entry points are [`ModuleResolver`] (the mechanics) and
//! [`ResolutionRequest`] (per-request policy plus the memoizing
//! [`ResolutionCache`]). Resolution is synchronous: every probe goes through
//! the [`bindle_fs::FileSystem`] oracle, which is backed by an in-memory
//! index in both production and tests.

mod assets;
mod candidates;
mod module;
mod package;
mod registry;
mod request;
mod resolver;

use std::path::PathBuf;

pub use assets::{AssetName, AssetResolution, parse_asset_name, resolve_asset};
pub use candidates::{
    DirCandidates, FileAndDirCandidates, FileCandidateResolver, FileCandidates,
    platform_from_file_name,
};
pub use module::{Module, ModuleCache, ModuleKind};
pub use package::{PackageCache, PackageDescriptor, Redirect};
pub use registry::{AmbiguousNameError, EmptyRegistry, NameRegistry, StaticRegistry};
pub use request::{ResolutionCache, ResolutionRequest};
pub use resolver::{ModuleResolver, ResolverConfig};

/// Errors produced while resolving a reference string.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No file, registry entry, or vendor-directory path satisfied the
    /// reference. `candidates` lists everything that was attempted, for
    /// diagnostics.
    #[error("unable to resolve `{reference}` from `{}`: {reason}", from.display())]
    UnableToResolve {
        from: PathBuf,
        reference: String,
        reason: String,
        candidates: Vec<String>,
    },

    /// The name registry reports more than one file claiming the name.
    #[error("ambiguous resolution of `{reference}` from `{}`: {source}", from.display())]
    Ambiguous {
        from: PathBuf,
        reference: String,
        #[source]
        source: AmbiguousNameError,
    },
}

impl ResolveError {
    pub(crate) fn unresolved(
        from: &std::path::Path,
        reference: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnableToResolve {
            from: from.to_path_buf(),
            reference: reference.to_string(),
            reason: reason.into(),
            candidates: Vec::new(),
        }
    }

    pub(crate) fn unresolved_with_candidates(
        from: &std::path::Path,
        reference: &str,
        reason: impl Into<String>,
        candidates: Vec<String>,
    ) -> Self {
        Self::UnableToResolve {
            from: from.to_path_buf(),
            reference: reference.to_string(),
            reason: reason.into(),
            candidates,
        }
    }

    /// Whether this is the "nothing matched" failure kind, the only one the
    /// registry-then-vendor fallback is allowed to swallow.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::UnableToResolve { .. })
    }
}

/// Result type alias for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Whether a reference is declared relative to the requesting module
/// (`./x`, `../x`, `.` or `..`).
pub fn is_relative_reference(reference: &str) -> bool {
    reference == "."
        || reference == ".."
        || reference.starts_with("./")
        || reference.starts_with("../")
}
