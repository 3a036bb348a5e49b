//! File-candidate probing and the diagnostic record of what was tried.

use std::path::{Path, PathBuf};

use bindle_fs::FileSystem;
use rustc_hash::FxHashSet;

/// Probes concrete file names inside one directory, remembering every name
/// that was tried so failed resolutions can report them.
pub struct FileCandidateResolver<'a> {
    fs: &'a dyn FileSystem,
    dir: PathBuf,
    tried: Vec<String>,
}

impl<'a> FileCandidateResolver<'a> {
    pub fn new(fs: &'a dyn FileSystem, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
            tried: Vec::new(),
        }
    }

    /// Whether `name` exists in the directory. Every probe is recorded.
    pub fn try_file(&mut self, name: &str) -> bool {
        self.tried.push(name.to_string());
        self.fs.exists(&self.dir.join(name))
    }

    /// The names probed so far, in order.
    pub fn into_tried(self) -> Vec<String> {
        self.tried
    }
}

/// What was tried while resolving a base path as a file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileCandidates {
    /// Only an asset lookup was attempted.
    Asset { name: String },
    /// Source-file variants were attempted (`foo.ios.js`, `foo.js`, ...).
    Sources { file_names: Vec<String> },
}

/// What was tried while resolving a base path as a directory.
#[derive(Debug, Clone, PartialEq)]
pub enum DirCandidates {
    /// The directory contained a package descriptor whose entry could not be
    /// resolved.
    Package {
        dir: Box<DirCandidates>,
        file: FileCandidates,
    },
    /// The directory was probed for an index file.
    Index { file: FileCandidates },
}

/// Combined record for a base path tried both ways.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAndDirCandidates {
    pub file: FileCandidates,
    pub dir: DirCandidates,
}

impl FileCandidates {
    fn collect_into(&self, out: &mut Vec<String>) {
        match self {
            Self::Asset { name } => out.push(name.clone()),
            Self::Sources { file_names } => out.extend(file_names.iter().cloned()),
        }
    }
}

impl DirCandidates {
    fn collect_into(&self, out: &mut Vec<String>) {
        match self {
            Self::Package { dir, file } => {
                file.collect_into(out);
                dir.collect_into(out);
            }
            Self::Index { file } => file.collect_into(out),
        }
    }
}

impl FileAndDirCandidates {
    /// Flatten into the attempted-name list carried by resolution errors.
    pub fn into_attempted(self) -> Vec<String> {
        let mut out = Vec::new();
        self.file.collect_into(&mut out);
        self.dir.collect_into(&mut out);
        out
    }
}

/// Infer a platform from a platform-qualified file name.
///
/// `foo.ios.js` carries platform `ios` when `ios` is a configured platform;
/// anything else yields `None`.
pub fn platform_from_file_name(path: &Path, platforms: &FxHashSet<String>) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (stem, _ext) = name.rsplit_once('.')?;
    let (_, qualifier) = stem.rsplit_once('.')?;
    platforms.contains(qualifier).then(|| qualifier.to_string())
}
