// src/types.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

/// Directory (relative to the project root) holding `config.toml` and `functions/`.
pub const SUPABASE_DIR: &str = "supabase";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const FUNCTIONS_DIR_NAME: &str = "functions";
/// Entrypoint file name used for discovered functions without a config entry.
pub const DEFAULT_ENTRYPOINT: &str = "index.ts";

const MAX_SLUG_LEN: usize = 49;

/// Short identifier of an edge function, e.g. `hello-world`.
///
/// Matches `[a-z][a-z0-9_-]{0,48}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FunctionSlug(String);

impl FunctionSlug {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        s.len() <= MAX_SLUG_LEN
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    }
}

impl FromStr for FunctionSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(FunctionSlug(s.to_string()))
        } else {
            Err(format!(
                "invalid function slug {s:?} (expected [a-z][a-z0-9_-]{{0,48}})"
            ))
        }
    }
}

impl fmt::Display for FunctionSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully resolved configuration of a single function.
///
/// All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfig {
    pub slug: FunctionSlug,
    pub enabled: bool,
    pub entrypoint: PathBuf,
    /// Explicit import map; `None` means the resolver searches for one.
    pub import_map: Option<PathBuf>,
    pub verify_jwt: bool,
    /// Glob patterns (absolute) of files served alongside the function.
    pub static_files: Vec<String>,
}

/// All functions of a project, keyed by slug.
pub type FunctionTable = BTreeMap<FunctionSlug, FunctionConfig>;

/// Well-known locations inside a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub functions_dir: PathBuf,
}

impl ProjectPaths {
    /// Conventional layout: `<root>/supabase/config.toml` and `<root>/supabase/functions`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let supabase = root.join(SUPABASE_DIR);
        Self {
            config_path: supabase.join(CONFIG_FILE_NAME),
            functions_dir: supabase.join(FUNCTIONS_DIR_NAME),
            root,
        }
    }

    /// Directory that relative paths in `config.toml` are resolved against.
    pub fn config_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or(&self.root)
    }

    /// Anchor `path` at the project root if it is relative.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// A single observed path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub is_file: bool,
}

impl WatchTarget {
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_file: false,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_file: true,
        }
    }
}

/// Set of targets keyed by path; inserting an existing path is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    targets: BTreeMap<PathBuf, WatchTarget>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the path was already present.
    pub fn insert(&mut self, target: WatchTarget) -> bool {
        if self.targets.contains_key(&target.path) {
            return false;
        }
        self.targets.insert(target.path.clone(), target);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.targets.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&WatchTarget> {
        self.targets.get(path)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn dir_count(&self) -> usize {
        self.targets.values().filter(|t| !t.is_file).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchTarget> {
        self.targets.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.targets.keys().map(PathBuf::as_path)
    }

    /// Find the target that covers `path`.
    ///
    /// File targets only cover themselves; directory targets cover the
    /// directory and everything below it. The closest covering target wins.
    pub fn target_for(&self, path: &Path) -> Option<&WatchTarget> {
        if let Some(t) = self.targets.get(path) {
            return Some(t);
        }
        path.ancestors()
            .skip(1)
            .filter_map(|a| self.targets.get(a))
            .find(|t| !t.is_file)
    }
}

impl FromIterator<WatchTarget> for WatchSet {
    fn from_iter<I: IntoIterator<Item = WatchTarget>>(iter: I) -> Self {
        let mut set = WatchSet::new();
        for t in iter {
            set.insert(t);
        }
        set
    }
}
