#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use edgewatch::config::{ConfigFile, EdgeRuntimeSection, FunctionSection, RawConfigFile};
use edgewatch::types::{DEFAULT_ENTRYPOINT, ProjectPaths};
use tempfile::TempDir;

/// A throwaway project on the real filesystem:
/// `<root>/supabase/functions` exists, everything else is up to the test.
pub struct TestProject {
    _dir: TempDir,
    root: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        // notify reports canonical paths (e.g. /private/var on macOS).
        let root = dir.path().canonicalize().expect("failed to canonicalize temp dir");
        let project = Self { _dir: dir, root };
        fs::create_dir_all(project.functions_dir()).expect("failed to create functions dir");
        project
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> ProjectPaths {
        ProjectPaths::new(&self.root)
    }

    pub fn functions_dir(&self) -> PathBuf {
        self.paths().functions_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.paths().config_path
    }

    /// Write `contents` to `rel` (relative to the root), creating parents.
    pub fn write(&self, rel: impl AsRef<Path>, contents: &str) -> PathBuf {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&path, contents).expect("failed to write file");
        path
    }

    /// Write `<functions>/<slug>/index.ts`.
    pub fn write_function(&self, slug: &str, contents: &str) -> PathBuf {
        let path = self.functions_dir().join(slug).join(DEFAULT_ENTRYPOINT);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create function dir");
        }
        fs::write(&path, contents).expect("failed to write entrypoint");
        path
    }

    pub fn write_config(&self, toml: &str) -> PathBuf {
        let path = self.config_path();
        fs::write(&path, toml).expect("failed to write config.toml");
        path
    }

    pub fn mkdir(&self, rel: impl AsRef<Path>) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(&path).expect("failed to create dir");
        path
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                edge_runtime: EdgeRuntimeSection::default(),
                functions: BTreeMap::new(),
            },
        }
    }

    pub fn with_function(mut self, slug: &str, section: FunctionSection) -> Self {
        self.config.functions.insert(slug.to_string(), section);
        self
    }

    pub fn edge_runtime_enabled(mut self, enabled: bool) -> Self {
        self.config.edge_runtime.enabled = enabled;
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a `[functions.<slug>]` section.
pub struct FunctionSectionBuilder {
    section: FunctionSection,
}

impl FunctionSectionBuilder {
    pub fn new() -> Self {
        Self {
            section: FunctionSection::default(),
        }
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.section.enabled = val;
        self
    }

    pub fn verify_jwt(mut self, val: bool) -> Self {
        self.section.verify_jwt = val;
        self
    }

    pub fn entrypoint(mut self, path: &str) -> Self {
        self.section.entrypoint = Some(PathBuf::from(path));
        self
    }

    pub fn import_map(mut self, path: &str) -> Self {
        self.section.import_map = Some(PathBuf::from(path));
        self
    }

    pub fn static_file(mut self, pattern: &str) -> Self {
        self.section.static_files.push(pattern.to_string());
        self
    }

    pub fn build(self) -> FunctionSection {
        self.section
    }
}

impl Default for FunctionSectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
