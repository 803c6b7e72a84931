// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::FunctionSlug;

/// The subset of `config.toml` that edge functions care about.
///
/// ```toml
/// [edge_runtime]
/// enabled = true
///
/// [functions.hello]
/// verify_jwt = false
/// import_map = "./functions/hello/deno.json"
/// ```
///
/// Other tables (`[api]`, `[db]`, ...) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub edge_runtime: EdgeRuntimeSection,

    /// `[functions.<slug>]` tables, keyed by the unvalidated slug.
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionSection>,
}

/// `[edge_runtime]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeRuntimeSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for EdgeRuntimeSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// `[functions.<slug>]` section. Relative paths are relative to the
/// directory containing `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub verify_jwt: bool,

    #[serde(default)]
    pub entrypoint: Option<PathBuf>,

    #[serde(default)]
    pub import_map: Option<PathBuf>,

    #[serde(default)]
    pub static_files: Vec<String>,
}

impl Default for FunctionSection {
    fn default() -> Self {
        Self {
            enabled: true,
            verify_jwt: true,
            entrypoint: None,
            import_map: None,
            static_files: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Validated configuration. Construct via `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub edge_runtime: EdgeRuntimeSection,
    pub functions: BTreeMap<FunctionSlug, FunctionSection>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        edge_runtime: EdgeRuntimeSection,
        functions: BTreeMap<FunctionSlug, FunctionSection>,
    ) -> Self {
        Self {
            edge_runtime,
            functions,
        }
    }
}
