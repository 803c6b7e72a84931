// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, FunctionSection, RawConfigFile};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{DEFAULT_ENTRYPOINT, FunctionConfig, FunctionSlug, FunctionTable, ProjectPaths};
use crate::watch::path_utils::normalize;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** validate slugs
/// or patterns. Use [`load_and_validate`] for that.
pub fn load_from_path(fs: &dyn FileSystem, path: &Path) -> Result<RawConfigFile> {
    let contents = fs.read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(fs: &dyn FileSystem, path: &Path) -> Result<ConfigFile> {
    let raw_config = load_from_path(fs, path)?;
    ConfigFile::try_from(raw_config)
}

/// Read `config.toml` (if present) and build the resolved function table.
///
/// The table contains every configured function plus every directory under
/// the functions root that looks like a function (valid slug, has
/// `index.ts`). Configured entries take precedence over discovered ones.
pub fn load_function_table(fs: &dyn FileSystem, paths: &ProjectPaths) -> Result<FunctionTable> {
    let config = if fs.is_file(&paths.config_path) {
        load_and_validate(fs, &paths.config_path)?
    } else {
        debug!(path = ?paths.config_path, "no config file; using discovered functions only");
        ConfigFile::default()
    };
    Ok(function_table(fs, paths, &config))
}

pub fn function_table(fs: &dyn FileSystem, paths: &ProjectPaths, config: &ConfigFile) -> FunctionTable {
    let mut table = FunctionTable::new();

    for slug in discover_functions(fs, &paths.functions_dir) {
        let function = resolve_section(paths, &slug, &FunctionSection::default());
        table.insert(slug, function);
    }

    for (slug, section) in &config.functions {
        table.insert(slug.clone(), resolve_section(paths, slug, section));
    }

    table
}

/// Slugs of the function directories directly under `functions_dir`.
pub fn discover_functions(fs: &dyn FileSystem, functions_dir: &Path) -> Vec<FunctionSlug> {
    let entries = match fs.read_dir(functions_dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = ?functions_dir, error = %err, "functions directory not readable");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter(|p| fs.is_dir(p) && fs.is_file(&p.join(DEFAULT_ENTRYPOINT)))
        .filter_map(|p| p.file_name()?.to_str()?.parse().ok())
        .collect()
}

fn resolve_section(paths: &ProjectPaths, slug: &FunctionSlug, section: &FunctionSection) -> FunctionConfig {
    let config_dir = paths.config_dir();
    let anchor = |p: &Path| -> PathBuf {
        if p.is_absolute() {
            normalize(p)
        } else {
            normalize(&config_dir.join(p))
        }
    };

    let entrypoint = match &section.entrypoint {
        Some(p) => anchor(p),
        None => paths.functions_dir.join(slug.as_str()).join(DEFAULT_ENTRYPOINT),
    };

    FunctionConfig {
        slug: slug.clone(),
        enabled: section.enabled,
        entrypoint,
        import_map: section.import_map.as_deref().map(anchor),
        verify_jwt: section.verify_jwt,
        static_files: section
            .static_files
            .iter()
            .map(|pattern| anchor(Path::new(pattern)).to_string_lossy().into_owned())
            .collect(),
    }
}
