// src/config/validate.rs

use std::collections::BTreeMap;

use globset::Glob;

use crate::config::model::{ConfigFile, FunctionSection, RawConfigFile};
use crate::errors::{EdgeWatchError, Result};
use crate::types::FunctionSlug;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = EdgeWatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let functions = validate_functions(raw.functions)?;
        Ok(ConfigFile::new_unchecked(raw.edge_runtime, functions))
    }
}

fn validate_functions(
    raw: BTreeMap<String, FunctionSection>,
) -> Result<BTreeMap<FunctionSlug, FunctionSection>> {
    let mut functions = BTreeMap::new();
    for (name, section) in raw {
        let slug: FunctionSlug = name
            .parse()
            .map_err(|e: String| EdgeWatchError::ConfigError(format!("[functions.{name}]: {e}")))?;
        validate_static_files(&slug, &section)?;
        functions.insert(slug, section);
    }
    Ok(functions)
}

fn validate_static_files(slug: &FunctionSlug, section: &FunctionSection) -> Result<()> {
    for pattern in &section.static_files {
        Glob::new(pattern).map_err(|e| {
            EdgeWatchError::ConfigError(format!(
                "[functions.{slug}].static_files: invalid pattern {pattern:?}: {e}"
            ))
        })?;
    }
    Ok(())
}
