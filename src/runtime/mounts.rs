// src/runtime/mounts.rs

//! Bind mounts for the edge runtime container.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use globset::{Glob, GlobSetBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{FunctionConfig, FunctionSlug, ProjectPaths};
use crate::watch::path_utils::{is_within, relative_str};
use crate::watch::planner::PlanOutcome;
use crate::watch::resolver::find_import_map;

/// Home directory of the runtime user inside the container.
pub const CONTAINER_HOME: &str = "/home/deno";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Bind {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

/// Per-function settings as seen from inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionMount {
    pub entrypoint_path: String,
    pub import_map_path: Option<String>,
    pub verify_jwt: bool,
    pub static_files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MountPlan {
    pub binds: Vec<Bind>,
    pub functions: BTreeMap<FunctionSlug, FunctionMount>,
}

impl MountPlan {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self).context("serializing mount plan")?)
    }
}

/// Where a host path appears inside the container.
///
/// Paths under the project root keep their project-relative location under
/// [`CONTAINER_HOME`]; anything else lands under `CONTAINER_HOME/external`.
pub fn container_path(paths: &ProjectPaths, host: &Path) -> String {
    match relative_str(&paths.root, host) {
        Some(rel) if rel.is_empty() => CONTAINER_HOME.to_string(),
        Some(rel) => format!("{CONTAINER_HOME}/{rel}"),
        None => {
            let abs = host.to_string_lossy().replace('\\', "/");
            format!("{CONTAINER_HOME}/external/{}", abs.trim_start_matches('/'))
        }
    }
}

/// Derive the mount plan from a planning pass.
pub fn plan_mounts(fs: &dyn FileSystem, paths: &ProjectPaths, outcome: &PlanOutcome) -> Result<MountPlan> {
    let functions_dir = paths.resolve(&paths.functions_dir);
    let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
    if fs.is_dir(&functions_dir) {
        dirs.insert(functions_dir.clone());
    }
    dirs.extend(
        outcome
            .dependencies
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .filter(|d| !is_within(d, &functions_dir)),
    );

    let mut binds: Vec<Bind> = Vec::new();
    let mut bound: Vec<PathBuf> = Vec::new();
    // BTreeSet order puts parents before their children.
    for dir in dirs {
        if bound.iter().any(|b| is_within(&dir, b)) {
            continue;
        }
        binds.push(Bind {
            container: container_path(paths, &dir),
            host: dir.clone(),
            read_only: true,
        });
        bound.push(dir);
    }

    let mut functions = BTreeMap::new();
    for function in outcome.functions.values().filter(|f| f.enabled) {
        let static_files = expand_static_files(fs, function)?;
        for file in &static_files {
            if bound.iter().any(|b| is_within(file, b)) {
                continue;
            }
            binds.push(Bind {
                container: container_path(paths, file),
                host: file.clone(),
                read_only: true,
            });
            bound.push(file.clone());
        }

        let import_map = function.import_map.clone().or_else(|| {
            function
                .entrypoint
                .parent()
                .and_then(|dir| find_import_map(fs, dir, &paths.root))
        });

        functions.insert(
            function.slug.clone(),
            FunctionMount {
                entrypoint_path: container_path(paths, &function.entrypoint),
                import_map_path: import_map.map(|p| container_path(paths, &p)),
                verify_jwt: function.verify_jwt,
                static_files: static_files.iter().map(|f| container_path(paths, f)).collect(),
            },
        );
    }

    binds.sort();
    debug!(binds = binds.len(), functions = functions.len(), "computed mount plan");
    Ok(MountPlan { binds, functions })
}

/// Files matching a function's `static_files` patterns.
pub fn expand_static_files(fs: &dyn FileSystem, function: &FunctionConfig) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();

    for pattern in &function.static_files {
        let glob = Glob::new(pattern).with_context(|| format!("invalid static_files pattern {pattern:?}"))?;
        let set = GlobSetBuilder::new()
            .add(glob)
            .build()
            .with_context(|| format!("building matcher for {pattern:?}"))?;

        let base = literal_prefix(Path::new(pattern));
        if fs.is_file(&base) {
            files.insert(base);
            continue;
        }

        let before = files.len();
        let mut stack = vec![base];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = fs.read_dir(&dir) else {
                continue;
            };
            for entry in entries {
                if fs.is_dir(&entry) {
                    stack.push(entry);
                } else if set.is_match(&entry) {
                    files.insert(entry);
                }
            }
        }
        if files.len() == before {
            warn!(slug = %function.slug, %pattern, "static_files pattern matched nothing");
        }
    }

    Ok(files.into_iter().collect())
}

/// Leading components of a glob pattern that contain no glob syntax.
fn literal_prefix(pattern: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in pattern.components() {
        if let Component::Normal(part) = component {
            let s = part.to_string_lossy();
            if s.contains(['*', '?', '[', '{']) {
                break;
            }
        }
        out.push(component.as_os_str());
    }
    out
}
