// src/watch/planner.rs

//! Computes the set of paths that must be observed for hot reload.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::load_function_table;
use crate::errors::{EdgeWatchError, Result};
use crate::fs::FileSystem;
use crate::types::{FunctionTable, ProjectPaths, WatchSet, WatchTarget};
use crate::watch::filter::is_ignored_dir;
use crate::watch::path_utils::{basename, is_within};
use crate::watch::resolver::ImportResolver;

/// Environment variable overriding [`DEFAULT_WATCH_LIMIT`].
pub const WATCH_LIMIT_ENV: &str = "FUNCTIONS_WATCH_LIMIT";
pub const DEFAULT_WATCH_LIMIT: usize = 1000;

/// Read the directory limit from the environment, falling back to the default.
pub fn watch_limit_from_env() -> usize {
    parse_watch_limit(std::env::var(WATCH_LIMIT_ENV).ok().as_deref())
}

pub fn parse_watch_limit(value: Option<&str>) -> usize {
    match value.map(str::trim) {
        None | Some("") => DEFAULT_WATCH_LIMIT,
        Some(s) => match s.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                warn!(value = %s, "invalid {WATCH_LIMIT_ENV}; using {DEFAULT_WATCH_LIMIT}");
                DEFAULT_WATCH_LIMIT
            }
        },
    }
}

/// Everything a single planning pass produced.
#[derive(Debug, Default)]
pub struct PlanOutcome {
    pub targets: WatchSet,
    /// Function table as read during this pass.
    pub functions: FunctionTable,
    /// Files that enabled functions import, entrypoints and manifests included.
    pub dependencies: BTreeSet<PathBuf>,
    /// Planner errors (watch limit). The target set is partial when non-empty.
    pub errors: Vec<EdgeWatchError>,
    /// Per-file resolver problems; informational only.
    pub resolver_errors: Vec<EdgeWatchError>,
}

impl PlanOutcome {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Raised when the directory budget runs out.
struct LimitReached;

struct DirBudget {
    limit: usize,
}

impl DirBudget {
    fn add(&self, set: &mut WatchSet, dir: &Path) -> std::result::Result<(), LimitReached> {
        if set.contains(dir) {
            return Ok(());
        }
        if set.dir_count() >= self.limit {
            return Err(LimitReached);
        }
        set.insert(WatchTarget::dir(dir));
        Ok(())
    }
}

/// Plans the watch-set from the current state of a project on disk.
#[derive(Debug, Clone)]
pub struct WatchSetPlanner {
    fs: Arc<dyn FileSystem>,
    paths: ProjectPaths,
    watch_limit: usize,
}

impl WatchSetPlanner {
    /// The directory limit is taken from `FUNCTIONS_WATCH_LIMIT`.
    pub fn new(fs: Arc<dyn FileSystem>, paths: ProjectPaths) -> Self {
        Self {
            fs,
            paths,
            watch_limit: watch_limit_from_env(),
        }
    }

    pub fn with_watch_limit(mut self, limit: usize) -> Self {
        self.watch_limit = limit;
        self
    }

    pub fn watch_limit(&self) -> usize {
        self.watch_limit
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Compute the watch-set.
    ///
    /// Fails only when the function table cannot be read. Exceeding the
    /// directory limit is reported in [`PlanOutcome::errors`] alongside the
    /// partial set collected so far.
    pub fn plan(&self) -> Result<PlanOutcome> {
        let mut outcome = PlanOutcome::default();
        let budget = DirBudget {
            limit: self.watch_limit,
        };

        let functions_dir = self.paths.resolve(&self.paths.functions_dir);

        if self.add_functions_tree(&mut outcome.targets, &budget, &functions_dir).is_err() {
            outcome.errors.push(self.limit_error());
            return Ok(outcome);
        }

        let config_path = self.paths.resolve(&self.paths.config_path);
        if self.fs.is_file(&config_path) {
            outcome.targets.insert(WatchTarget::file(&config_path));
        }

        outcome.functions = load_function_table(self.fs.as_ref(), &self.paths).map_err(|e| {
            EdgeWatchError::Planner(format!("failed to load function config {}: {e}", config_path.display()))
        })?;

        let resolver = ImportResolver::new(self.fs.as_ref(), &self.paths.root);
        for function in outcome.functions.values().filter(|f| f.enabled) {
            let resolution = resolver.walk(&function.entrypoint, function.import_map.as_deref());
            debug!(
                slug = %function.slug,
                files = resolution.graph.len(),
                "resolved function imports"
            );
            outcome.dependencies.extend(resolution.files());
            outcome.resolver_errors.extend(resolution.errors);
        }

        let dependency_dirs: BTreeSet<PathBuf> = outcome
            .dependencies
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .filter(|dir| !is_within(dir, &functions_dir))
            .collect();

        for dir in dependency_dirs {
            if budget.add(&mut outcome.targets, &dir).is_err() {
                outcome.errors.push(self.limit_error());
                return Ok(outcome);
            }
        }

        debug!(
            targets = outcome.targets.len(),
            dirs = outcome.targets.dir_count(),
            "planned watch-set"
        );
        Ok(outcome)
    }

    fn add_functions_tree(
        &self,
        set: &mut WatchSet,
        budget: &DirBudget,
        functions_dir: &Path,
    ) -> std::result::Result<(), LimitReached> {
        if !self.fs.is_dir(functions_dir) {
            debug!(dir = ?functions_dir, "functions directory does not exist");
            return Ok(());
        }

        budget.add(set, functions_dir)?;
        let mut stack = vec![functions_dir.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let entries = match self.fs.read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(dir = ?dir, error = %err, "failed to read directory; skipping");
                    continue;
                }
            };
            let children: Vec<PathBuf> = entries
                .into_iter()
                .filter(|child| self.fs.is_dir(child))
                .filter(|child| !is_ignored_dir(basename(child), functions_dir, child))
                .collect();
            for child in &children {
                budget.add(set, child)?;
            }
            // Reverse so the stack visits children in sorted order.
            stack.extend(children.into_iter().rev());
        }
        Ok(())
    }

    fn limit_error(&self) -> EdgeWatchError {
        let limit = self.watch_limit;
        warn!(limit, "watch limit reached");
        EdgeWatchError::Planner(format!(
            "watch limit of {limit} directories reached; set {WATCH_LIMIT_ENV}={} to watch more",
            limit.saturating_mul(4)
        ))
    }
}
