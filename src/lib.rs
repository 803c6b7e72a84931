// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod runtime;
pub mod types;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::fs::{FileSystem, RealFileSystem};
use crate::runtime::{ProcessRuntimeBackend, RestartDriver, plan_mounts};
use crate::types::ProjectPaths;
use crate::watch::{EdgeFunctionWatcher, WatchSetPlanner, WatcherConfig};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - project layout and config discovery
/// - the edge function watcher (unless `--no-reload`)
/// - the restart driver and its runtime backend
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let root = args
        .workdir
        .canonicalize()
        .with_context(|| format!("resolving project root {:?}", args.workdir))?;
    let paths = ProjectPaths::new(&root);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let planner = WatchSetPlanner::new(Arc::clone(&fs), paths.clone());

    if fs.is_file(&paths.config_path) {
        let cfg = config::load_and_validate(fs.as_ref(), &paths.config_path)?;
        if !cfg.edge_runtime.enabled {
            info!("edge runtime disabled in {:?}; nothing to do", paths.config_path);
            return Ok(());
        }
    }

    if args.dry_run {
        print_dry_run(&planner)?;
        return Ok(());
    }

    let cancel = CancellationToken::new();

    // Ctrl-C → graceful shutdown.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            cancel.cancel();
        });
    }

    let watcher = if args.no_reload {
        None
    } else {
        let config = WatcherConfig::default().with_debounce(Duration::from_millis(args.debounce_ms));
        match EdgeFunctionWatcher::with_config(planner.clone(), config) {
            Ok(w) => Some(w),
            Err(err) => {
                warn!(error = %err, "hot-reload unavailable");
                None
            }
        }
    };

    let channels = match &watcher {
        Some(w) => match w.watch(cancel.clone()) {
            Ok(channels) => Some(channels),
            Err(err) => {
                warn!(error = %err, "hot-reload unavailable");
                None
            }
        },
        None => None,
    };

    let backend = ProcessRuntimeBackend::new(args.runtime_cmd, &root);
    let driver = RestartDriver::new(backend, planner);
    driver.run(channels, cancel).await?;

    if let Some(w) = watcher {
        w.close()?;
    }
    debug!("edgewatch exiting");
    Ok(())
}

/// Print functions, watch-set and mounts without starting anything.
fn print_dry_run(planner: &WatchSetPlanner) -> Result<()> {
    let outcome = planner.plan()?;
    let mounts = plan_mounts(planner.fs().as_ref(), planner.paths(), &outcome)?;

    println!("edgewatch dry-run");
    println!("  root = {}", planner.paths().root.display());
    println!("  watch limit = {}", planner.watch_limit());
    println!();

    println!("functions ({}):", outcome.functions.len());
    for (slug, f) in &outcome.functions {
        println!("  - {slug}{}", if f.enabled { "" } else { " (disabled)" });
        println!("      entrypoint: {}", f.entrypoint.display());
        if let Some(ref map) = f.import_map {
            println!("      import_map: {}", map.display());
        }
        println!("      verify_jwt: {}", f.verify_jwt);
        if !f.static_files.is_empty() {
            println!("      static_files: {:?}", f.static_files);
        }
    }
    println!();

    println!("watch-set ({}):", outcome.targets.len());
    for target in outcome.targets.iter() {
        let kind = if target.is_file { "file" } else { "dir " };
        println!("  {kind} {}", target.path.display());
    }
    for err in outcome.errors.iter().chain(&outcome.resolver_errors) {
        println!("  ! {err}");
    }
    println!();

    println!("mounts ({}):", mounts.binds.len());
    for bind in &mounts.binds {
        println!("  {} -> {}", bind.host.display(), bind.container);
    }

    Ok(())
}
