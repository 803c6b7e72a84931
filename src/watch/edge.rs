// src/watch/edge.rs

//! Hot-reload watcher for a project's edge functions.
//!
//! Wraps a [`GenericWatcher`] and keeps its targets in sync with the import
//! graphs of the enabled functions: after every debounced restart the
//! watch-set is re-planned *before* the restart is forwarded, so a newly
//! imported file is observed by the time the runtime comes back up.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{EdgeWatchError, Result};
use crate::fs::FileSystem;
use crate::types::{ProjectPaths, WatchSet};
use crate::watch::event_loop::WatcherConfig;
use crate::watch::planner::{PlanOutcome, WatchSetPlanner};
use crate::watch::watcher::{GenericWatcher, WatchChannels};

pub struct EdgeFunctionWatcher {
    planner: WatchSetPlanner,
    watcher: Arc<GenericWatcher>,
}

impl std::fmt::Debug for EdgeFunctionWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeFunctionWatcher")
            .field("paths", self.planner.paths())
            .finish_non_exhaustive()
    }
}

impl EdgeFunctionWatcher {
    /// Watcher with the default debounce and filters.
    pub fn new(fs: Arc<dyn FileSystem>, paths: ProjectPaths) -> Result<Self> {
        Self::with_config(WatchSetPlanner::new(fs, paths), WatcherConfig::default())
    }

    pub fn with_config(planner: WatchSetPlanner, config: WatcherConfig) -> Result<Self> {
        Ok(Self {
            planner,
            watcher: Arc::new(GenericWatcher::new(config)?),
        })
    }

    pub fn planner(&self) -> &WatchSetPlanner {
        &self.planner
    }

    /// Current watch-set.
    pub fn targets(&self) -> WatchSet {
        self.watcher.targets()
    }

    /// Plan the initial watch-set and start watching.
    ///
    /// Fails when the initial plan fails (the partial set from a watch-limit
    /// overflow is still applied first) or when the watcher was already
    /// started. Later planning problems arrive on the error channel and
    /// never stop the restart stream.
    pub fn watch(&self, cancel: CancellationToken) -> Result<WatchChannels> {
        let outcome = self.planner.plan()?;
        let PlanOutcome { targets, errors, .. } = outcome;

        info!(
            targets = targets.len(),
            dirs = targets.dir_count(),
            "watching edge functions"
        );
        self.watcher.set_targets(targets);
        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }

        let (inner_restart, inner_errors) = self.watcher.watch(cancel.clone())?;
        let (restart_tx, restart_rx) = mpsc::channel::<()>(1);
        let (error_tx, error_rx) = mpsc::channel::<EdgeWatchError>(1);

        let forwarder = Forwarder {
            planner: self.planner.clone(),
            watcher: Arc::clone(&self.watcher),
            restart_tx,
            error_tx,
        };
        tokio::spawn(forwarder.run(inner_restart, inner_errors, cancel));

        Ok((restart_rx, error_rx))
    }

    /// Release the underlying notification handle; idempotent.
    pub fn close(&self) -> Result<()> {
        self.watcher.close()
    }
}

/// Sole writer of the watch-set once watching has started.
struct Forwarder {
    planner: WatchSetPlanner,
    watcher: Arc<GenericWatcher>,
    restart_tx: mpsc::Sender<()>,
    error_tx: mpsc::Sender<EdgeWatchError>,
}

impl Forwarder {
    async fn run(
        self,
        mut inner_restart: mpsc::Receiver<()>,
        mut inner_errors: mpsc::Receiver<EdgeWatchError>,
        cancel: CancellationToken,
    ) {
        let mut errors_open = true;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                signal = inner_restart.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    self.refresh().await;
                    match self.restart_tx.try_send(()) {
                        Ok(()) => info!("edge functions changed; restart requested"),
                        Err(TrySendError::Full(())) => debug!("restart already pending; coalesced"),
                        Err(TrySendError::Closed(())) => {
                            debug!("restart consumer gone; stopping");
                            break;
                        }
                    }
                }

                err = inner_errors.recv(), if errors_open => {
                    match err {
                        Some(err) => self.report(err),
                        None => errors_open = false,
                    }
                }
            }
        }
        debug!("edge function watcher stopped");
    }

    /// Re-plan and apply the watch-set. On a hard failure the previous set
    /// stays in place.
    ///
    /// Registration runs off the async workers: the notification thread may
    /// be parked on a full event buffer that only the event loop drains.
    async fn refresh(&self) {
        let planner = self.planner.clone();
        let watcher = Arc::clone(&self.watcher);
        let refreshed = tokio::task::spawn_blocking(move || -> Result<(usize, Vec<EdgeWatchError>)> {
            let outcome = planner.plan()?;
            let targets = outcome.targets.len();
            watcher.set_targets(outcome.targets);
            Ok((targets, outcome.errors))
        })
        .await
        .unwrap_or_else(|e| Err(EdgeWatchError::Planner(format!("planner task failed: {e}"))));

        match refreshed {
            Ok((targets, errors)) => {
                debug!(targets, "refreshed watch-set");
                for err in errors {
                    self.report(err);
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to refresh watch-set; keeping previous targets");
                self.report(err);
            }
        }
    }

    fn report(&self, err: EdgeWatchError) {
        if let Err(TrySendError::Full(dropped)) = self.error_tx.try_send(err) {
            debug!(error = %dropped, "error channel full; dropping error");
        }
    }
}
