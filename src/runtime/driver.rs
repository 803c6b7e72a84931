// src/runtime/driver.rs

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{EdgeWatchError, Result};
use crate::runtime::backend::RuntimeBackend;
use crate::runtime::mounts::{MountPlan, plan_mounts};
use crate::watch::planner::WatchSetPlanner;
use crate::watch::watcher::WatchChannels;

/// Recreates the edge runtime whenever the watcher asks for a restart.
///
/// Each restart is handled to completion before the next signal is read;
/// bursts that arrive meanwhile are coalesced by the watcher's channel.
pub struct RestartDriver<B: RuntimeBackend> {
    backend: B,
    planner: WatchSetPlanner,
}

impl<B: RuntimeBackend> std::fmt::Debug for RestartDriver<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestartDriver")
            .field("planner", &self.planner)
            .finish_non_exhaustive()
    }
}

impl<B: RuntimeBackend> RestartDriver<B> {
    pub fn new(backend: B, planner: WatchSetPlanner) -> Self {
        Self { backend, planner }
    }

    /// Mount plan for the current function configuration.
    pub fn mount_plan(&self) -> Result<MountPlan> {
        let outcome = self.planner.plan()?;
        plan_mounts(self.planner.fs().as_ref(), self.planner.paths(), &outcome)
    }

    /// Start the runtime, then serve restart signals until `cancel` fires.
    ///
    /// With `channels` set to `None` the runtime is started once and left
    /// alone. Backend failures are logged and never end the loop.
    pub async fn run(mut self, channels: Option<WatchChannels>, cancel: CancellationToken) -> Result<()> {
        self.start().await;

        let (mut restart_rx, mut error_rx) = match channels {
            Some((r, e)) => (Some(r), Some(e)),
            None => (None, None),
        };

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                signal = recv_or_pending(&mut restart_rx) => {
                    match signal {
                        Some(()) => self.restart().await,
                        None => {
                            warn!("restart channel closed; hot reload stopped");
                            restart_rx = None;
                        }
                    }
                }

                err = recv_or_pending(&mut error_rx) => {
                    match err {
                        Some(err) => report(&err),
                        None => error_rx = None,
                    }
                }
            }
        }

        info!("shutting down edge runtime");
        self.backend.stop().await
    }

    async fn start(&mut self) {
        let plan = match self.mount_plan() {
            Ok(plan) => plan,
            Err(err) => {
                error!(error = %err, "failed to compute mount plan; edge runtime not started");
                return;
            }
        };
        if let Err(err) = self.backend.start(plan).await {
            error!(error = %err, "failed to start edge runtime");
        }
    }

    async fn restart(&mut self) {
        info!("restarting edge runtime");
        if let Err(err) = self.backend.stop().await {
            warn!(error = %err, "failed to stop edge runtime");
        }
        self.start().await;
        debug!("restart handled");
    }
}

/// Receive from an optional channel; a missing channel never yields.
async fn recv_or_pending<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn report(err: &EdgeWatchError) {
    warn!(kind = %err.kind(), "hot reload: {}", err);
}
