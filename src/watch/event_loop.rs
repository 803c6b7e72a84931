// src/watch/event_loop.rs

//! The debounce state machine behind [`GenericWatcher`](super::watcher::GenericWatcher).
//!
//! The loop selects over three sources: cancellation, the debounce timer,
//! and raw events from the notification library. It is `idle` until an
//! accepted event arrives, then `armed` until the timer fires; every further
//! accepted event pushes the deadline back by one debounce interval.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::errors::EdgeWatchError;
use crate::types::{WatchSet, WatchTarget};
use crate::watch::filter::{FsEvent, Op, is_ignored_dir, is_ignored_file_event, is_significant};
use crate::watch::path_utils::basename;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Raw item produced by the notification library.
pub type RawEvent = notify::Result<notify::Event>;

pub type IgnoreFn = Arc<dyn Fn(&Path, Op) -> bool + Send + Sync>;
/// `(dir_basename, root, current_path)`
pub type DirIgnoreFn = Arc<dyn Fn(&str, &Path, &Path) -> bool + Send + Sync>;
pub type SignificantFn = Arc<dyn Fn(&FsEvent) -> bool + Send + Sync>;

/// Behaviour knobs of a generic watcher.
#[derive(Clone)]
pub struct WatcherConfig {
    pub debounce: Duration,
    pub ignore_fn: IgnoreFn,
    pub dir_ignore_fn: DirIgnoreFn,
    pub significant_fn: SignificantFn,
}

impl WatcherConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            ignore_fn: Arc::new(|path: &Path, op: Op| is_ignored_file_event(basename(path), op)),
            dir_ignore_fn: Arc::new(is_ignored_dir),
            significant_fn: Arc::new(is_significant),
        }
    }
}

impl fmt::Debug for WatcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherConfig")
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

/// Decides whether a single event may arm the debounce timer.
#[derive(Clone)]
pub struct EventGate {
    config: WatcherConfig,
    targets: Arc<RwLock<WatchSet>>,
}

impl fmt::Debug for EventGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EventGate {
    pub fn new(config: WatcherConfig, targets: Arc<RwLock<WatchSet>>) -> Self {
        Self { config, targets }
    }

    pub fn debounce(&self) -> Duration {
        self.config.debounce
    }

    /// An event passes when its path is covered by a current target, it is
    /// not editor noise, it does not live in an ignored directory, and its
    /// operation is significant.
    pub fn accepts(&self, event: &FsEvent) -> bool {
        let target = {
            let targets = self.targets.read().unwrap_or_else(|p| p.into_inner());
            match targets.target_for(&event.path) {
                Some(t) => t.clone(),
                None => {
                    trace!(path = ?event.path, "event outside watch-set");
                    return false;
                }
            }
        };

        if (self.config.ignore_fn)(event.path.as_path(), event.op) {
            trace!(path = ?event.path, op = ?event.op, "ignored file event");
            return false;
        }
        if self.in_ignored_dir(&target, &event.path) {
            trace!(path = ?event.path, "event inside ignored directory");
            return false;
        }
        (self.config.significant_fn)(event)
    }

    fn in_ignored_dir(&self, target: &WatchTarget, path: &Path) -> bool {
        if target.is_file || path == target.path.as_path() {
            return false;
        }
        let mut current = path;
        let mut check_self = path.is_dir();
        while current != target.path.as_path() {
            if check_self && (self.config.dir_ignore_fn)(basename(current), target.path.as_path(), current) {
                return true;
            }
            check_self = true;
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        false
    }
}

/// Run the loop until `cancel` fires or `source` closes.
///
/// Both output channels are closed when this returns (their senders are
/// dropped). Sends never block: a pending restart absorbs later bursts and a
/// full error channel drops the newer error.
pub async fn run_event_loop(
    mut source: mpsc::Receiver<RawEvent>,
    gate: EventGate,
    restart_tx: mpsc::Sender<()>,
    error_tx: mpsc::Sender<EdgeWatchError>,
    cancel: CancellationToken,
) {
    let debounce = gate.debounce();
    let timer = sleep_until(Instant::now() + debounce);
    tokio::pin!(timer);
    let mut armed = false;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("event loop cancelled");
                break;
            }

            _ = &mut timer, if armed => {
                armed = false;
                match restart_tx.try_send(()) {
                    Ok(()) => debug!("restart signalled"),
                    Err(TrySendError::Full(())) => debug!("restart already pending; coalesced"),
                    Err(TrySendError::Closed(())) => {
                        debug!("restart receiver dropped; stopping event loop");
                        break;
                    }
                }
            }

            raw = source.recv() => {
                match raw {
                    None => {
                        debug!("event source closed");
                        break;
                    }
                    Some(Ok(event)) => {
                        let accepted = FsEvent::from_notify(&event)
                            .iter()
                            .any(|e| gate.accepts(e));
                        if accepted {
                            trace!(kind = ?event.kind, paths = ?event.paths, "debounce timer (re)armed");
                            timer.as_mut().reset(Instant::now() + debounce);
                            armed = true;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "notification error");
                        if let Err(TrySendError::Full(dropped)) =
                            error_tx.try_send(EdgeWatchError::WatcherRuntime(err.to_string()))
                        {
                            debug!(error = %dropped, "error channel full; dropping error");
                        }
                    }
                }
            }
        }
    }
}
