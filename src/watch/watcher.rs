// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{EdgeWatchError, Result};
use crate::types::WatchSet;
use crate::watch::event_loop::{EventGate, RawEvent, WatcherConfig, run_event_loop};

/// Capacity of the hand-off channel between the notification thread and the
/// event loop.
pub const EVENT_BUFFER: usize = 256;

/// Receivers handed out by [`GenericWatcher::watch`].
pub type WatchChannels = (mpsc::Receiver<()>, mpsc::Receiver<EdgeWatchError>);

/// Debounced watcher over an explicit set of files and directories.
///
/// Directories are registered non-recursively; a file target registers its
/// parent directory and is then matched by exact path, so editors that save
/// through rename-over keep being observed.
pub struct GenericWatcher {
    config: WatcherConfig,
    targets: Arc<RwLock<WatchSet>>,
    /// Paths currently registered with the OS.
    observed: Mutex<BTreeSet<PathBuf>>,
    notifier: Mutex<Option<RecommendedWatcher>>,
    source: Mutex<Option<mpsc::Receiver<RawEvent>>>,
}

impl std::fmt::Debug for GenericWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericWatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl GenericWatcher {
    /// Acquire the OS notification handle. Nothing is observed until
    /// [`set_targets`](Self::set_targets) is called.
    pub fn new(config: WatcherConfig) -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::channel::<RawEvent>(EVENT_BUFFER);

        // Called synchronously on the notification library's own thread.
        let notifier = RecommendedWatcher::new(
            move |res: RawEvent| {
                // Fails only once the event loop has exited.
                let _ = raw_tx.blocking_send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| EdgeWatchError::WatcherSetup(e.to_string()))?;

        Ok(Self {
            config,
            targets: Arc::new(RwLock::new(WatchSet::new())),
            observed: Mutex::new(BTreeSet::new()),
            notifier: Mutex::new(Some(notifier)),
            source: Mutex::new(Some(raw_rx)),
        })
    }

    /// Replace the observed set.
    ///
    /// Registrations no longer needed are removed before new ones are added.
    /// Per-path failures are logged and returned as `filesystem` errors; they
    /// never abort the swap.
    pub fn set_targets(&self, targets: WatchSet) -> Vec<EdgeWatchError> {
        let wanted = registrations(&targets);
        {
            let mut current = self.targets.write().unwrap_or_else(|p| p.into_inner());
            *current = targets;
        }

        let mut guard = lock(&self.notifier);
        let Some(notifier) = guard.as_mut() else {
            debug!("watcher closed; target swap not registered with the OS");
            return Vec::new();
        };

        let mut errors = Vec::new();
        let mut observed = lock(&self.observed);

        let stale: Vec<PathBuf> = observed.difference(&wanted).cloned().collect();
        for path in stale {
            observed.remove(&path);
            if let Err(err) = notifier.unwatch(&path) {
                warn!(path = ?path, error = %err, "failed to remove watch");
                errors.push(EdgeWatchError::filesystem(&path, err));
            }
        }

        for path in wanted {
            if observed.contains(&path) {
                continue;
            }
            match notifier.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    observed.insert(path);
                }
                Err(err) => {
                    warn!(path = ?path, error = %err, "failed to add watch");
                    errors.push(EdgeWatchError::filesystem(&path, err));
                }
            }
        }

        debug!(observed = observed.len(), "watch targets updated");
        errors
    }

    /// Snapshot of the current logical target set.
    pub fn targets(&self) -> WatchSet {
        self.targets.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Paths currently registered with the OS.
    pub fn observed_paths(&self) -> BTreeSet<PathBuf> {
        lock(&self.observed).clone()
    }

    /// Start the event loop. May only be called once per watcher.
    ///
    /// Returns the restart channel (capacity 1, coalescing) and the error
    /// channel (capacity 1). Both close when `cancel` fires or the watcher
    /// is closed.
    pub fn watch(&self, cancel: CancellationToken) -> Result<WatchChannels> {
        let source = lock(&self.source)
            .take()
            .ok_or_else(|| EdgeWatchError::WatcherSetup("watch() called more than once".to_string()))?;

        let (restart_tx, restart_rx) = mpsc::channel::<()>(1);
        let (error_tx, error_rx) = mpsc::channel::<EdgeWatchError>(1);
        let gate = EventGate::new(self.config.clone(), Arc::clone(&self.targets));

        info!(debounce = ?self.config.debounce, "file watcher started");
        tokio::spawn(async move {
            run_event_loop(source, gate, restart_tx, error_tx, cancel).await;
            debug!("watcher event loop finished");
        });

        Ok((restart_rx, error_rx))
    }

    /// Release the OS notification handle. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        if lock(&self.notifier).take().is_some() {
            lock(&self.observed).clear();
            debug!("file watcher closed");
        }
        Ok(())
    }
}

/// Directories to register with the OS for a target set.
fn registrations(targets: &WatchSet) -> BTreeSet<PathBuf> {
    targets
        .iter()
        .filter_map(|t| {
            if t.is_file {
                t.path.parent().map(Path::to_path_buf)
            } else {
                Some(t.path.clone())
            }
        })
        .collect()
}
