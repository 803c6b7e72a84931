//! Shared fixtures for the edgewatch integration tests.

pub mod builders;
pub mod fake_backend;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for a whole async test body.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Install a captured tracing subscriber once per test binary.
///
/// `RUST_LOG` selects levels (for example `RUST_LOG=edgewatch=debug`);
/// output only shows up for failing tests unless run with `--nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).with_test_writer().with_target(true).init();
    });
}

/// Run `f`, panicking if it outlives [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test body did not finish within {TEST_TIMEOUT:?}"),
    }
}

/// Wait up to `within` for one restart signal.
pub async fn expect_restart(rx: &mut mpsc::Receiver<()>, within: Duration) {
    match tokio::time::timeout(within, rx.recv()).await {
        Ok(Some(())) => {}
        Ok(None) => panic!("restart channel closed while waiting for a restart"),
        Err(_) => panic!("no restart within {within:?}"),
    }
}

/// Panic if a restart arrives during `quiet`.
pub async fn expect_no_restart(rx: &mut mpsc::Receiver<()>, quiet: Duration) {
    if let Ok(Some(())) = tokio::time::timeout(quiet, rx.recv()).await {
        panic!("unexpected restart within {quiet:?}");
    }
}
