// tests/restart_driver.rs
mod common;
use crate::common::{TestResult, init_tracing, run_with_timeout};

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use edgewatch::errors::EdgeWatchError;
use edgewatch::fs::mock::MockFileSystem;
use edgewatch::runtime::RestartDriver;
use edgewatch::types::ProjectPaths;
use edgewatch::watch::WatchSetPlanner;
use edgewatch_test_utils::fake_backend::{BackendCall, FakeRuntimeBackend};

fn planner(fs: &MockFileSystem) -> WatchSetPlanner {
    WatchSetPlanner::new(Arc::new(fs.clone()), ProjectPaths::new("/proj"))
}

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/supabase/functions/hello/index.ts", "");
    fs
}

async fn next_call(rx: &mut mpsc::UnboundedReceiver<BackendCall>) -> BackendCall {
    rx.recv().await.expect("backend dropped")
}

fn is_start(call: &BackendCall) -> bool {
    matches!(call, BackendCall::Start(_))
}

#[tokio::test]
async fn starts_once_and_restarts_on_signal() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let fs = project();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = FakeRuntimeBackend::new(events_tx, Arc::clone(&calls));

        let (restart_tx, restart_rx) = mpsc::channel(1);
        let (_error_tx, error_rx) = mpsc::channel::<EdgeWatchError>(1);
        let cancel = CancellationToken::new();

        let driver = RestartDriver::new(backend, planner(&fs));
        let handle = tokio::spawn(driver.run(Some((restart_rx, error_rx)), cancel.clone()));

        match next_call(&mut events).await {
            BackendCall::Start(plan) => assert_eq!(plan.functions.len(), 1),
            other => panic!("expected start, got {other:?}"),
        }

        // A function added between restarts shows up in the next plan.
        fs.add_file("/proj/supabase/functions/world/index.ts", "");
        restart_tx.send(()).await?;
        assert_eq!(next_call(&mut events).await, BackendCall::Stop);
        match next_call(&mut events).await {
            BackendCall::Start(plan) => assert_eq!(plan.functions.len(), 2),
            other => panic!("expected start, got {other:?}"),
        }

        cancel.cancel();
        handle.await??;
        assert_eq!(next_call(&mut events).await, BackendCall::Stop);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls.iter().filter(|c| is_start(c)).count(), 2);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn without_reload_runs_until_cancelled() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let fs = project();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = FakeRuntimeBackend::new(events_tx, Arc::clone(&calls));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(RestartDriver::new(backend, planner(&fs)).run(None, cancel.clone()));

        assert!(is_start(&next_call(&mut events).await));
        cancel.cancel();
        handle.await??;
        assert_eq!(next_call(&mut events).await, BackendCall::Stop);
        assert_eq!(calls.lock().unwrap().len(), 2);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn watcher_errors_and_closed_channels_do_not_stop_the_driver() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let fs = project();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = FakeRuntimeBackend::new(events_tx, Arc::clone(&calls));

        let (restart_tx, restart_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            RestartDriver::new(backend, planner(&fs)).run(Some((restart_rx, error_rx)), cancel.clone()),
        );
        assert!(is_start(&next_call(&mut events).await));

        error_tx
            .send(EdgeWatchError::WatcherRuntime("inotify queue overflow".into()))
            .await?;
        drop(error_tx);
        drop(restart_tx);

        // Both sources gone: the runtime keeps running until cancelled.
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await??;
        assert_eq!(next_call(&mut events).await, BackendCall::Stop);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn failed_start_is_logged_and_retried_on_restart() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let fs = project();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = FakeRuntimeBackend::new(events_tx, Arc::clone(&calls)).failing_start();

        let (restart_tx, restart_rx) = mpsc::channel(1);
        let (_error_tx, error_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            RestartDriver::new(backend, planner(&fs)).run(Some((restart_rx, error_rx)), cancel.clone()),
        );
        assert!(is_start(&next_call(&mut events).await));

        restart_tx.send(()).await?;
        assert_eq!(next_call(&mut events).await, BackendCall::Stop);
        assert!(is_start(&next_call(&mut events).await));

        cancel.cancel();
        handle.await??;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn broken_config_skips_start_but_keeps_serving() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let fs = project();
        fs.add_file("/proj/supabase/config.toml", "[functions.Broken]\n");
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = FakeRuntimeBackend::new(events_tx, Arc::clone(&calls));

        let (restart_tx, restart_rx) = mpsc::channel(1);
        let (_error_tx, error_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            RestartDriver::new(backend, planner(&fs)).run(Some((restart_rx, error_rx)), cancel.clone()),
        );

        // Let the first (failing) start attempt run.
        tokio::task::yield_now().await;
        assert!(calls.lock().unwrap().is_empty());

        // Fix the config, then ask for a restart.
        fs.add_file("/proj/supabase/config.toml", "[functions.hello]\nverify_jwt = false\n");
        restart_tx.send(()).await?;

        assert_eq!(next_call(&mut events).await, BackendCall::Stop);
        match next_call(&mut events).await {
            BackendCall::Start(plan) => {
                let hello = plan.functions.values().next().expect("hello mounted");
                assert!(!hello.verify_jwt);
            }
            other => panic!("expected start, got {other:?}"),
        }

        cancel.cancel();
        handle.await??;
        Ok(())
    })
    .await
}
