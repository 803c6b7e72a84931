// tests/generic_watcher.rs
mod common;
use crate::common::{TestResult, expect_no_restart, expect_restart, init_tracing, run_with_timeout};

use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use edgewatch::errors::ErrorKind;
use edgewatch::types::{WatchSet, WatchTarget};
use edgewatch::watch::{GenericWatcher, WatcherConfig};

const DEBOUNCE: Duration = Duration::from_millis(100);

fn watcher() -> GenericWatcher {
    GenericWatcher::new(WatcherConfig::default().with_debounce(DEBOUNCE)).unwrap()
}

#[tokio::test]
async fn set_targets_applies_exactly_the_planned_set() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let root = dir.path().canonicalize()?;
        fs::create_dir_all(root.join("a/b"))?;
        fs::write(root.join("config.toml"), "")?;

        let w = watcher();
        let set: WatchSet = [
            WatchTarget::dir(root.join("a")),
            WatchTarget::dir(root.join("a/b")),
            WatchTarget::file(root.join("config.toml")),
        ]
        .into_iter()
        .collect();

        let errors = w.set_targets(set.clone());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(w.targets(), set);
        assert_eq!(
            w.observed_paths(),
            BTreeSet::from([root.clone(), root.join("a"), root.join("a/b")])
        );

        // Shrinking drops the stale registrations.
        let smaller: WatchSet = [WatchTarget::dir(root.join("a"))].into_iter().collect();
        assert!(w.set_targets(smaller.clone()).is_empty());
        assert_eq!(w.targets(), smaller);
        assert_eq!(w.observed_paths(), BTreeSet::from([root.join("a")]));

        w.close()?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn missing_paths_are_reported_per_path() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let root = dir.path().canonicalize()?;

        let w = watcher();
        let set: WatchSet = [WatchTarget::dir(root.clone()), WatchTarget::dir(root.join("missing"))]
            .into_iter()
            .collect();

        let errors = w.set_targets(set.clone());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::Filesystem);
        // The logical set is still swapped in full.
        assert_eq!(w.targets(), set);
        assert_eq!(w.observed_paths(), BTreeSet::from([root]));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn writes_in_a_watched_dir_restart() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let root = dir.path().canonicalize()?;

        let w = watcher();
        w.set_targets([WatchTarget::dir(root.clone())].into_iter().collect());
        let (mut restarts, _errors) = w.watch(CancellationToken::new())?;

        fs::write(root.join("index.ts"), "export {}")?;
        expect_restart(&mut restarts, Duration::from_secs(2)).await;

        // Editor noise alone stays quiet.
        fs::write(root.join("index.ts~"), "backup")?;
        expect_no_restart(&mut restarts, DEBOUNCE * 4).await;

        w.close()?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn removed_targets_stop_producing_restarts() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let root = dir.path().canonicalize()?;
        let kept = root.join("kept");
        let dropped = root.join("dropped");
        fs::create_dir_all(&kept)?;
        fs::create_dir_all(&dropped)?;

        let w = watcher();
        w.set_targets([WatchTarget::dir(kept.clone()), WatchTarget::dir(dropped.clone())].into_iter().collect());
        let (mut restarts, _errors) = w.watch(CancellationToken::new())?;

        w.set_targets([WatchTarget::dir(kept.clone())].into_iter().collect());
        fs::write(dropped.join("x.ts"), "1")?;
        expect_no_restart(&mut restarts, DEBOUNCE * 5).await;

        fs::write(kept.join("x.ts"), "1")?;
        expect_restart(&mut restarts, Duration::from_secs(2)).await;

        w.close()?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn file_target_ignores_siblings() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let root = dir.path().canonicalize()?;
        let config = root.join("config.toml");
        fs::write(&config, "a = 1")?;

        let w = watcher();
        w.set_targets([WatchTarget::file(config.clone())].into_iter().collect());
        let (mut restarts, _errors) = w.watch(CancellationToken::new())?;

        fs::write(root.join("seed.sql"), "select 1;")?;
        expect_no_restart(&mut restarts, DEBOUNCE * 5).await;

        fs::write(&config, "a = 2")?;
        expect_restart(&mut restarts, Duration::from_secs(2)).await;

        w.close()?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn watch_twice_is_a_setup_error() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let w = watcher();
        let _channels = w.watch(CancellationToken::new())?;

        let err = w.watch(CancellationToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WatcherSetup);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn close_is_idempotent_and_ends_the_stream() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let w = watcher();
        let (mut restarts, mut errors) = w.watch(CancellationToken::new())?;

        w.close()?;
        w.close()?;

        assert_eq!(restarts.recv().await, None);
        assert!(errors.recv().await.is_none());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn cancellation_ends_the_stream() -> TestResult {
    run_with_timeout(async {
        init_tracing();
        let w = watcher();
        let cancel = CancellationToken::new();
        let (mut restarts, _errors) = w.watch(cancel.clone())?;

        cancel.cancel();
        assert_eq!(restarts.recv().await, None);
        w.close()?;
        Ok(())
    })
    .await
}
