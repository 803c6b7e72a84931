use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::mpsc;
use edgewatch::errors::EdgeWatchError;
use edgewatch::runtime::MountPlan;
use edgewatch::runtime::RuntimeBackend;
use edgewatch::runtime::backend::BackendFuture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Start(MountPlan),
    Stop,
}

/// A fake runtime backend that:
/// - records every start/stop call
/// - forwards each call on `events_tx` so tests can await them.
pub struct FakeRuntimeBackend {
    events_tx: mpsc::UnboundedSender<BackendCall>,
    calls: Arc<Mutex<Vec<BackendCall>>>,
    fail_start: bool,
}

impl FakeRuntimeBackend {
    pub fn new(
        events_tx: mpsc::UnboundedSender<BackendCall>,
        calls: Arc<Mutex<Vec<BackendCall>>>,
    ) -> Self {
        Self {
            events_tx,
            calls,
            fail_start: false,
        }
    }

    /// Make every `start` fail after recording it.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call.clone());
        let _ = self.events_tx.send(call);
    }
}

impl RuntimeBackend for FakeRuntimeBackend {
    fn start(&mut self, plan: MountPlan) -> BackendFuture<'_> {
        Box::pin(async move {
            self.record(BackendCall::Start(plan));
            if self.fail_start {
                return Err(EdgeWatchError::from(anyhow!("fake start failure")));
            }
            Ok(())
        })
    }

    fn stop(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            self.record(BackendCall::Stop);
            Ok(())
        })
    }
}
