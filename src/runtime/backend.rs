// src/runtime/backend.rs

//! Pluggable edge runtime backend.
//!
//! The restart driver talks to a `RuntimeBackend` instead of a concrete
//! container client. `ProcessRuntimeBackend` runs a shell command (for
//! example a `docker run ...` line); tests provide a fake that only records
//! calls.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::runtime::mounts::MountPlan;

/// Environment variable carrying the JSON mount plan to the runtime command.
pub const MOUNT_PLAN_ENV: &str = "EDGEWATCH_MOUNT_PLAN";

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how the edge runtime is started and stopped.
pub trait RuntimeBackend: Send {
    /// Start the runtime with the given mounts.
    fn start(&mut self, plan: MountPlan) -> BackendFuture<'_>;

    /// Stop the runtime if it is running. Stopping a stopped runtime is a no-op.
    fn stop(&mut self) -> BackendFuture<'_>;
}

/// Runs the edge runtime as a child process.
#[derive(Debug)]
pub struct ProcessRuntimeBackend {
    cmd: String,
    workdir: PathBuf,
    child: Option<Child>,
}

impl ProcessRuntimeBackend {
    pub fn new(cmd: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            workdir: workdir.into(),
            child: None,
        }
    }

    fn command(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        }
    }

    async fn stop_child(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(code = ?status.code(), "edge runtime had already exited");
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to poll edge runtime status"),
        }

        child.kill().await.context("stopping edge runtime")?;
        info!("edge runtime stopped");
        Ok(())
    }

    async fn start_child(&mut self, plan: MountPlan) -> Result<()> {
        self.stop_child().await?;

        let mut cmd = self.command();
        cmd.current_dir(&self.workdir)
            .env(MOUNT_PLAN_ENV, plan.to_json()?)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning edge runtime `{}`", self.cmd))?;

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, "stderr");
        }

        info!(
            cmd = %self.cmd,
            binds = plan.binds.len(),
            functions = plan.functions.len(),
            "edge runtime started"
        );
        self.child = Some(child);
        Ok(())
    }
}

/// Consume a child stream so its buffer never fills, logging each line.
fn forward_lines<R>(stream: R, name: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(stream = name, "runtime: {}", line);
        }
    });
}

impl RuntimeBackend for ProcessRuntimeBackend {
    fn start(&mut self, plan: MountPlan) -> BackendFuture<'_> {
        Box::pin(self.start_child(plan))
    }

    fn stop(&mut self) -> BackendFuture<'_> {
        Box::pin(self.stop_child())
    }
}
