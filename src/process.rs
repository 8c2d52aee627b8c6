//! Child-process supervision
//!
//! [`ProcessRunner`] is the seam between the queue engine and the operating
//! system: it launches one [`Invocation`] and hands back a [`ProcessHandle`]
//! exposing the child's combined stdout/stderr as a finite line stream plus
//! its final exit code. [`TokioProcessRunner`] is the production
//! implementation; tests plug in scripted runners through the same trait.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::command::Invocation;
use crate::error::{Error, Result};

/// Per-process line channel capacity
///
/// The consumer reads continuously, so this only needs to absorb short
/// bursts; a full channel applies backpressure to the forwarder tasks, not
/// to the child itself (the OS pipe buffers in between).
const LINE_BUFFER: usize = 256;

/// Exit code reported when the OS gives us none (signal-killed child,
/// or a lost supervisor)
const EXIT_CODE_UNKNOWN: i32 = -1;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Launches invocations as supervised child processes
///
/// Trait object seam so the engine can run against a real OS process in
/// production and a scripted double in tests.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Launch the invocation
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] when the executable cannot be spawned
    /// (missing binary, permission denied). This is fatal to the task run
    /// that requested the launch; there is no retry at this layer.
    async fn spawn(&self, invocation: &Invocation) -> Result<ProcessHandle>;
}

/// Handle to one running child process
///
/// A handle is consumed exactly once: read lines until end-of-stream, then
/// wait for the exit code. Restarting means spawning a new process.
pub struct ProcessHandle {
    line_rx: mpsc::Receiver<String>,
    exit_rx: oneshot::Receiver<i32>,
}

impl ProcessHandle {
    /// Assemble a handle from raw channels
    ///
    /// Used by [`TokioProcessRunner`] and by test runners that script the
    /// line stream and exit code by hand.
    pub fn from_parts(line_rx: mpsc::Receiver<String>, exit_rx: oneshot::Receiver<i32>) -> Self {
        Self { line_rx, exit_rx }
    }

    /// Next line of the combined stdout/stderr stream
    ///
    /// Blocks the calling task until a line is available; returns `None` at
    /// end-of-stream (both pipes closed).
    pub async fn next_line(&mut self) -> Option<String> {
        self.line_rx.recv().await
    }

    /// Wait for the child to terminate and return its exit code
    ///
    /// Consumes the handle. A child killed by a signal (or a lost
    /// supervisor) reports -1, which callers treat like any nonzero exit.
    pub async fn wait(self) -> i32 {
        self.exit_rx.await.unwrap_or(EXIT_CODE_UNKNOWN)
    }
}

/// Production [`ProcessRunner`] backed by tokio's process support
///
/// Spawns the child with both output pipes captured and merged into a single
/// line stream. No interactive console is attached; on Windows the child is
/// created without a console window.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn spawn(&self, invocation: &Invocation) -> Result<ProcessHandle> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command.spawn().map_err(|source| Error::Launch {
            program: invocation.program.display().to_string(),
            source,
        })?;

        tracing::debug!(
            program = %invocation.program.display(),
            pid = child.id(),
            "Child process spawned"
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        let (exit_tx, exit_rx) = oneshot::channel();

        // Supervisor task: drain both pipes, then reap the child. The line
        // channel closes when the last forwarder drops its sender, which is
        // how the consumer observes end-of-stream.
        tokio::spawn(async move {
            let stdout_task =
                stdout.map(|pipe| tokio::spawn(forward_lines(pipe, line_tx.clone())));
            let stderr_task = stderr.map(|pipe| tokio::spawn(forward_lines(pipe, line_tx)));

            if let Some(task) = stdout_task {
                task.await.ok();
            }
            if let Some(task) = stderr_task {
                task.await.ok();
            }

            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(EXIT_CODE_UNKNOWN),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to reap child process");
                    EXIT_CODE_UNKNOWN
                }
            };
            exit_tx.send(code).ok();
        });

        Ok(ProcessHandle { line_rx, exit_rx })
    }
}

/// Forward one pipe to the shared line channel, line by line, until EOF
async fn forward_lines<R>(pipe: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            // Consumer dropped the handle; stop forwarding
            break;
        }
    }
}
