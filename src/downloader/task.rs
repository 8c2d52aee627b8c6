//! Download task state machine and run loop
//!
//! A [`DownloadTask`] binds one queued URL to its per-item parameters and
//! tracks everything observers need: current state, latest progress and the
//! accumulated diagnostic log. The run loop ([`run_download_task`]) owns the
//! whole lifecycle of one execution: build the invocation, launch the child,
//! consume its output line by line, and settle into a terminal state.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

use crate::command::CommandBuilder;
use crate::error::{Result, TaskError};
use crate::process::ProcessRunner;
use crate::progress::parse_percent;
use crate::types::{DownloadRequest, Event, ProgressEvent, QueueMode, TaskId, TaskState};

/// One queued URL's download execution unit
///
/// Shared as `Arc<DownloadTask>` between the sequencer, the run loop, and
/// any UI reading snapshots. All getters are synchronous and lock-cheap so a
/// UI thread can poll them without touching the async runtime; the values it
/// sees are eventually consistent with the run loop's writes.
pub struct DownloadTask {
    id: TaskId,
    request: DownloadRequest,
    queue_mode: QueueMode,
    created_at: DateTime<Utc>,
    state: RwLock<TaskState>,
    latest_progress: RwLock<Option<ProgressEvent>>,
    log: RwLock<Vec<String>>,
    playlist_position: RwLock<Option<(usize, usize)>>,
}

impl DownloadTask {
    /// Create a task in the Idle state
    pub(crate) fn new(id: TaskId, request: DownloadRequest, queue_mode: QueueMode) -> Self {
        Self {
            id,
            request,
            queue_mode,
            created_at: Utc::now(),
            state: RwLock::new(TaskState::Idle),
            latest_progress: RwLock::new(None),
            log: RwLock::new(Vec::new()),
            playlist_position: RwLock::new(None),
        }
    }

    /// Task ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The request this task was created from
    pub fn request(&self) -> &DownloadRequest {
        &self.request
    }

    /// Source URL
    pub fn url(&self) -> &str {
        &self.request.url
    }

    /// Queue this task belongs to
    pub fn queue_mode(&self) -> QueueMode {
        self.queue_mode
    }

    /// When the task was enqueued
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        *read(&self.state)
    }

    /// Most recent progress event, if any (last-write-wins)
    pub fn latest_progress(&self) -> Option<ProgressEvent> {
        read(&self.latest_progress).clone()
    }

    /// Full accumulated output of the child process so far, verbatim
    pub fn diagnostics(&self) -> Vec<String> {
        read(&self.log).clone()
    }

    /// 1-based (position, total) within the playlist queue, if assigned
    pub fn playlist_position(&self) -> Option<(usize, usize)> {
        *read(&self.playlist_position)
    }

    /// Stamp the playlist position before the run starts
    pub(crate) fn set_playlist_position(&self, position: usize, total: usize) {
        *write(&self.playlist_position) = Some((position, total));
    }

    /// Transition Idle → Running
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidState`] when the task already ran;
    /// states only move forward and a retry needs a fresh task.
    pub(crate) fn begin_run(&self) -> Result<()> {
        let mut state = write(&self.state);
        if *state != TaskState::Idle {
            return Err(TaskError::InvalidState {
                id: self.id,
                operation: "start".to_string(),
                current_state: state.to_string(),
            }
            .into());
        }
        *state = TaskState::Running;
        Ok(())
    }

    fn record_line(&self, line: String) {
        write(&self.log).push(line);
    }

    fn record_progress(&self, progress: ProgressEvent) {
        *write(&self.latest_progress) = Some(progress);
    }

    fn finish(&self, terminal: TaskState) {
        debug_assert!(terminal.is_terminal());
        *write(&self.state) = terminal;
    }
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("id", &self.id)
            .field("url", &self.request.url)
            .field("queue_mode", &self.queue_mode)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// A poisoned lock only means a writer panicked mid-update; the data is a
// plain value snapshot either way, so recover it instead of propagating.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Everything one task execution needs, bundled for the spawned run loop
pub(crate) struct TaskRunContext {
    pub(crate) task: Arc<DownloadTask>,
    pub(crate) builder: Arc<CommandBuilder>,
    pub(crate) runner: Arc<dyn ProcessRunner>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// The queue's target folder at start time (before the per-mode subfolder)
    pub(crate) target_folder: PathBuf,
}

/// Run one download to a terminal state
///
/// Confines every blocking point (line reads, exit wait) to the calling
/// task, which the sequencer spawns per download. Failures settle the task
/// as Failed and are never propagated — sibling tasks and the sequencer
/// keep going.
pub(crate) async fn run_download_task(ctx: TaskRunContext) -> TaskState {
    let TaskRunContext {
        task,
        builder,
        runner,
        event_tx,
        target_folder,
    } = ctx;

    if let Err(e) = task.begin_run() {
        tracing::warn!(task_id = task.id().0, error = %e, "Refusing to re-run task");
        return task.state();
    }

    // Namespace outputs per media kind under the queue's folder
    let folder = target_folder.join(task.request().mode.subfolder());
    if let Err(e) = tokio::fs::create_dir_all(&folder).await {
        return fail(&task, &event_tx, format!(
            "failed to create target folder '{}': {}",
            folder.display(),
            e
        ));
    }

    let invocation = builder.build(task.request(), &folder);
    tracing::info!(
        task_id = task.id().0,
        url = task.url(),
        command = %invocation.command_line(),
        "Starting download"
    );

    let mut handle = match runner.spawn(&invocation).await {
        Ok(handle) => handle,
        Err(e) => return fail(&task, &event_tx, e.to_string()),
    };

    let playlist_position = task.playlist_position();
    while let Some(line) = handle.next_line().await {
        // Every line lands in the diagnostic log, progress line or not
        task.record_line(line.clone());

        if let Some(percent) = parse_percent(&line) {
            let progress = ProgressEvent {
                percent,
                raw_line: line,
                playlist_position,
            };
            task.record_progress(progress.clone());
            event_tx
                .send(Event::Progress {
                    id: task.id(),
                    progress,
                })
                .ok();
        }
    }

    let exit_code = handle.wait().await;
    let terminal = if exit_code == 0 {
        TaskState::Completed
    } else {
        TaskState::Failed
    };
    task.finish(terminal);

    if terminal == TaskState::Completed {
        tracing::info!(task_id = task.id().0, url = task.url(), "Download completed");
    } else {
        tracing::warn!(
            task_id = task.id().0,
            url = task.url(),
            exit_code,
            "Download failed"
        );
    }

    event_tx
        .send(Event::TaskTerminal {
            id: task.id(),
            state: terminal,
            diagnostics: task.diagnostics(),
        })
        .ok();

    terminal
}

/// Settle a task as Failed before its process produced any output
fn fail(
    task: &Arc<DownloadTask>,
    event_tx: &broadcast::Sender<Event>,
    diagnostic: String,
) -> TaskState {
    tracing::warn!(task_id = task.id().0, url = task.url(), error = %diagnostic, "Download failed to start");
    task.record_line(diagnostic);
    task.finish(TaskState::Failed);
    event_tx
        .send(Event::TaskTerminal {
            id: task.id(),
            state: TaskState::Failed,
            diagnostics: task.diagnostics(),
        })
        .ok();
    TaskState::Failed
}
