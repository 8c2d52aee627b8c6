//! Queue sequencing — enqueue policies and playlist cursor advancement
//!
//! Two independent queues exist, one per [`QueueMode`]. Single-mode tasks
//! start the moment they are enqueued and run concurrently with no ordering
//! between them. Playlist-mode tasks start strictly one at a time in
//! insertion order; the sequencer's cursor only advances when the running
//! task reaches a terminal state, and a Failed task advances it just like a
//! Completed one.
//!
//! The sequencer is the single writer of the task lists and the cursor; the
//! UI reads snapshots through [`MediaDownloader::tasks`] and the task
//! getters.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::MediaDownloader;
use super::task::{DownloadTask, TaskRunContext, run_download_task};
use crate::config::QueuedUrl;
use crate::error::Result;
use crate::types::{DownloadRequest, Event, QueueMode, TaskId};

impl MediaDownloader {
    /// Enqueue a request into the given queue, using the queue's current
    /// default target folder
    ///
    /// The task is appended to the queue's ordered list, the updated queue
    /// state is persisted, and the mode's start policy is applied: single
    /// tasks start immediately, playlist tasks start when the cursor
    /// reaches them.
    ///
    /// # Errors
    ///
    /// Returns an error when the updated queue state cannot be persisted;
    /// nothing is enqueued in that case.
    pub async fn enqueue(&self, mode: QueueMode, request: DownloadRequest) -> Result<TaskId> {
        self.enqueue_with_folder(mode, request, None).await
    }

    /// Enqueue a request, optionally overriding the queue's target folder
    ///
    /// An override becomes the queue's new persisted default, matching the
    /// folder field a UI shows next to its add button.
    pub async fn enqueue_with_folder(
        &self,
        mode: QueueMode,
        request: DownloadRequest,
        folder: Option<PathBuf>,
    ) -> Result<TaskId> {
        let id = TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed));
        let url = request.url.clone();

        // Persist the folder override and the new entry before the task can
        // produce any observable effect
        self.store
            .update(mode, |state| {
                if let Some(folder) = folder {
                    state.download_folder = folder;
                }
                state.downloads.push(QueuedUrl { url: url.clone() });
            })
            .await?;

        let task = Arc::new(DownloadTask::new(id, request, mode));
        {
            let mut queue = self.queues.queue(mode).lock().await;
            queue.tasks.push(task.clone());
        }

        tracing::info!(task_id = id.0, %mode, url = task.url(), "Task enqueued");
        self.emit_event(Event::TaskQueued {
            id,
            mode,
            url: task.url().to_string(),
        });

        match mode {
            QueueMode::Single => {
                let target_folder = self.store.get(mode).await.download_folder;
                self.spawn_task_run(task, target_folder);
            }
            QueueMode::Playlist => {
                self.start_playlist_cursor().await;
            }
        }

        Ok(id)
    }

    /// Change a queue's default target folder and persist it
    pub async fn set_download_folder(&self, mode: QueueMode, folder: PathBuf) -> Result<()> {
        self.store
            .update(mode, |state| {
                state.download_folder = folder;
            })
            .await
    }

    /// A queue's current default target folder
    pub async fn download_folder(&self, mode: QueueMode) -> PathBuf {
        self.store.get(mode).await.download_folder
    }

    /// Start the playlist task under the cursor, if the queue is idle and
    /// the cursor is in range
    ///
    /// Called on enqueue and after each terminal state. The in-range check
    /// is what lets the sequencer resume when a task is appended after the
    /// cursor previously ran off the end of the queue.
    async fn start_playlist_cursor(&self) {
        let target_folder = self.store.get(QueueMode::Playlist).await.download_folder;

        let next = {
            let mut queue = self.queues.playlist.lock().await;
            if queue.active || queue.cursor >= queue.tasks.len() {
                None
            } else {
                let task = queue.tasks[queue.cursor].clone();
                task.set_playlist_position(queue.cursor + 1, queue.tasks.len());
                queue.active = true;
                Some(task)
            }
        };

        if let Some(task) = next {
            tracing::debug!(
                task_id = task.id().0,
                position = ?task.playlist_position(),
                "Starting next playlist task"
            );
            self.spawn_task_run(task, target_folder);
        }
    }

    /// Advance the playlist cursor past a terminal task and start the next
    /// one, if any
    ///
    /// Failure does not halt the sequence: a Failed task advances the cursor
    /// exactly like a Completed one.
    pub(crate) async fn advance_playlist(&self) {
        {
            let mut queue = self.queues.playlist.lock().await;
            queue.cursor += 1;
            queue.active = false;
        }
        self.start_playlist_cursor().await;
    }

    /// Spawn the dedicated execution task for one download run
    ///
    /// Playlist runs chain into the cursor advance when they settle; single
    /// runs are fire-and-forget.
    fn spawn_task_run(&self, task: Arc<DownloadTask>, target_folder: PathBuf) {
        let ctx = TaskRunContext {
            task: task.clone(),
            builder: self.builder.clone(),
            runner: self.runner.clone(),
            event_tx: self.event_tx.clone(),
            target_folder,
        };
        let downloader = self.clone();
        let mode = task.queue_mode();

        tokio::spawn(async move {
            let _terminal = run_download_task(ctx).await;
            if mode == QueueMode::Playlist {
                downloader.advance_playlist().await;
            }
        });
    }
}
