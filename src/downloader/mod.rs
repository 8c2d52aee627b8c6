//! Core downloader implementation split into focused submodules
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Enqueue policies and playlist sequencing
//! - [`task`] - Download task state machine and run loop

mod queue;
pub(crate) mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use task::DownloadTask;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::sync::{Mutex, broadcast};

use crate::command::CommandBuilder;
use crate::config::{Config, ConfigStore};
use crate::process::{ProcessRunner, TokioProcessRunner};
use crate::types::{Event, QueueMode, TaskId};

/// Capacity of the event broadcast channel
///
/// Allows multiple subscribers to receive all events independently; a
/// subscriber lagging by more than this many events observes `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Ordered task list and sequencing state of one queue mode
#[derive(Default)]
pub(crate) struct ModeQueue {
    /// Tasks in insertion order; never reordered, discarded only with the queue
    pub(crate) tasks: Vec<Arc<DownloadTask>>,
    /// Playlist only: index of the next not-yet-started task
    pub(crate) cursor: usize,
    /// Playlist only: whether a task is currently between start and terminal
    pub(crate) active: bool,
}

/// The two independent queues, keyed by mode
pub(crate) struct Queues {
    pub(crate) single: Mutex<ModeQueue>,
    pub(crate) playlist: Mutex<ModeQueue>,
}

impl Queues {
    pub(crate) fn queue(&self, mode: QueueMode) -> &Mutex<ModeQueue> {
        match mode {
            QueueMode::Single => &self.single,
            QueueMode::Playlist => &self.playlist,
        }
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the configuration store, the command builder, the process runner and
/// both queues. Consumers enqueue requests and subscribe to [`Event`]s; all
/// heavy lifting happens on spawned tokio tasks, so no method here blocks on
/// a child process.
#[derive(Clone)]
pub struct MediaDownloader {
    /// Persisted queue configuration (folders + URL history)
    pub(crate) store: ConfigStore,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Invocation construction with resolved tool paths
    pub(crate) builder: Arc<CommandBuilder>,
    /// Child-process launcher (trait object for pluggable implementations)
    pub(crate) runner: Arc<dyn ProcessRunner>,
    /// Per-mode task lists and sequencing state
    pub(crate) queues: Arc<Queues>,
    /// Next task ID
    pub(crate) next_task_id: Arc<AtomicU64>,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// Loads the persisted queue configuration (substituting defaults when
    /// the file is missing or unparsable), resolves the external tool paths,
    /// and sets up the event broadcast channel. Infallible: problems that
    /// can only surface later — an unlaunchable downloader binary, an
    /// unwritable folder — surface on the affected task run, not here.
    pub async fn new(config: Config) -> Self {
        Self::with_runner(config, Arc::new(TokioProcessRunner)).await
    }

    /// Create an instance with a custom [`ProcessRunner`]
    ///
    /// The runner seam exists for embedding scenarios and tests that need to
    /// observe or script the launched processes.
    pub async fn with_runner(config: Config, runner: Arc<dyn ProcessRunner>) -> Self {
        let store = ConfigStore::load(&config.config_path).await;
        let builder = Arc::new(CommandBuilder::from_tools(&config.tools));

        tracing::info!(
            config_path = %store.path().display(),
            ytdlp = %builder.ytdlp_path().display(),
            ffmpeg = %builder.ffmpeg_path().display(),
            "Media downloader initialized"
        );

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            store,
            event_tx,
            builder,
            runner,
            queues: Arc::new(Queues {
                single: Mutex::new(ModeQueue::default()),
                playlist: Mutex::new(ModeQueue::default()),
            }),
            next_task_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to download events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently and in emission order. The receiver is safe to move to
    /// any execution context, including a UI thread's marshaling shim.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Snapshot of one queue's tasks, in insertion order
    ///
    /// The returned handles stay live; their state/progress getters reflect
    /// the run loops as they progress (eventually consistent).
    pub async fn tasks(&self, mode: QueueMode) -> Vec<Arc<DownloadTask>> {
        self.queues.queue(mode).lock().await.tasks.clone()
    }

    /// Look up a task by ID across both queues
    pub async fn task(&self, id: TaskId) -> Option<Arc<DownloadTask>> {
        for mode in [QueueMode::Single, QueueMode::Playlist] {
            let queue = self.queues.queue(mode).lock().await;
            if let Some(task) = queue.tasks.iter().find(|t| t.id() == id) {
                return Some(task.clone());
            }
        }
        None
    }

    /// The configuration store backing this instance
    pub fn config_store(&self) -> &ConfigStore {
        &self.store
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// downloads proceed whether or not anyone is listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
