//! Shared helpers for downloader tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::command::Invocation;
use crate::config::{Config, ToolsConfig};
use crate::downloader::MediaDownloader;
use crate::error::{Error, Result};
use crate::process::{ProcessHandle, ProcessRunner};
use crate::types::{Event, QueueMode, TaskId, TaskState};

/// Scripted behavior for one URL's fake process
#[derive(Clone)]
pub(crate) struct Script {
    /// Lines to emit on the combined output stream
    pub(crate) lines: Vec<String>,
    /// Exit code to report after the stream ends
    pub(crate) exit_code: i32,
    /// How long the fake process stays alive after its last line, so tests
    /// can observe overlap (or the absence of it)
    pub(crate) hold: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            exit_code: 0,
            hold: Duration::from_millis(10),
        }
    }
}

/// Fake [`ProcessRunner`] driven by per-URL scripts
///
/// Records every spawned invocation in order and tracks the high-water mark
/// of concurrently-alive fake processes, which is how the sequencing
/// invariants are asserted.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    scripts: Mutex<HashMap<String, Script>>,
    /// Every invocation passed to spawn, in call order
    pub(crate) spawned: Mutex<Vec<Invocation>>,
    active: Arc<AtomicUsize>,
    /// Highest number of fake processes alive at once
    max_active: Arc<AtomicUsize>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the script to play when `url` is spawned
    pub(crate) fn script(&self, url: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), script);
    }

    /// URLs in the order their processes were spawned
    pub(crate) fn spawn_order(&self) -> Vec<String> {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .filter_map(|inv| inv.args.last().cloned())
            .collect()
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn spawn(&self, invocation: &Invocation) -> Result<ProcessHandle> {
        let url = invocation.args.last().cloned().unwrap_or_default();
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_default();

        self.spawned.lock().unwrap().push(invocation.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let (line_tx, line_rx) = mpsc::channel(script.lines.len().max(1));
        let (exit_tx, exit_rx) = oneshot::channel();
        let active = self.active.clone();

        tokio::spawn(async move {
            for line in script.lines {
                if line_tx.send(line).await.is_err() {
                    break;
                }
            }
            drop(line_tx);
            tokio::time::sleep(script.hold).await;
            active.fetch_sub(1, Ordering::SeqCst);
            exit_tx.send(script.exit_code).ok();
        });

        Ok(ProcessHandle::from_parts(line_rx, exit_rx))
    }
}

/// [`ProcessRunner`] whose spawn always fails, as if the binary is missing
pub(crate) struct FailingRunner;

#[async_trait]
impl ProcessRunner for FailingRunner {
    async fn spawn(&self, invocation: &Invocation) -> Result<ProcessHandle> {
        Err(Error::Launch {
            program: invocation.program.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary"),
        })
    }
}

/// Downloader wired to the given runner, on a fresh tempdir
///
/// Both queues' download folders point inside the tempdir so tests never
/// touch the real user Downloads directory.
pub(crate) async fn create_test_downloader_with(
    runner: Arc<dyn ProcessRunner>,
) -> (MediaDownloader, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        config_path: dir.path().join("config.json"),
        tools: ToolsConfig {
            ytdlp_path: Some("yt-dlp".into()),
            ffmpeg_path: Some("ffmpeg".into()),
            cookie_file: None,
            search_path: false,
        },
    };

    let downloader = MediaDownloader::with_runner(config, runner).await;
    for mode in [QueueMode::Single, QueueMode::Playlist] {
        downloader
            .set_download_folder(mode, dir.path().join("dl"))
            .await
            .unwrap();
    }
    (downloader, dir)
}

/// Downloader backed by a [`ScriptedRunner`]
pub(crate) async fn create_test_downloader()
-> (MediaDownloader, Arc<ScriptedRunner>, tempfile::TempDir) {
    let runner = ScriptedRunner::new();
    let (downloader, dir) = create_test_downloader_with(runner.clone()).await;
    (downloader, runner, dir)
}

/// Collect terminal events until `count` tasks have settled
pub(crate) async fn wait_for_terminals(
    rx: &mut broadcast::Receiver<Event>,
    count: usize,
) -> Vec<(TaskId, TaskState, Vec<String>)> {
    let mut terminals = Vec::new();
    while terminals.len() < count {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for terminal event")
            .expect("event channel closed");
        if let Event::TaskTerminal {
            id,
            state,
            diagnostics,
        } = event
        {
            terminals.push((id, state, diagnostics));
        }
    }
    terminals
}
