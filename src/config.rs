//! Configuration types for media-dl
//!
//! Two kinds of configuration live here:
//!
//! - [`Config`] — programmatic settings a host application passes to
//!   [`MediaDownloader::new`](crate::MediaDownloader::new): where the
//!   persisted queue state lives and where the external tools are.
//! - [`QueueConfig`] / [`ModeConfig`] — the small JSON document persisted to
//!   disk (per-mode download folder and URL history), owned by the
//!   [`ConfigStore`]. The store is the single authority for this state:
//!   `load()` once at startup, `get()` for snapshots, `update()` for
//!   mutations, and every mutation rewrites the whole file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::QueueMode;

/// External tool paths (yt-dlp, ffmpeg) and cookie configuration
///
/// Groups settings for the external binaries and the optional cookie jar.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to a Netscape-format cookie file passed to the downloader when it
    /// exists; when absent the builder falls back to browser cookie extraction
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set
    /// (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            cookie_file: None,
            search_path: true,
        }
    }
}

/// Main configuration for [`MediaDownloader`](crate::MediaDownloader)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Path of the persisted queue-state JSON file
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// External tool paths and cookie handling
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            tools: ToolsConfig::default(),
        }
    }
}

fn default_config_path() -> PathBuf {
    PathBuf::from("./media_dl_config.json")
}

fn default_true() -> bool {
    true
}

/// Well-known default download directory
///
/// The platform Downloads folder when it can be determined, "./downloads"
/// otherwise.
pub fn default_download_folder() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("./downloads"))
}

/// A single persisted queue entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedUrl {
    /// The enqueued URL
    pub url: String,
}

/// Persisted state of one queue mode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Default target folder for new downloads in this mode
    pub download_folder: PathBuf,

    /// URLs enqueued into this mode, in insertion order
    #[serde(default)]
    pub downloads: Vec<QueuedUrl>,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            download_folder: default_download_folder(),
            downloads: Vec::new(),
        }
    }
}

/// The full persisted queue configuration (both modes)
///
/// Serialized exactly as:
/// `{"single": {"download_folder": ..., "downloads": [{"url": ...}]},
///   "playlist": {...}}`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Single-video queue state
    #[serde(default)]
    pub single: ModeConfig,

    /// Playlist queue state
    #[serde(default)]
    pub playlist: ModeConfig,
}

impl QueueConfig {
    /// The state of one mode
    pub fn mode(&self, mode: QueueMode) -> &ModeConfig {
        match mode {
            QueueMode::Single => &self.single,
            QueueMode::Playlist => &self.playlist,
        }
    }

    fn mode_mut(&mut self, mode: QueueMode) -> &mut ModeConfig {
        match mode {
            QueueMode::Single => &mut self.single,
            QueueMode::Playlist => &mut self.playlist,
        }
    }
}

/// Owner of the persisted queue configuration
///
/// Cloneable handle; all clones share the same in-memory state and file.
/// Mutations go through [`update`](Self::update), which rewrites the file
/// after applying the mutation, so the on-disk document always reflects the
/// last change.
#[derive(Clone)]
pub struct ConfigStore {
    path: PathBuf,
    state: Arc<RwLock<QueueConfig>>,
}

impl ConfigStore {
    /// Load the persisted configuration from `path`
    ///
    /// Never fails: a missing file yields the default (empty) configuration,
    /// and an unparsable file is replaced with the default after a warning.
    /// Both recoveries leave each mode's folder at the well-known default
    /// download directory.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<QueueConfig>(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Persisted config unparsable, substituting defaults"
                    );
                    QueueConfig::default()
                }
            },
            Err(_) => QueueConfig::default(),
        };

        Self {
            path,
            state: Arc::new(RwLock::new(config)),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of one mode's state
    pub async fn get(&self, mode: QueueMode) -> ModeConfig {
        self.state.read().await.mode(mode).clone()
    }

    /// Snapshot of the whole configuration
    pub async fn snapshot(&self) -> QueueConfig {
        self.state.read().await.clone()
    }

    /// Apply a mutation to one mode's state and persist the result
    ///
    /// The file is fully overwritten on every update.
    ///
    /// # Errors
    ///
    /// Returns an error if the rewritten file cannot be serialized or written.
    pub async fn update<F>(&self, mode: QueueMode, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut ModeConfig),
    {
        let snapshot = {
            let mut state = self.state.write().await;
            mutate(state.mode_mut(mode));
            state.clone()
        };
        self.save(&snapshot).await
    }

    async fn save(&self, config: &QueueConfig) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }
}
