//! Core types for media-dl

use serde::{Deserialize, Serialize};

/// Unique identifier for a download task
///
/// IDs are process-local and monotonically increasing; they are assigned by
/// the queue sequencer when a task is enqueued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queue mode — which of the two independent queues a task belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Independent tasks, started immediately and run concurrently
    Single,
    /// Strictly sequential tasks, started one at a time in insertion order
    Playlist,
}

impl QueueMode {
    /// String form used in the persisted configuration ("single" / "playlist")
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueMode::Single => "single",
            QueueMode::Playlist => "playlist",
        }
    }
}

impl std::fmt::Display for QueueMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a request downloads an audio-only extraction or a muxed video
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaMode {
    /// Best available audio-only stream, extracted into the requested codec
    Audio,
    /// Combined video+audio stream, muxed into the requested container
    Video,
}

impl MediaMode {
    /// Container formats a UI should offer for this mode
    ///
    /// The first entry is the conventional default.
    pub fn containers(&self) -> &'static [&'static str] {
        match self {
            MediaMode::Audio => &["mp3", "m4a", "wav", "aac"],
            MediaMode::Video => &["mp4", "mkv", "webm"],
        }
    }

    /// Default container format for this mode
    pub fn default_container(&self) -> &'static str {
        self.containers()[0]
    }

    /// Subfolder name under the queue's download folder ("Audio" / "Video")
    pub fn subfolder(&self) -> &'static str {
        match self {
            MediaMode::Audio => "Audio",
            MediaMode::Video => "Video",
        }
    }
}

/// Video quality tier — a maximum-height ceiling on the selected stream
///
/// Only meaningful for [`MediaMode::Video`] requests; audio requests ignore it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Quality {
    /// Up to 360p
    #[serde(rename = "360p")]
    P360,
    /// Up to 480p
    #[serde(rename = "480p")]
    P480,
    /// Up to 720p
    #[serde(rename = "720p")]
    P720,
    /// Up to 1080p
    #[serde(rename = "1080p")]
    P1080,
    /// No height ceiling — best available
    #[default]
    #[serde(rename = "Highest")]
    Highest,
}

impl Quality {
    /// All tiers in ascending order, for UI pickers
    pub const ALL: [Quality; 5] = [
        Quality::P360,
        Quality::P480,
        Quality::P720,
        Quality::P1080,
        Quality::Highest,
    ];

    /// Maximum stream height in pixels, or None for [`Quality::Highest`]
    pub fn height_ceiling(&self) -> Option<u32> {
        match self {
            Quality::P360 => Some(360),
            Quality::P480 => Some(480),
            Quality::P720 => Some(720),
            Quality::P1080 => Some(1080),
            Quality::Highest => None,
        }
    }

    /// Label form used in persisted settings and UIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::Highest => "Highest",
        }
    }

    /// Parse a quality label; anything unrecognized falls back to Highest
    /// so a stale or hand-edited setting can never fail a download.
    fn from_label(label: &str) -> Self {
        match label {
            "360p" => Quality::P360,
            "480p" => Quality::P480,
            "720p" => Quality::P720,
            "1080p" => Quality::P1080,
            _ => Quality::Highest,
        }
    }
}

impl std::str::FromStr for Quality {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Quality::from_label(s))
    }
}

// Hand-written so both parse paths share the Highest fallback; a derived
// impl would reject labels the rest of the crate tolerates.
impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Quality::from_label(&label))
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queued URL's download parameters
///
/// Immutable once the task starts; a retry is a fresh request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Source URL, passed through verbatim to the downloader binary
    pub url: String,
    /// Audio extraction or muxed video
    pub mode: MediaMode,
    /// Target container/codec (e.g., "mp3", "mp4")
    pub container: String,
    /// Video quality ceiling (ignored for audio requests)
    #[serde(default)]
    pub quality: Quality,
}

impl DownloadRequest {
    /// Audio request with the given container/codec
    pub fn audio(url: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: MediaMode::Audio,
            container: container.into(),
            quality: Quality::Highest,
        }
    }

    /// Video request with the given container and quality ceiling
    pub fn video(url: impl Into<String>, container: impl Into<String>, quality: Quality) -> Self {
        Self {
            url: url.into(),
            mode: MediaMode::Video,
            container: container.into(),
            quality,
        }
    }
}

/// Task lifecycle state
///
/// Transitions are monotonic: Idle → Running → {Completed, Failed}.
/// Completed and Failed are terminal; a new run requires a new task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Created and waiting to start
    Idle,
    /// Child process running
    Running,
    /// Child process exited with code 0
    Completed,
    /// Launch failed or child process exited nonzero
    Failed,
}

impl TaskState {
    /// Whether this state is terminal (Completed or Failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Idle => "idle",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Structured percentage-complete signal derived from one output line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Progress percentage (0.0 to 100.0)
    pub percent: f32,
    /// The raw output line the percentage was parsed from
    pub raw_line: String,
    /// 1-based (position, total) within the playlist queue, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_position: Option<(usize, usize)>,
}

/// Event emitted during the task lifecycle
///
/// Consumers subscribe via [`MediaDownloader::subscribe`](crate::MediaDownloader::subscribe);
/// events are safe to receive from any execution context, so a UI layer can
/// marshal them onto its main loop however its toolkit requires.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task created and appended to a queue
    TaskQueued {
        /// Task ID
        id: TaskId,
        /// Queue the task was appended to
        mode: QueueMode,
        /// Source URL
        url: String,
    },

    /// Task progress update (last-write-wins; no history is buffered)
    Progress {
        /// Task ID
        id: TaskId,
        /// The parsed progress event
        progress: ProgressEvent,
    },

    /// Task reached a terminal state
    TaskTerminal {
        /// Task ID
        id: TaskId,
        /// Completed or Failed
        state: TaskState,
        /// Full accumulated output of the child process, verbatim.
        /// On failure this is the only diagnostic surface for the
        /// underlying tool's errors — it is never swallowed.
        diagnostics: Vec<String>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_deserialize_matches_from_str() {
        for label in ["360p", "480p", "720p", "1080p", "Highest", "4k", ""] {
            let json = format!("\"{}\"", label);
            let deserialized: Quality = serde_json::from_str(&json).unwrap();
            let parsed: Quality = label.parse().unwrap();
            assert_eq!(deserialized, parsed, "parse paths diverged on {:?}", label);
        }
    }

    #[test]
    fn test_quality_unknown_label_deserializes_to_highest() {
        let q: Quality = serde_json::from_str("\"4320p-ultra\"").unwrap();
        assert_eq!(q, Quality::Highest);
    }

    #[test]
    fn test_quality_serialize_round_trips_labels() {
        for quality in Quality::ALL {
            let json = serde_json::to_string(&quality).unwrap();
            assert_eq!(json, format!("\"{}\"", quality.as_str()));
            let back: Quality = serde_json::from_str(&json).unwrap();
            assert_eq!(back, quality);
        }
    }
}
