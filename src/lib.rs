//! # media-dl
//!
//! Backend library for media download applications built on yt-dlp.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Queue-oriented** - Two independent queues with distinct start policies
//! - **Sensible defaults** - Works out of the box with zero configuration
//!
//! The single queue fires each task off the moment it is enqueued and lets
//! them run concurrently. The playlist queue runs its tasks strictly one at a
//! time, in insertion order, and keeps going past failures.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, DownloadRequest, MediaDownloader, QueueMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     downloader
//!         .enqueue(
//!             QueueMode::Single,
//!             DownloadRequest::audio("https://youtube.com/watch?v=...", "mp3"),
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Downloader invocation construction
pub mod command;
/// Configuration types and the persisted queue store
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Child process supervision
pub mod process;
/// Progress line parsing
pub mod progress;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use command::{BROWSER_PRIORITY, CommandBuilder, Invocation};
pub use config::{
    Config, ConfigStore, ModeConfig, QueueConfig, QueuedUrl, ToolsConfig, default_download_folder,
};
pub use downloader::{DownloadTask, MediaDownloader};
pub use error::{Error, Result, TaskError};
pub use process::{ProcessHandle, ProcessRunner, TokioProcessRunner};
pub use progress::parse_percent;
pub use types::{
    DownloadRequest, Event, MediaMode, ProgressEvent, Quality, QueueMode, TaskId, TaskState,
};
