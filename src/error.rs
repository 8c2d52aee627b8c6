//! Error types for media-dl
//!
//! This module provides the error handling surface for the library:
//! - A top-level [`Error`] enum with contextual variants
//! - A [`TaskError`] sub-enum for task lifecycle violations
//! - The crate-wide [`Result`] alias
//!
//! The taxonomy deliberately keeps recoverable conditions out of the error
//! path: an unparsable persisted config is substituted with defaults, and a
//! malformed progress line is simply not a progress line. Only conditions a
//! caller can act on become `Error` values.

use thiserror::Error;

use crate::types::TaskId;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Child process could not be spawned (missing binary, permission denied)
    ///
    /// Fatal to the task run that attempted the launch; never propagates to
    /// sibling tasks or the queue sequencer.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// The executable that failed to launch
        program: String,
        /// The OS-level cause
        #[source]
        source: std::io::Error,
    },

    /// Task lifecycle error
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Task lifecycle errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// Cannot perform operation in current state
    ///
    /// Task states move forward only (Idle → Running → terminal); starting a
    /// task that already ran is rejected rather than silently restarted.
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: TaskId,
        /// The operation that was attempted (e.g., "start")
        operation: String,
        /// The current state that prevents the operation (e.g., "running")
        current_state: String,
    },
}
