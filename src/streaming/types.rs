// Common types for the streaming module

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur during streaming operations
///
/// `DuplicateStream`, `UnknownStream`, `InvalidConfig` and `Runtime` are
/// returned to the caller of the registry. The remaining variants only occur
/// inside a running worker, where they are logged and counted.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Stream already registered: {0}")]
    DuplicateStream(String),

    #[error("Stream not found: {0}")]
    UnknownStream(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Callback error: {0}")]
    Callback(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Runtime unavailable: {0}")]
    Runtime(String),
}

impl StreamError {
    /// Whether the error ends a socket worker's run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::Transport(_))
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Decode(e.to_string())
    }
}

/// Lifecycle state of a registered stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Registered but never started
    #[default]
    Registered,

    /// A worker is ingesting into the buffer
    Running,

    /// Stopped by request or by a fatal transport error
    Stopped,
}

impl StreamState {
    pub fn is_running(&self) -> bool {
        matches!(self, StreamState::Running)
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StreamState::Registered => "registered",
            StreamState::Running => "running",
            StreamState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Statistics about a stream, cumulative across restarts
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamStats {
    pub state: StreamState,
    pub total_ingested: u64,
    pub total_drained: u64,
    pub total_dropped: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
    pub callback_errors: u64,
    pub read_timeouts: u64,
    pub current_buffer_size: usize,
    pub peak_buffer_size: usize,
    pub capacity: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}
