//! Error types for the server checker.

use std::time::Duration;

/// Result type for checker operations.
pub type CheckResult<T> = Result<T, CheckError>;

/// Errors that can occur while talking to the MCP server.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The server executable does not exist.
    #[error("Server executable '{0}' not found")]
    ServerNotFound(String),

    /// The server process could not be started.
    #[error("Failed to start server: {0}")]
    Spawn(#[source] std::io::Error),

    /// The server did not answer in time.
    #[error("Timed out after {0:?} waiting for the server")]
    Timeout(Duration),

    /// Reading from or writing to the server failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server closed its end of the stream.
    #[error("Server closed the connection")]
    Closed,

    /// The server answered with a JSON-RPC error.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// The server sent something that is not valid MCP.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tokio_util::codec::LinesCodecError> for CheckError {
    fn from(e: tokio_util::codec::LinesCodecError) -> Self {
        Self::Transport(e.to_string())
    }
}
