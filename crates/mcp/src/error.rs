//! Errors raised while talking to an MCP server.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::JsonRpcError;

#[derive(Debug, Error)]
pub enum Error {
    /// Spawning or talking to a server process failed.
    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The configured endpoint is unusable.
    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request was made before the `initialize` handshake completed.
    #[error("session not initialized")]
    NotInitialized,

    /// The server hung up: stdout reached EOF or the event stream ended.
    #[error("server closed the connection")]
    Closed,

    #[error("{method} got no response within {after:?}")]
    Timeout { method: String, after: Duration },

    #[error("malformed JSON message: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered, but not with the expected shape.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("server returned error {0}")]
    JsonRpc(#[from] JsonRpcError),

    /// `tools/call` succeeded at the protocol level but the tool reported
    /// `isError`.
    #[error("tool reported an error: {0}")]
    ToolCallFailed(String),

    /// The SSE stream carried bytes that do not form valid events.
    #[error("malformed event stream: {0}")]
    EventStream(String),

    #[error("message exceeds the {max} byte limit")]
    OutputTooLarge { max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
