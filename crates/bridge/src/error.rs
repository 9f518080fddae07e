use std::time::Duration;

use thiserror::Error;

/// Errors surfaced to the owner of a bridge or registry session.
///
/// Tool call outcomes are never reported through this type; see
/// [`CallResult`](crate::CallResult).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The remote service could not be reached or the handshake failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The bridge is in the wrong lifecycle state for the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A request could not be handed to the worker.
    #[error("schedule error: {0}")]
    Schedule(String),

    /// The worker did not answer within the configured window.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Remote(#[from] mcp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
