//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The server does not offer the requested tool.
    #[error("unknown tool '{name}'. Run 'toolbridge tools' to list tools")]
    UnknownTool { name: String },

    /// A command-line argument could not be used.
    #[error("invalid argument '{argument}': {reason}")]
    InvalidArgument { argument: String, reason: String },

    /// A required parameter was neither given nor prompted for.
    #[error("missing required parameter '{name}'")]
    MissingArgument { name: String },

    /// An error occurred in the bridge layer.
    #[error(transparent)]
    Bridge(#[from] bridge::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
