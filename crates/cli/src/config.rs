//! Configuration loading from toolbridge.toml.

use std::path::Path;
use std::time::Duration;

use bridge::{BridgeConfig, DEFAULT_CALL_TIMEOUT, DEFAULT_QUEUE_CAPACITY};
use mcp::Endpoint;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// How to reach the MCP server.
    #[serde(default)]
    pub server: Endpoint,

    /// Call bridge settings.
    #[serde(default)]
    pub bridge: BridgeSection,
}

/// The `[bridge]` section.
#[derive(Debug, Deserialize)]
pub struct BridgeSection {
    /// Seconds a caller waits for a tool result.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Calls that may wait for the worker at once.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds the worker waits for a single MCP response.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            queue_capacity: default_queue_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BridgeSection {
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT.as_secs()
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_request_timeout_secs() -> u64 {
    mcp::DEFAULT_TIMEOUT.as_secs()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load from `path`, or fall back to defaults if it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "bridge.call_timeout_secs must be at least 1".into(),
            ));
        }
        if self.bridge.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "bridge.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.bridge.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "bridge.queue_capacity must be at least 1".into(),
            ));
        }
        match &self.server {
            Endpoint::Stdio { command, .. } if command.trim().is_empty() => {
                Err(ConfigError::Invalid("server.command is empty".into()))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server, Endpoint::default());
        assert_eq!(config.bridge.call_timeout_secs, 30);
        assert_eq!(config.bridge.queue_capacity, 64);
        assert_eq!(config.bridge.request_timeout(), mcp::DEFAULT_TIMEOUT);
    }

    #[test]
    fn parses_sse_server() {
        let config = Config::parse(
            r#"
            [server]
            transport = "sse"
            url = "http://lager.local:8000/sse"

            [bridge]
            call_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(
            config.server,
            Endpoint::Sse {
                url: "http://lager.local:8000/sse".to_string()
            }
        );
        let bridge = config.bridge.bridge_config();
        assert_eq!(bridge.call_timeout, Duration::from_secs(5));
        assert_eq!(bridge.queue_capacity, 64);
    }

    #[test]
    fn parses_stdio_server() {
        let config = Config::parse(
            r#"
            [server]
            transport = "stdio"
            command = "python"
            args = ["mcp_server.py"]
            env = { LAGER = "berlin" }
            "#,
        )
        .unwrap();

        match config.server {
            Endpoint::Stdio { command, args, env } => {
                assert_eq!(command, "python");
                assert_eq!(args, ["mcp_server.py"]);
                assert_eq!(env.get("LAGER").map(String::as_str), Some("berlin"));
            }
            other => panic!("expected stdio, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_transport() {
        let err = Config::parse("[server]\ntransport = \"carrier-pigeon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = Config::parse("[bridge]\ncall_timeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::parse("[bridge]\nrequest_timeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("request_timeout_secs")));
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = Config::load_or_default("/nonexistent/toolbridge.toml").unwrap();
        assert_eq!(config.server, Endpoint::default());
    }
}
