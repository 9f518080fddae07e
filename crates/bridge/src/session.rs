//! Remote session seam.
//!
//! The bridge and the registry only need three things from a remote tool
//! service: list tools, call a tool, and hang up. [`McpConnector`] provides
//! them over a real MCP session; tests plug in scripted sessions.

use std::future::Future;
use std::time::Duration;

use mcp::{CallToolResult, Client, Endpoint, Tool};
use serde_json::{Map, Value};

/// A live session with a remote tool service.
pub trait Session: Send {
    /// List the tools the service currently offers.
    fn list_tools(&mut self) -> impl Future<Output = mcp::Result<Vec<Tool>>> + Send;

    /// Call one tool with named arguments.
    fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = mcp::Result<CallToolResult>> + Send;

    /// End the session.
    fn close(self) -> impl Future<Output = mcp::Result<()>> + Send;
}

/// Opens sessions with a remote tool service.
pub trait Connector: Send + 'static {
    type Session: Session + 'static;

    fn connect(&self) -> impl Future<Output = mcp::Result<Self::Session>> + Send;
}

/// Connects to an MCP server at a fixed endpoint.
#[derive(Debug, Clone)]
pub struct McpConnector {
    endpoint: Endpoint,
    request_timeout: Duration,
}

impl McpConnector {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            request_timeout: mcp::DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request protocol timeout.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Connector for McpConnector {
    type Session = Client;

    async fn connect(&self) -> mcp::Result<Client> {
        Client::connect(&self.endpoint, self.request_timeout).await
    }
}

impl Session for Client {
    async fn list_tools(&mut self) -> mcp::Result<Vec<Tool>> {
        Client::list_tools(self).await
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> mcp::Result<CallToolResult> {
        Client::call_tool(self, name, Some(arguments)).await
    }

    async fn close(self) -> mcp::Result<()> {
        self.shutdown().await
    }
}
