//! MCP (Model Context Protocol) client library.
//!
//! This crate provides a client for talking to MCP tool servers, either over
//! a spawned process's stdio or over the HTTP+SSE transport.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Client, Endpoint};
//!
//! # async fn example() -> mcp::Result<()> {
//! let endpoint = Endpoint::Sse {
//!     url: "http://127.0.0.1:8000/sse".to_string(),
//! };
//!
//! let mut client = Client::connect(&endpoint, mcp::DEFAULT_TIMEOUT).await?;
//!
//! for tool in client.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let arguments = serde_json::json!({ "artikel_a": 3, "artikel_b": 4 });
//! let result = client
//!     .call_tool("calculate_inventory", arguments.as_object().cloned())
//!     .await?;
//! println!("{}", result.text());
//!
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod protocol;
mod transport;

pub use client::{Client, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcRequest, ListToolsResult, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use transport::{
    DEFAULT_SSE_URL, Endpoint, LineTransport, MAX_OUTPUT_SIZE, SseTransport, Transport,
};
