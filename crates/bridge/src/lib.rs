//! Dynamic MCP tools for synchronous model runtimes.
//!
//! This crate lets a chat client that dispatches tools through plain,
//! blocking function calls use tools discovered at runtime from a remote
//! MCP service.
//!
//! # Overview
//!
//! - **Registry**: a discovery session listing [`ToolDescriptor`]s.
//! - **ToolWrapper**: a callable synthesized from a descriptor whose
//!   declared parameters match the tool's schema.
//! - **Bridge**: a background worker owning one persistent remote session.
//!   Wrappers submit calls to it and block for the [`CallResult`].
//! - **Toolbox**: the wrappers of a run, advertised to and dispatched by the
//!   model runtime.
//!
//! # Example
//!
//! ```no_run
//! use bridge::{Bridge, BridgeConfig, McpConnector, Toolbox};
//! use mcp::Endpoint;
//! use serde_json::json;
//!
//! # fn example() -> bridge::Result<()> {
//! let bridge = Bridge::new(BridgeConfig::default());
//! bridge.start(McpConnector::new(Endpoint::default()))?;
//!
//! let toolbox = Toolbox::synthesize(&bridge.list_tools()?, &bridge);
//! if let Some(wrapper) = toolbox.get("calculate_inventory") {
//!     let args = json!({ "artikel_a": 3, "artikel_b": 4 });
//!     let result = wrapper.call(args.as_object().cloned().unwrap_or_default());
//!     println!("{result}");
//! }
//!
//! bridge.stop()?;
//! # Ok(())
//! # }
//! ```

mod bridge;
mod descriptor;
mod error;
mod registry;
mod result;
mod session;
mod toolbox;
mod types;
mod wrapper;

pub use bridge::{
    Bridge, BridgeConfig, BridgeState, DEFAULT_CALL_TIMEOUT, DEFAULT_QUEUE_CAPACITY, PendingCall,
};
pub use descriptor::{ParamSpec, ParamType, ToolDescriptor, descriptors_from};
pub use error::{Error, Result};
pub use registry::Registry;
pub use result::{CallResult, ErrorKind};
pub use session::{Connector, McpConnector, Session};
pub use toolbox::Toolbox;
pub use types::{ToolCall, ToolOutcome, ToolResult, ToolSpec};
pub use wrapper::{Param, Signature, ToolWrapper, escape_identifier};
