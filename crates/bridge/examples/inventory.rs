//! Call a remote inventory tool through the bridge.
//!
//! Expects an MCP server exposing `calculate_inventory` over SSE.
//!
//! Run with: cargo run -p bridge --example inventory [sse-url]

use bridge::{Bridge, BridgeConfig, McpConnector, Toolbox};
use mcp::{DEFAULT_SSE_URL, Endpoint};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bridge=debug")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SSE_URL.to_string());
    let endpoint = Endpoint::Sse { url };
    println!("Connecting to {endpoint}");

    let bridge = Bridge::new(BridgeConfig::default());
    bridge.start(McpConnector::new(endpoint))?;

    let descriptors = bridge.list_tools()?;
    println!("\nDiscovered {} tools:", descriptors.len());
    for descriptor in &descriptors {
        println!("  - {}", descriptor.name);
        for param in &descriptor.params {
            println!("      {}: {}", param.name, param.kind);
        }
    }

    let toolbox = Toolbox::synthesize(&descriptors, &bridge);
    match toolbox.get("calculate_inventory") {
        Some(wrapper) => {
            let result = wrapper.call_positional(vec![json!(3), json!(4)]);
            println!("\ncalculate_inventory(artikel_a=3, artikel_b=4) = {result}");
        }
        None => println!("\nServer does not offer calculate_inventory"),
    }

    bridge.stop()?;
    println!("\nDone!");
    Ok(())
}
