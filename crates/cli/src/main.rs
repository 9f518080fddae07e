mod config;
mod error;
mod prompt;

use std::io;
use std::path::PathBuf;

use bridge::{Bridge, McpConnector, Registry, Toolbox, ToolDescriptor};
use clap::{Parser, Subcommand};
use mcp::Endpoint;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use config::Config;
use error::{Error, Result};
use prompt::{Prompter, collect_arguments, parse_assignment};

const CONFIG_FILE: &str = "toolbridge.toml";
const DEFAULT_LOG_FILTER: &str = "toolbridge=info,bridge=info,mcp=info";

#[derive(Parser)]
#[command(name = "toolbridge")]
#[command(about = "Call remote MCP tools from a synchronous caller", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// SSE endpoint to use instead of the configured server
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tools the server offers
    Tools,
    /// Call a tool through the bridge
    Call {
        /// Tool name
        tool: String,
        /// Arguments as name=value
        args: Vec<String>,
        /// Fail instead of asking for missing parameters
        #[arg(long)]
        no_prompt: bool,
    },
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(url) = cli.url {
        config.server = Endpoint::Sse { url };
    }

    match cli.command {
        Some(Commands::Tools) | None => cmd_tools(&config),
        Some(Commands::Call {
            tool,
            args,
            no_prompt,
        }) => cmd_call(&config, &tool, &args, no_prompt),
    }
}

fn connector(config: &Config) -> McpConnector {
    McpConnector::new(config.server.clone()).with_request_timeout(config.bridge.request_timeout())
}

fn cmd_tools(config: &Config) -> Result<()> {
    println!("Connecting to {}", config.server);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let tools = runtime.block_on(async {
        let mut registry = Registry::connect(&connector(config)).await?;
        let tools = registry.list_tools().await;
        if let Err(e) = registry.close().await {
            tracing::warn!(error = %e, "failed to close registry session");
        }
        tools
    })?;

    if tools.is_empty() {
        println!("No tools found on the server.");
        return Ok(());
    }

    println!("\nAvailable tools ({}):", tools.len());
    for (i, tool) in tools.iter().enumerate() {
        print_tool(i + 1, tool);
    }
    Ok(())
}

fn print_tool(index: usize, tool: &ToolDescriptor) {
    println!("  [{index}] {}", tool.name);
    if !tool.description.is_empty() {
        println!("      {}", tool.description);
    }
    if !tool.schema_declared {
        println!("      (accepts any named arguments)");
    }
    for param in &tool.params {
        let requirement = if param.required { "required" } else { "optional" };
        print!("      {}: {} ({requirement})", param.name, param.kind);
        if param.description.is_empty() {
            println!();
        } else {
            println!(" - {}", param.description);
        }
    }
    println!();
}

fn cmd_call(config: &Config, tool: &str, args: &[String], no_prompt: bool) -> Result<()> {
    let assignments = args
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>>>()?;

    let bridge = Bridge::new(config.bridge.bridge_config());
    bridge.start(connector(config))?;

    let outcome = call_through(&bridge, tool, &assignments, no_prompt);
    let result = settle(outcome, bridge.stop())?;
    println!("{result}");
    Ok(())
}

/// Combine a call's outcome with the bridge shutdown that follows it.
///
/// The call's own error is what the user asked about, so a failed stop only
/// surfaces when the call itself succeeded.
fn settle(outcome: Result<String>, stopped: bridge::Result<()>) -> Result<String> {
    match (outcome, stopped) {
        (Ok(text), stopped) => {
            stopped?;
            Ok(text)
        }
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(stop)) => {
            tracing::warn!(error = %stop, "failed to stop bridge after a failed call");
            Err(e)
        }
    }
}

fn call_through(
    bridge: &Bridge,
    tool: &str,
    assignments: &[(String, String)],
    no_prompt: bool,
) -> Result<String> {
    let toolbox = Toolbox::synthesize(&bridge.list_tools()?, bridge);
    let wrapper = toolbox.get(tool).ok_or_else(|| Error::UnknownTool {
        name: tool.to_string(),
    })?;

    let arguments = if no_prompt {
        collect_arguments(wrapper, assignments, None)?
    } else {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        let mut prompter = Prompter::new(&mut input, &mut output);
        collect_arguments(wrapper, assignments, Some(&mut prompter))?
    };

    let result = wrapper.call(arguments);
    if result.is_error() {
        tracing::warn!(tool, "tool call failed");
    }
    Ok(result.into_text())
}
