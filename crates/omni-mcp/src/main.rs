//! OmniContext MCP Server binary.
//!
//! Exposes code intelligence tools to AI coding agents via the
//! Model Context Protocol (MCP) over the stdio transport.

use anyhow::Result;
use clap::Parser;

/// OmniContext MCP Server
#[derive(Parser, Debug)]
#[command(name = "omnicontext-mcp", version, about)]
struct Args {
    /// Path to the repository to index.
    #[arg(long, default_value = ".")]
    repo: String,

    /// Transport protocol to use. Only `stdio` is implemented; HTTP/SSE
    /// transports are editor-glue concerns outside this binary.
    #[arg(long, default_value = "stdio", value_parser = ["stdio"])]
    transport: String,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Only protocol frames go to stdout; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .with_writer(std::io::stderr)
        .init();

    let repo_path = std::path::Path::new(&args.repo)
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("invalid path: {}: {e}", args.repo))?;

    tracing::info!(repo = %repo_path.display(), transport = %args.transport, "OmniContext MCP server starting");

    omni_mcp::run_stdio(&repo_path)
}
