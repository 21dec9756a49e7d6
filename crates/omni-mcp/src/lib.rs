//! OmniContext MCP server library.
//!
//! Exposes [`tools::OmniContextServer`], the `#[tool_router]`-annotated MCP
//! surface over a single project's `omni-core::Engine`, plus [`run_stdio`]
//! to start it on the stdio transport: length-delimited JSON on stdin/stdout,
//! nothing else written to stdout, diagnostics to stderr only.

pub mod tools;

use std::path::Path;

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};

use omni_core::{Config, Engine};
use tools::OmniContextServer;

/// Build an `Engine` for `repo_path`, auto-indexing if nothing has been
/// indexed yet, and serve it over stdio until the client disconnects.
///
/// Never writes anything but MCP frames to stdout -- all diagnostics go to
/// stderr via `tracing`.
pub fn run_stdio(repo_path: &Path) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("build tokio runtime")?;
    rt.block_on(run_stdio_async(repo_path))
}

async fn run_stdio_async(repo_path: &Path) -> Result<()> {
    let config = Config::load(repo_path).context("load configuration")?;
    omni_core::pipeline::register_project_async(&config)
        .await
        .context("register project")?;
    let mut engine = Engine::with_config(config).await.context("initialize engine")?;

    let status = engine.status().await.context("read engine status")?;
    if status.files_indexed == 0 {
        tracing::info!(repo = %repo_path.display(), "no existing index, running initial index");
        engine.run_index().await.context("initial index")?;
    }

    let server = OmniContextServer::new(engine);
    let service = server.serve(stdio()).await.context("start MCP stdio transport")?;
    service.waiting().await.context("MCP service loop")?;
    Ok(())
}
