//! OmniContext CLI.
//!
//! Command-line interface for indexing, searching, and managing
//! OmniContext indexes. Thin glue over `omni-core::Engine` -- every
//! command here corresponds 1:1 to a Tool API operation; the interesting
//! work happens in the library.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use omni_core::config::{Config, ProjectMarker};
use omni_core::types::{Language, SearchKind, SearchQuery};
use omni_core::Engine;

/// OmniContext - Universal Code Context Engine
#[derive(Parser, Debug)]
#[command(name = "omnicontext", version, about = "Universal code context engine for AI coding agents")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Log level.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index a repository.
    Index {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: String,

        /// Force full reindex, ignoring cached state.
        #[arg(long)]
        force: bool,

        /// Reissue the project id even if a marker is already present
        /// (reconciles a registry/marker inconsistency).
        #[arg(long = "new-config")]
        new_config: bool,
    },

    /// Search the indexed codebase.
    Search {
        /// Search query (natural language or keywords).
        query: String,

        /// Path to the repository root.
        #[arg(long, default_value = ".")]
        repo: String,

        /// Maximum number of results.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Filter by programming language.
        #[arg(long)]
        language: Option<String>,

        /// Retrieval branches to run: hybrid, fts, vector, or graph.
        #[arg(long, default_value = "hybrid")]
        kind: String,
    },

    /// Show engine status and index statistics.
    Status {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: String,
    },

    /// Start the MCP server for AI agent integration.
    Mcp {
        /// Path to the repository root.
        #[arg(long, default_value = ".")]
        repo: String,

        /// Transport protocol.
        #[arg(long, default_value = "stdio", value_parser = ["stdio"])]
        transport: String,
    },

    /// Manage configuration.
    Config {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: String,

        /// Show current effective configuration.
        #[arg(long)]
        show: bool,

        /// Initialize a .omnicontext/config.toml in the current directory.
        #[arg(long)]
        init: bool,
    },

    /// List every project registered on this machine.
    Projects {
        /// Path to any project, used only to resolve the shared data root.
        #[arg(long, default_value = ".")]
        path: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    // `cmd_mcp` builds its own runtime (it's also the entry point used when
    // a client spawns this binary directly), so it must run outside of one.
    if let Commands::Mcp { repo, transport } = &cli.command {
        return cmd_mcp(repo, transport);
    }

    let rt = tokio::runtime::Runtime::new().context("build tokio runtime")?;
    rt.block_on(async move {
        match cli.command {
            Commands::Index { path, force, new_config } => cmd_index(&path, force, new_config).await,
            Commands::Search { query, repo, limit, language, kind } => {
                cmd_search(&repo, &query, limit, language.as_deref(), &kind).await
            }
            Commands::Status { path } => cmd_status(&path).await,
            Commands::Mcp { .. } => unreachable!("handled above"),
            Commands::Config { path, show, init } => cmd_config(&path, show, init),
            Commands::Projects { path } => cmd_projects(&path).await,
        }
    })
}

/// `InitProject` (cold) / `Reindex` (force): writes the `.omnicontext/`
/// marker if absent, refuses a bare re-`index` on an already-initialized
/// project unless `--force` or `--new-config` was passed.
async fn cmd_index(path: &str, force: bool, new_config: bool) -> Result<()> {
    let repo_path = canonicalize_repo(path)?;
    let config = Config::load(&repo_path)?;

    let existing_marker = ProjectMarker::read(&repo_path)?;
    if existing_marker.is_some() && !force && !new_config {
        anyhow::bail!(
            "already initialized: {} (pass --force to reindex, --new-config to reissue the project id)",
            repo_path.display()
        );
    }

    let project_id = if new_config || existing_marker.is_none() {
        config.project_id()
    } else {
        existing_marker.as_ref().map(|m| m.project_id.clone()).unwrap_or_else(|| config.project_id())
    };

    let engine = Engine::with_config(config.clone()).await?;

    let start = std::time::Instant::now();
    let result = if force {
        engine.full_reindex().await?
    } else {
        engine.run_index().await?
    };

    ProjectMarker {
        project_id,
        embedder_model: config.embedding.model_path.display().to_string(),
        dim: config.embedding.dimensions,
        created_at: existing_marker.map(|m| m.created_at).unwrap_or_else(now_unix),
    }
    .write(&repo_path)?;

    omni_core::pipeline::register_project_async(&config)
        .await
        .context("register project")?;

    println!(
        "Indexed {} in {:.2}s: {} files ({} failed), {} chunks, {} symbols, {} embeddings",
        repo_path.display(),
        start.elapsed().as_secs_f64(),
        result.files_processed,
        result.files_failed,
        result.chunks_created,
        result.symbols_extracted,
        result.embeddings_generated,
    );
    Ok(())
}

async fn cmd_search(repo: &str, query: &str, limit: usize, language: Option<&str>, kind: &str) -> Result<()> {
    let repo_path = canonicalize_repo(repo)?;
    let config = Config::load(&repo_path)?;
    let engine = Engine::with_config(config).await?;

    let search_kind = match kind {
        "fts" => SearchKind::Fts,
        "vector" => SearchKind::Vector,
        "graph" => SearchKind::Graph,
        _ => SearchKind::Hybrid,
    };

    let mut q = SearchQuery::text(query, limit);
    q.kind = search_kind;
    if let Some(lang) = language {
        q.filters.language = Some(Language::from_extension(lang));
    }

    let results = engine.search_with_query(&q).await?;
    if results.is_empty() {
        println!("No results for \"{query}\".");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} (score {:.4}) [{}:{}-{}]",
            i + 1,
            result.chunk.symbol_path,
            result.score,
            result.file_path.display(),
            result.chunk.line_start,
            result.chunk.line_end,
        );
    }
    Ok(())
}

async fn cmd_status(path: &str) -> Result<()> {
    let repo_path = canonicalize_repo(path)?;
    let config = Config::load(&repo_path)?;
    let engine = Engine::with_config(config).await?;
    let status = engine.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn cmd_mcp(repo: &str, transport: &str) -> Result<()> {
    if transport != "stdio" {
        anyhow::bail!("unsupported transport: {transport} (only 'stdio' is implemented)");
    }
    let repo_path = canonicalize_repo(repo)?;
    omni_mcp::run_stdio(&repo_path)
}

fn cmd_config(path: &str, show: bool, init: bool) -> Result<()> {
    let repo_path = canonicalize_repo(path)?;

    if init {
        let config_path = repo_path.join(".omnicontext").join("config.toml");
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let defaults = Config::defaults(&repo_path);
        let toml_str = toml::to_string_pretty(&defaults).context("serialize default config")?;
        std::fs::write(&config_path, toml_str)?;
        println!("Initialized {}", config_path.display());
    }

    if show {
        let config = Config::load(&repo_path)?;
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    if !init && !show {
        println!("Nothing to do: pass --init and/or --show.");
    }
    Ok(())
}

async fn cmd_projects(path: &str) -> Result<()> {
    let repo_path = canonicalize_repo(path)?;
    let config = Config::load(&repo_path)?;
    let projects = omni_core::pipeline::list_projects_async(&config).await.context("list projects")?;
    if projects.is_empty() {
        println!("No projects registered yet. Run `omnicontext index <path>` first.");
        return Ok(());
    }
    for p in &projects {
        println!("{}  {}  [{}]", p.id, p.path.display(), p.storage_mode.as_str());
    }
    Ok(())
}

/// Resolve a user-supplied path to a canonical, existing directory.
/// Corresponds to the `PathInvalid` input error.
fn canonicalize_repo(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let canonical = candidate
        .canonicalize()
        .with_context(|| format!("invalid path: {path}"))?;
    if !canonical.is_dir() {
        anyhow::bail!("invalid path: {path} is not a directory");
    }
    Ok(canonical)
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
