//! MCP tool definitions for OmniContext.
//!
//! Each tool is annotated with `#[tool]` and exposes exactly one Tool API
//! operation to AI agents via the Model Context Protocol: `InitProject`,
//! `ListProjects`, `Search`, `GetFileContext`, `GetRelationships`,
//! `NotifyFileChanges`, `GetCodingStandards`. This is a 1:1 surface --
//! no extra tools, no reimplemented logic; every handler is a thin
//! marshal/unmarshal around the corresponding `Engine` (or
//! `pipeline::register_project_async`/`list_projects_async`) call.
//!
//! ## Thread Safety
//!
//! `Engine` holds `Arc<dyn VectorStore>`/`Arc<dyn GraphStore>` trait
//! objects, not a raw connection, so it is itself `Send + Sync`. It's
//! still wrapped in a `tokio::sync::Mutex` here because `run_index`/
//! `apply_changes`/`full_reindex` must not interleave with each other or
//! with a concurrent read -- the single-writer-lane rule from the
//! concurrency model.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
    ServerHandler,
};
use serde::Deserialize;
use tokio::sync::Mutex;

use omni_core::config::{Config, ProjectMarker};
use omni_core::Engine;

// -----------------------------------------------------------------------
// Parameter structs for each tool
// -----------------------------------------------------------------------

/// Parameters for the `init_project` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InitProjectParams {
    /// Path to the repository root to initialize.
    pub path: String,
    /// Reissue the project id even if a `.omnicontext/` marker already
    /// exists, reconciling a registry/marker inconsistency.
    pub new_config: Option<bool>,
}

/// Parameters for the `search` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchParams {
    /// Search query -- natural language or symbol name.
    pub query: String,
    /// Maximum number of results to return (default: 10).
    pub limit: Option<usize>,
}

/// Parameters for the `get_file_context` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetFileContextParams {
    /// File path relative to the repository root.
    pub path: String,
    /// Whether to also return chunks one hop away via `imports`/`calls`
    /// edges (default: false).
    pub include_related: Option<bool>,
}

/// Parameters for the `get_relationships` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetRelationshipsParams {
    /// A symbol id (as a string) or a file-relative path to seed from.
    pub seed: String,
    /// Edge kinds to follow; omit to match every kind.
    pub edge_kinds: Option<Vec<String>>,
    /// Traversal direction: 'in', 'out', or 'both' (default: 'both').
    pub direction: Option<String>,
    /// Hop count, clamped to 5 (default: 2).
    pub depth: Option<usize>,
}

/// Parameters for the `get_coding_standards` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetCodingStandardsParams {
    /// Restrict detection to one category: 'validation', 'error_handling',
    /// 'logging', or 'testing'. Omit to run all four.
    pub category: Option<String>,
}

/// One file change as reported by the `notify_file_changes` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FileChangeParam {
    /// 'created', 'modified', or 'deleted'.
    pub kind: String,
    /// Path relative to the repository root.
    pub rel_path: String,
}

/// Parameters for the `notify_file_changes` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct NotifyFileChangesParams {
    /// Files created, modified, or deleted since the last index.
    pub changes: Option<Vec<FileChangeParam>>,
    /// If true, ignore `changes` and rebuild the index from scratch.
    pub full_reindex: Option<bool>,
}

// -----------------------------------------------------------------------
// MCP Server
// -----------------------------------------------------------------------

/// OmniContext MCP Server.
///
/// Exposes the seven Tool API operations to AI coding agents.
#[derive(Clone)]
pub struct OmniContextServer {
    engine: Arc<Mutex<Engine>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl OmniContextServer {
    /// Create a new MCP server backed by the given engine.
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "init_project",
        description = "Initialize (or reindex) a repository: writes the .omnicontext/ project marker if absent and runs a full index. Returns the registered project. Fails with PathInvalid if the path doesn't exist, or AlreadyInitialized if it's already initialized and new_config wasn't set."
    )]
    async fn init_project(
        &self,
        params: Parameters<InitProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let candidate = std::path::Path::new(&params.0.path);
        let repo_path = match candidate.canonicalize() {
            Ok(p) if p.is_dir() => p,
            _ => {
                return Ok(CallToolResult::success(vec![Content::text(format!(
                    "PathInvalid: '{}' is not an existing directory",
                    params.0.path
                ))]));
            }
        };

        let new_config = params.0.new_config.unwrap_or(false);
        let existing_marker = ProjectMarker::read(&repo_path)
            .map_err(|e| McpError::internal_error(format!("marker read failed: {e}"), None))?;

        if existing_marker.is_some() && !new_config {
            return Ok(CallToolResult::success(vec![Content::text(format!(
                "AlreadyInitialized: '{}' (pass new_config: true to reissue the project id)",
                repo_path.display()
            ))]));
        }

        let config = Config::load(&repo_path)
            .map_err(|e| McpError::internal_error(format!("config load failed: {e}"), None))?;

        let project_id = config.project_id();
        let engine = Engine::with_config(config.clone())
            .await
            .map_err(|e| McpError::internal_error(format!("engine init failed: {e}"), None))?;

        let result = engine
            .run_index()
            .await
            .map_err(|e| McpError::internal_error(format!("initial index failed: {e}"), None))?;

        ProjectMarker {
            project_id,
            embedder_model: config.embedding.model_path.display().to_string(),
            dim: config.embedding.dimensions,
            created_at: existing_marker.map(|m| m.created_at).unwrap_or_else(now_unix),
        }
        .write(&repo_path)
        .map_err(|e| McpError::internal_error(format!("marker write failed: {e}"), None))?;

        let project = omni_core::pipeline::register_project_async(&config)
            .await
            .map_err(|e| McpError::internal_error(format!("project registration failed: {e}"), None))?;

        let output = format!(
            "## Project Initialized\n\n- **Id**: {}\n- **Path**: {}\n- **Files processed**: {}\n- **Chunks created**: {}\n- **Symbols extracted**: {}\n",
            project.id,
            project.path.display(),
            result.files_processed,
            result.chunks_created,
            result.symbols_extracted,
        );
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(
        name = "list_projects",
        description = "List every project registered on this machine, across all checkouts this tool has ever indexed."
    )]
    async fn list_projects(&self) -> Result<CallToolResult, McpError> {
        let engine = self.engine.lock().await;
        match omni_core::pipeline::list_projects_async(engine.config()).await {
            Ok(projects) if projects.is_empty() => Ok(CallToolResult::success(vec![Content::text(
                "No projects registered yet.".to_string(),
            )])),
            Ok(projects) => {
                let mut output = String::from("## Registered Projects\n\n");
                for p in &projects {
                    output.push_str(&format!(
                        "- `{}` {} ({})\n",
                        p.id,
                        p.path.display(),
                        p.storage_mode.as_str(),
                    ));
                }
                Ok(CallToolResult::success(vec![Content::text(output)]))
            }
            Err(e) => Err(McpError::internal_error(format!("list_projects failed: {e}"), None)),
        }
    }

    #[tool(
        name = "search",
        description = "Search the codebase using hybrid retrieval (keyword + semantic). Returns ranked code chunks with file paths, scores, and source code. Use natural language queries like 'authentication middleware' or symbol names like 'validate_token'."
    )]
    async fn search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params.0.limit.unwrap_or(10);
        let query = &params.0.query;
        let engine = self.engine.lock().await;

        match engine.search(query, limit).await {
            Ok(results) => {
                if results.is_empty() {
                    return Ok(CallToolResult::success(vec![Content::text(
                        "No results found. Make sure the repository has been indexed with `init_project`."
                    )]));
                }

                let mut output = String::new();
                for (i, result) in results.iter().enumerate() {
                    output.push_str(&format!(
                        "## Result {} (score: {:.4})\n**File**: {}\n**Symbol**: {} ({:?})\n**Lines**: {}-{}\n",
                        i + 1, result.score,
                        result.file_path.display(),
                        result.chunk.symbol_path, result.chunk.kind,
                        result.chunk.line_start, result.chunk.line_end,
                    ));
                    if let Some(ref doc) = result.chunk.doc_comment {
                        output.push_str(&format!("**Doc**: {}\n", doc));
                    }
                    output.push_str(&format!("```\n{}\n```\n\n", result.chunk.content));
                }

                Ok(CallToolResult::success(vec![Content::text(output)]))
            }
            Err(e) => Err(McpError::internal_error(format!("search failed: {e}"), None)),
        }
    }

    #[tool(
        name = "get_file_context",
        description = "Get a file's own chunks, and optionally the chunks of files one hop away via imports/calls edges. Provide the file path relative to the repository root."
    )]
    async fn get_file_context(
        &self,
        params: Parameters<GetFileContextParams>,
    ) -> Result<CallToolResult, McpError> {
        let path = std::path::Path::new(&params.0.path);
        let include_related = params.0.include_related.unwrap_or(false);
        let engine = self.engine.lock().await;

        match engine.get_file_context(path, include_related).await {
            Ok(ctx) => {
                let mut output = format!(
                    "## File: {}\n**Language**: {:?}\n**Size**: {} bytes\n\n",
                    params.0.path, ctx.file.language, ctx.file.size_bytes
                );

                output.push_str(&format!("### Chunks ({})\n\n", ctx.chunks.len()));
                for chunk in &ctx.chunks {
                    let doc_preview = chunk.doc_comment.as_deref()
                        .map(|d| {
                            let first = d.lines().next().unwrap_or("");
                            if first.len() > 80 { format!(" -- {}...", &first[..80]) }
                            else { format!(" -- {}", first) }
                        })
                        .unwrap_or_default();

                    output.push_str(&format!(
                        "- **{:?}** `{}` (L{}-L{}){}\n",
                        chunk.kind, chunk.symbol_path,
                        chunk.line_start, chunk.line_end, doc_preview,
                    ));
                }

                if include_related && !ctx.related_chunks.is_empty() {
                    output.push_str(&format!("\n### Related Chunks ({})\n\n", ctx.related_chunks.len()));
                    for chunk in &ctx.related_chunks {
                        output.push_str(&format!(
                            "- **{:?}** `{}` (L{}-L{})\n",
                            chunk.kind, chunk.symbol_path, chunk.line_start, chunk.line_end,
                        ));
                    }
                }

                Ok(CallToolResult::success(vec![Content::text(output)]))
            }
            Err(e) => Err(McpError::internal_error(format!("get_file_context failed: {e}"), None)),
        }
    }

    #[tool(
        name = "get_relationships",
        description = "Bounded dependency-graph traversal from a seed (a symbol id or a file-relative path). Returns the reachable symbols and edges. Direction is 'in' (what depends on the seed), 'out' (what the seed depends on), or 'both'."
    )]
    async fn get_relationships(
        &self,
        params: Parameters<GetRelationshipsParams>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.engine.lock().await;

        let edge_kinds: Option<Vec<omni_core::types::DependencyKind>> = params
            .0
            .edge_kinds
            .map(|kinds| kinds.iter().map(|k| omni_core::types::DependencyKind::from_str_lossy(k)).collect());
        let direction = match params.0.direction.as_deref() {
            Some("in") => omni_core::types::EdgeDirection::In,
            Some("out") => omni_core::types::EdgeDirection::Out,
            _ => omni_core::types::EdgeDirection::Both,
        };
        let depth = params.0.depth.unwrap_or(2);

        match engine
            .get_relationships(&params.0.seed, edge_kinds.as_deref(), direction, depth)
            .await
        {
            Ok(subgraph) => {
                let mut output = format!(
                    "## Relationships for `{}`\n\n{} node(s), {} edge(s){}\n\n",
                    params.0.seed,
                    subgraph.nodes.len(),
                    subgraph.edges.len(),
                    if subgraph.truncated { " (truncated)" } else { "" },
                );
                for node in &subgraph.nodes {
                    output.push_str(&format!("- {} (distance {})\n", node.fqn, node.distance));
                }
                Ok(CallToolResult::success(vec![Content::text(output)]))
            }
            Err(e) => Err(McpError::internal_error(format!("get_relationships failed: {e}"), None)),
        }
    }

    #[tool(
        name = "notify_file_changes",
        description = "Inform the engine about files created, modified, or deleted since the last index, so it can incrementally update without a full rescan. Pass `full_reindex: true` instead to force a clean rebuild."
    )]
    async fn notify_file_changes(
        &self,
        params: Parameters<NotifyFileChangesParams>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.engine.lock().await;

        if params.0.full_reindex.unwrap_or(false) {
            return match engine.full_reindex().await {
                Ok(result) => Ok(CallToolResult::success(vec![Content::text(format!(
                    "## Full Reindex Complete\n\n- Files processed: {}\n- Files failed: {}\n- Chunks created: {}\n- Symbols extracted: {}\n",
                    result.files_processed, result.files_failed, result.chunks_created, result.symbols_extracted,
                ))])),
                Err(e) => Err(McpError::internal_error(format!("full reindex failed: {e}"), None)),
            };
        }

        let mut changes = Vec::new();
        let mut rejected = Vec::new();
        for c in params.0.changes.unwrap_or_default() {
            match parse_file_change_kind(&c.kind) {
                Some(kind) => changes.push(omni_core::types::FileChangeRequest {
                    kind,
                    rel_path: std::path::PathBuf::from(c.rel_path),
                }),
                None => rejected.push(c.rel_path),
            }
        }

        if changes.is_empty() && rejected.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text(
                "No changes provided (pass `changes[]` or `full_reindex: true`).".to_string(),
            )]));
        }

        if changes.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text(format!(
                "All {} change(s) had an unrecognized `kind` (expected 'created', 'modified', or 'deleted'): {}",
                rejected.len(),
                rejected.join(", "),
            ))]));
        }

        match engine.apply_changes(&changes).await {
            Ok(result) => {
                let mut output = format!(
                    "## Changes Applied\n\n- Succeeded: {}\n- Failed: {}\n- Duration: {}ms\n",
                    result.succeeded, result.failed, result.duration_ms,
                );
                for err in &result.errors {
                    output.push_str(&format!("  - {}: {} ({})\n", err.rel_path.display(), err.message, err.code));
                }
                if !rejected.is_empty() {
                    output.push_str(&format!(
                        "\nSkipped {} change(s) with an unrecognized `kind`: {}\n",
                        rejected.len(),
                        rejected.join(", "),
                    ));
                }
                Ok(CallToolResult::success(vec![Content::text(output)]))
            }
            Err(e) => Err(McpError::internal_error(format!("apply_changes failed: {e}"), None)),
        }
    }

    #[tool(
        name = "get_coding_standards",
        description = "Detect recurring coding conventions (validation, error handling, logging, testing) across the indexed codebase, ranked by confidence. Optionally scope to one category."
    )]
    async fn get_coding_standards(
        &self,
        params: Parameters<GetCodingStandardsParams>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.engine.lock().await;
        let stores = engine.stores();
        let project_id = engine.project_id();

        let category = params
            .0
            .category
            .as_deref()
            .and_then(omni_core::standards::StandardCategory::from_str_lossy);

        match omni_core::standards::StandardsDetector::detect_cached(
            stores.vector.as_ref(),
            stores.cache.as_ref(),
            &project_id,
            category,
        )
        .await
        {
            Ok(standards) if standards.is_empty() => Ok(CallToolResult::success(vec![Content::text(
                "No recurring conventions detected (index may be empty or too small).".to_string(),
            )])),
            Ok(standards) => {
                let mut output = String::from("## Coding Standards\n\n");
                for s in &standards {
                    output.push_str(&format!(
                        "### {} (confidence: {:.2})\n**Signature**: `{}`\n**Seen**: {} times across {} files\n```\n{}\n```\n\n",
                        s.category.as_str(), s.confidence, s.signature, s.occurrences, s.distinct_files, s.example,
                    ));
                }
                Ok(CallToolResult::success(vec![Content::text(output)]))
            }
            Err(e) => Err(McpError::internal_error(format!("standards detection failed: {e}"), None)),
        }
    }
}

/// Parse a `notify_file_changes` change kind, matching the same vocabulary
/// `FileChangeKind` serializes as on the wire.
fn parse_file_change_kind(s: &str) -> Option<omni_core::types::FileChangeKind> {
    match s {
        "created" => Some(omni_core::types::FileChangeKind::Created),
        "modified" => Some(omni_core::types::FileChangeKind::Modified),
        "deleted" => Some(omni_core::types::FileChangeKind::Deleted),
        _ => None,
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[tool_handler]
impl ServerHandler for OmniContextServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "OmniContext provides deep code intelligence for AI coding agents. \
                 It indexes source code into searchable chunks with full-text and semantic search. \
                 Use init_project to index a repository, search for general queries, \
                 get_file_context for file structure, and get_relationships to traverse \
                 the dependency graph."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}
