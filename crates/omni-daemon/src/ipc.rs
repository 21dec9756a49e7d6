//! IPC transport layer for the OmniContext daemon.
//!
//! Uses named pipes on Windows and Unix domain sockets on Linux/macOS.
//! Communication is newline-delimited JSON-RPC 2.0 over the pipe.
//!
//! ## Protocol
//!
//! Each message is a complete JSON object terminated by `\n`.
//! The client sends `Request` objects, the server responds with `Response` objects.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use omni_core::Engine;

use crate::protocol::{self, error_codes, Response};

/// Derive a deterministic pipe/socket name from the repository path.
pub fn default_pipe_name(repo_path: &Path) -> String {
    use sha2::{Sha256, Digest};
    let normalized = repo_path
        .to_string_lossy()
        .replace(r"\\?\", "")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let hash = hex::encode(&hasher.finalize()[..6]);

    #[cfg(windows)]
    {
        format!(r"\\.\pipe\omnicontext-{}", hash)
    }

    #[cfg(not(windows))]
    {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .unwrap_or_else(|_| "/tmp".to_string());
        format!("{}/omnicontext-{}.sock", runtime_dir, hash)
    }
}

/// Start the IPC server and listen for client connections.
pub async fn serve(engine: Engine, pipe_name: &str) -> anyhow::Result<()> {
    let engine = Arc::new(Mutex::new(engine));

    #[cfg(windows)]
    {
        serve_named_pipe(engine, pipe_name).await
    }

    #[cfg(not(windows))]
    {
        serve_unix_socket(engine, pipe_name).await
    }
}

// ---------------------------------------------------------------------------
// Windows: Named Pipe server
// ---------------------------------------------------------------------------

#[cfg(windows)]
async fn serve_named_pipe(
    engine: Arc<Mutex<Engine>>,
    pipe_name: &str,
) -> anyhow::Result<()> {
    use tokio::net::windows::named_pipe::ServerOptions;

    tracing::info!(pipe = %pipe_name, "listening on named pipe");

    loop {
        // Create a new pipe instance for each client
        let server = ServerOptions::new()
            .first_pipe_instance(false)
            .create(pipe_name)?;

        // Wait for a client to connect
        server.connect().await?;

        tracing::info!("client connected");

        let engine = engine.clone();
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(server);
            if let Err(e) = handle_client(engine, reader, writer).await {
                tracing::warn!(error = %e, "client handler error");
            }
            tracing::info!("client disconnected");
        });
    }
}

// ---------------------------------------------------------------------------
// Unix: Domain Socket server
// ---------------------------------------------------------------------------

#[cfg(not(windows))]
async fn serve_unix_socket(
    engine: Arc<Mutex<Engine>>,
    socket_path: &str,
) -> anyhow::Result<()> {
    use tokio::net::UnixListener;

    // Remove stale socket file
    let _ = std::fs::remove_file(socket_path);

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!(socket = %socket_path, "listening on unix socket");

    loop {
        let (stream, _) = listener.accept().await?;
        tracing::info!("client connected");

        let engine = engine.clone();
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(stream);
            if let Err(e) = handle_client(engine, reader, writer).await {
                tracing::warn!(error = %e, "client handler error");
            }
            tracing::info!("client disconnected");
        });
    }
}

// ---------------------------------------------------------------------------
// Client handler (platform-agnostic)
// ---------------------------------------------------------------------------

/// Handle a single connected client.
///
/// Reads newline-delimited JSON-RPC requests, dispatches them to the engine,
/// and writes JSON-RPC responses back.
async fn handle_client<R, W>(
    engine: Arc<Mutex<Engine>>,
    reader: R,
    mut writer: W,
) -> anyhow::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<protocol::Request>(&line) {
            Ok(req) => dispatch(engine.clone(), req).await,
            Err(e) => Response::error(
                0,
                error_codes::PARSE_ERROR,
                format!("invalid JSON-RPC: {e}"),
            ),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate handler.
async fn dispatch(
    engine: Arc<Mutex<Engine>>,
    req: protocol::Request,
) -> Response {
    let start = std::time::Instant::now();

    let result = match req.method.as_str() {
        "ping" => Ok(serde_json::json!({ "pong": true })),

        "status" => handle_status(engine.clone()).await,

        "search" => {
            let params: protocol::SearchParams = match parse_params(&req) {
                Ok(p) => p,
                Err(r) => return r,
            };
            handle_search(engine.clone(), params).await
        }

        "list_projects" => handle_list_projects(engine.clone()).await,

        "get_file_context" => {
            let params: protocol::GetFileContextParams = match parse_params(&req) {
                Ok(p) => p,
                Err(r) => return r,
            };
            handle_get_file_context(engine.clone(), params).await
        }

        "get_relationships" => {
            let params: protocol::GetRelationshipsParams = match parse_params(&req) {
                Ok(p) => p,
                Err(r) => return r,
            };
            handle_get_relationships(engine.clone(), params).await
        }

        "index" => handle_index(engine.clone()).await,

        "apply_changes" => {
            let params: protocol::ApplyChangesParams = match parse_params(&req) {
                Ok(p) => p,
                Err(r) => return r,
            };
            handle_apply_changes(engine.clone(), params).await
        }

        "get_coding_standards" => {
            let params: protocol::GetCodingStandardsParams = match parse_params(&req) {
                Ok(p) => p,
                Err(r) => return r,
            };
            handle_get_coding_standards(engine.clone(), params).await
        }

        "shutdown" => {
            tracing::info!("shutdown requested via IPC");
            std::process::exit(0);
        }

        _ => Err((
            error_codes::METHOD_NOT_FOUND,
            format!("unknown method: {}", req.method),
        )),
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        method = %req.method,
        elapsed_ms = elapsed_ms,
        "request handled"
    );

    match result {
        Ok(value) => Response::success(req.id, value),
        Err((code, msg)) => Response::error(req.id, code, msg),
    }
}

/// Parse params from a request, returning an error response if invalid.
fn parse_params<T: serde::de::DeserializeOwned>(
    req: &protocol::Request,
) -> Result<T, Response> {
    let params = req.params.clone().unwrap_or(serde_json::Value::Object(Default::default()));
    serde_json::from_value(params).map_err(|e| {
        Response::error(
            req.id,
            error_codes::INVALID_PARAMS,
            format!("invalid params: {e}"),
        )
    })
}

// ---------------------------------------------------------------------------
// Handler implementations
// ---------------------------------------------------------------------------

async fn handle_status(engine: Arc<Mutex<Engine>>) -> Result<serde_json::Value, (i32, String)> {
    let eng = engine.lock().await;
    eng.status()
        .await
        .map(|s| serde_json::to_value(s).unwrap_or_default())
        .map_err(|e| (error_codes::ENGINE_ERROR, format!("status failed: {e}")))
}

async fn handle_search(
    engine: Arc<Mutex<Engine>>,
    params: protocol::SearchParams,
) -> Result<serde_json::Value, (i32, String)> {
    let eng = engine.lock().await;
    eng.search(&params.query, params.limit)
        .await
        .map(|results| {
            let entries: Vec<serde_json::Value> = results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "file": r.file_path.display().to_string(),
                        "symbol": r.chunk.symbol_path,
                        "kind": format!("{:?}", r.chunk.kind),
                        "score": r.score,
                        "line_start": r.chunk.line_start,
                        "line_end": r.chunk.line_end,
                        "content": r.chunk.content,
                    })
                })
                .collect();
            serde_json::json!({
                "count": entries.len(),
                "results": entries,
            })
        })
        .map_err(|e| (error_codes::ENGINE_ERROR, format!("search failed: {e}")))
}

async fn handle_list_projects(
    engine: Arc<Mutex<Engine>>,
) -> Result<serde_json::Value, (i32, String)> {
    let eng = engine.lock().await;
    omni_core::pipeline::list_projects_async(eng.config())
        .await
        .map(|projects| serde_json::to_value(projects).unwrap_or_default())
        .map_err(|e| (error_codes::ENGINE_ERROR, format!("list_projects failed: {e}")))
}

async fn handle_get_file_context(
    engine: Arc<Mutex<Engine>>,
    params: protocol::GetFileContextParams,
) -> Result<serde_json::Value, (i32, String)> {
    let eng = engine.lock().await;
    eng.get_file_context(Path::new(&params.rel_path), params.include_related)
        .await
        .map(|ctx| serde_json::to_value(ctx).unwrap_or_default())
        .map_err(|e| (error_codes::ENGINE_ERROR, format!("get_file_context failed: {e}")))
}

async fn handle_get_relationships(
    engine: Arc<Mutex<Engine>>,
    params: protocol::GetRelationshipsParams,
) -> Result<serde_json::Value, (i32, String)> {
    let eng = engine.lock().await;
    let edge_kinds: Option<Vec<omni_core::types::DependencyKind>> = params
        .edge_kinds
        .map(|kinds| kinds.iter().map(|k| omni_core::types::DependencyKind::from_str_lossy(k)).collect());
    let direction = match params.direction.as_deref() {
        Some("in") => omni_core::types::EdgeDirection::In,
        Some("out") => omni_core::types::EdgeDirection::Out,
        _ => omni_core::types::EdgeDirection::Both,
    };
    eng.get_relationships(&params.seed, edge_kinds.as_deref(), direction, params.depth.unwrap_or(2))
        .await
        .map(|subgraph| serde_json::to_value(subgraph).unwrap_or_default())
        .map_err(|e| (error_codes::ENGINE_ERROR, format!("get_relationships failed: {e}")))
}

async fn handle_index(engine: Arc<Mutex<Engine>>) -> Result<serde_json::Value, (i32, String)> {
    let mut eng = engine.lock().await;
    let start = std::time::Instant::now();

    eng.run_index()
        .await
        .map(|result| {
            serde_json::json!({
                "files_processed": result.files_processed,
                "chunks_created": result.chunks_created,
                "symbols_extracted": result.symbols_extracted,
                "embeddings_generated": result.embeddings_generated,
                "elapsed_ms": start.elapsed().as_millis() as u64,
            })
        })
        .map_err(|e| (error_codes::ENGINE_ERROR, format!("indexing failed: {e}")))
}

async fn handle_apply_changes(
    engine: Arc<Mutex<Engine>>,
    params: protocol::ApplyChangesParams,
) -> Result<serde_json::Value, (i32, String)> {
    let mut eng = engine.lock().await;

    if params.full_reindex.unwrap_or(false) {
        return eng
            .full_reindex()
            .await
            .map(|result| {
                serde_json::json!({
                    "mode": "full_reindex",
                    "files_processed": result.files_processed,
                    "files_failed": result.files_failed,
                    "chunks_created": result.chunks_created,
                    "symbols_extracted": result.symbols_extracted,
                    "embeddings_generated": result.embeddings_generated,
                })
            })
            .map_err(|e| (error_codes::ENGINE_ERROR, format!("full reindex failed: {e}")));
    }

    let changes: Vec<omni_core::types::FileChangeRequest> = params
        .changes
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| {
            let kind = match c.kind.as_str() {
                "created" => omni_core::types::FileChangeKind::Created,
                "modified" => omni_core::types::FileChangeKind::Modified,
                "deleted" => omni_core::types::FileChangeKind::Deleted,
                _ => return None,
            };
            Some(omni_core::types::FileChangeRequest {
                kind,
                rel_path: std::path::PathBuf::from(c.rel_path),
            })
        })
        .collect();

    eng.apply_changes(&changes)
        .await
        .map(|result| serde_json::to_value(result).unwrap_or_default())
        .map_err(|e| (error_codes::ENGINE_ERROR, format!("apply_changes failed: {e}")))
}

async fn handle_get_coding_standards(
    engine: Arc<Mutex<Engine>>,
    params: protocol::GetCodingStandardsParams,
) -> Result<serde_json::Value, (i32, String)> {
    let eng = engine.lock().await;
    let stores = eng.stores();
    let project_id = eng.project_id();
    let category = params
        .category
        .as_deref()
        .and_then(omni_core::standards::StandardCategory::from_str_lossy);

    omni_core::standards::StandardsDetector::detect_cached(
        stores.vector.as_ref(),
        stores.cache.as_ref(),
        &project_id,
        category,
    )
    .await
    .map(|standards| serde_json::to_value(standards).unwrap_or_default())
    .map_err(|e| (error_codes::ENGINE_ERROR, format!("standards detection failed: {e}")))
}
