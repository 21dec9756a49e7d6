//! Server backend: Postgres (chunks + pgvector ANN + FTS), a Bolt graph
//! database over `neo4rs`, and Redis as the `CacheStore`. Selected by
//! `storageMode = "server" | "auto"`; every project shares one connection
//! pool per store, partitioned by `project_id`.
//!
//! Connections are opened eagerly in `connect()` so `auto` mode can bound
//! the attempt with `storage.connect_timeout_ms` and fall back to embedded
//! on failure (see `storage::open`).

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio_postgres::NoTls;

use crate::config::StorageConfig;
use crate::error::{OmniError, OmniResult};
use crate::types::{
    Chunk, ChunkKind, DependencyEdge, DependencyKind, EdgeDirection, FileInfo, Language, Project,
    StorageMode, Subgraph, Symbol, Visibility,
};

use super::traits::{CacheStore, ChunkUpsert, GraphStore, ProjectRegistry, VectorStore};

fn map_pg(store: &'static str) -> impl Fn(tokio_postgres::Error) -> OmniError {
    move |e| OmniError::StoreUnreachable { store, reason: e.to_string() }
}

fn map_redis(e: redis::RedisError) -> OmniError {
    OmniError::StoreUnreachable { store: "cache", reason: e.to_string() }
}

fn map_neo4j(e: neo4rs::Error) -> OmniError {
    OmniError::StoreUnreachable { store: "graph", reason: e.to_string() }
}

/// Connects to Postgres and spawns its driving connection task. Returns the
/// `Client` used for queries; the connection future runs in the background
/// until the client is dropped.
async fn connect_postgres(cfg: &StorageConfig, timeout: Duration) -> OmniResult<tokio_postgres::Client> {
    let conn_str = format!(
        "host={} port={} dbname={} user={} password={} connect_timeout={}",
        cfg.pg_host,
        cfg.pg_port,
        cfg.pg_db,
        cfg.pg_user,
        cfg.pg_password,
        timeout.as_secs().max(1),
    );
    let (client, connection) = tokio::time::timeout(timeout, tokio_postgres::connect(&conn_str, NoTls))
        .await
        .map_err(|_| OmniError::StoreUnreachable { store: "vector", reason: "connect timed out".into() })?
        .map_err(map_pg("vector"))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "postgres connection task exited");
        }
    });
    Ok(client)
}

/// `VectorStore` over Postgres. Assumes a schema with `pgvector` installed:
///
/// ```sql
/// CREATE TABLE chunks (
///     project_id text, chunk_id bigint, file_id bigint, symbol_path text,
///     kind text, visibility text, line_start int, line_end int, content text,
///     doc_comment text, token_count int, weight double precision,
///     embedding vector(768),
///     PRIMARY KEY (project_id, chunk_id)
/// );
/// CREATE INDEX ON chunks USING hnsw (embedding vector_cosine_ops);
/// CREATE INDEX ON chunks USING gin (to_tsvector('english', content));
/// ```
///
/// Embeddings are sent as a `$n::text::vector` cast rather than through a
/// typed binding, so no extra `pgvector` client crate is needed.
pub struct PostgresVectorStore {
    client: tokio_postgres::Client,
}

impl PostgresVectorStore {
    pub async fn connect(cfg: &StorageConfig) -> OmniResult<Self> {
        let client = connect_postgres(cfg, Duration::from_millis(cfg.connect_timeout_ms)).await?;
        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS files (
                    id bigserial, project_id text, rel_path text, language text,
                    content_hash text, size_bytes bigint,
                    PRIMARY KEY (id),
                    UNIQUE (project_id, rel_path)
                );
                CREATE TABLE IF NOT EXISTS chunks (
                    project_id text, chunk_id bigserial, file_id bigint, symbol_path text,
                    kind text, visibility text, line_start int, line_end int, content text,
                    doc_comment text, token_count int, weight double precision,
                    embedding_text text,
                    PRIMARY KEY (project_id, chunk_id)
                );
                CREATE TABLE IF NOT EXISTS symbols (
                    id bigserial, project_id text, file_id bigint, chunk_id bigint,
                    name text, fqn text, kind text, line int,
                    PRIMARY KEY (id),
                    UNIQUE (project_id, fqn)
                );",
            )
            .await
            .map_err(map_pg("vector"))?;
        Ok(Self { client })
    }
}

// `Language` doesn't expose a string parser, only `as_str`/`from_extension`;
// round-trip through the canonical string each variant serializes to.
fn language_from_db_str(s: &str) -> Language {
    match s {
        "python" => Language::Python,
        "typescript" => Language::TypeScript,
        "javascript" => Language::JavaScript,
        "rust" => Language::Rust,
        "go" => Language::Go,
        "java" => Language::Java,
        "c" => Language::C,
        "cpp" => Language::Cpp,
        "csharp" => Language::CSharp,
        "css" => Language::Css,
        "ruby" => Language::Ruby,
        "php" => Language::Php,
        "swift" => Language::Swift,
        "kotlin" => Language::Kotlin,
        "html" => Language::Html,
        "shell" => Language::Shell,
        "markdown" => Language::Markdown,
        "toml" => Language::Toml,
        "yaml" => Language::Yaml,
        "json" => Language::Json,
        _ => Language::Unknown,
    }
}

fn row_to_file_info(row: &tokio_postgres::Row) -> FileInfo {
    FileInfo {
        id: row.get::<_, i64>("id"),
        path: std::path::PathBuf::from(row.get::<_, String>("rel_path")),
        language: language_from_db_str(&row.get::<_, String>("language")),
        content_hash: row.get::<_, String>("content_hash"),
        size_bytes: row.get::<_, i64>("size_bytes") as u64,
    }
}

fn row_to_symbol(row: &tokio_postgres::Row) -> Symbol {
    Symbol {
        id: row.get::<_, i64>("id"),
        name: row.get::<_, String>("name"),
        fqn: row.get::<_, String>("fqn"),
        kind: ChunkKind::from_str_lossy(&row.get::<_, String>("kind")),
        file_id: row.get::<_, i64>("file_id"),
        line: row.get::<_, i32>("line") as u32,
        chunk_id: row.get::<_, Option<i64>>("chunk_id"),
    }
}

fn vector_literal(v: &[f32]) -> String {
    let mut s = String::from("[");
    for (i, x) in v.iter().enumerate() {
        if i > 0 {
            s.push(',');
        }
        s.push_str(&x.to_string());
    }
    s.push(']');
    s
}

fn row_to_chunk(row: &tokio_postgres::Row) -> Chunk {
    Chunk {
        id: row.get::<_, i64>("chunk_id"),
        file_id: row.get::<_, i64>("file_id"),
        symbol_path: row.get::<_, String>("symbol_path"),
        kind: ChunkKind::from_str_lossy(&row.get::<_, String>("kind")),
        visibility: Visibility::from_str_lossy(&row.get::<_, String>("visibility")),
        line_start: row.get::<_, i32>("line_start") as u32,
        line_end: row.get::<_, i32>("line_end") as u32,
        content: row.get::<_, String>("content"),
        doc_comment: row.get::<_, Option<String>>("doc_comment"),
        token_count: row.get::<_, i32>("token_count") as u32,
        weight: row.get::<_, f64>("weight"),
        vector_id: Some(row.get::<_, i64>("chunk_id") as u64),
    }
}

#[async_trait]
impl VectorStore for PostgresVectorStore {
    async fn upsert_chunks(&self, project_id: &str, chunks: &[ChunkUpsert]) -> OmniResult<()> {
        for c in chunks {
            let chunk = &c.chunk;
            self.client
                .execute(
                    "INSERT INTO chunks (
                        project_id, chunk_id, file_id, symbol_path, kind, visibility,
                        line_start, line_end, content, doc_comment, token_count, weight, embedding_text
                     ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
                     ON CONFLICT (project_id, chunk_id) DO UPDATE SET
                        file_id = excluded.file_id, symbol_path = excluded.symbol_path,
                        kind = excluded.kind, visibility = excluded.visibility,
                        line_start = excluded.line_start, line_end = excluded.line_end,
                        content = excluded.content, doc_comment = excluded.doc_comment,
                        token_count = excluded.token_count, weight = excluded.weight,
                        embedding_text = excluded.embedding_text",
                    &[
                        &project_id,
                        &chunk.id,
                        &chunk.file_id,
                        &chunk.symbol_path,
                        &chunk.kind.as_str(),
                        &chunk.visibility.as_str(),
                        &(chunk.line_start as i32),
                        &(chunk.line_end as i32),
                        &chunk.content,
                        &chunk.doc_comment,
                        &(chunk.token_count as i32),
                        &chunk.weight,
                        &vector_literal(&c.embedding),
                    ],
                )
                .await
                .map_err(map_pg("vector"))?;
        }
        Ok(())
    }

    async fn delete_by_file(&self, project_id: &str, chunk_ids: &[i64]) -> OmniResult<()> {
        self.client
            .execute(
                "DELETE FROM chunks WHERE project_id = $1 AND chunk_id = ANY($2)",
                &[&project_id, &chunk_ids],
            )
            .await
            .map_err(map_pg("vector"))?;
        Ok(())
    }

    async fn search_ann(&self, project_id: &str, query: &[f32], k: usize) -> OmniResult<Vec<(i64, f32)>> {
        // Cosine distance via pgvector's `<=>` operator; cast both sides from
        // text so no pgvector-specific Rust binding is required.
        let rows = self
            .client
            .query(
                "SELECT chunk_id,
                        (embedding_text::vector <=> $1::vector) AS distance
                 FROM chunks
                 WHERE project_id = $2 AND embedding_text IS NOT NULL
                 ORDER BY distance ASC
                 LIMIT $3",
                &[&vector_literal(query), &project_id, &(k as i64)],
            )
            .await
            .map_err(map_pg("vector"))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let distance: f64 = row.get("distance");
                (row.get::<_, i64>("chunk_id"), 1.0 - distance as f32)
            })
            .collect())
    }

    async fn search_fts(&self, project_id: &str, query: &str, k: usize) -> OmniResult<Vec<(i64, f32)>> {
        let rows = self
            .client
            .query(
                "SELECT chunk_id,
                        ts_rank_cd(to_tsvector('english', content), plainto_tsquery('english', $1)) AS rank
                 FROM chunks
                 WHERE project_id = $2 AND to_tsvector('english', content) @@ plainto_tsquery('english', $1)
                 ORDER BY rank DESC
                 LIMIT $3",
                &[&query, &project_id, &(k as i64)],
            )
            .await
            .map_err(map_pg("vector"))?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<_, i64>("chunk_id"), row.get::<_, f32>("rank")))
            .collect())
    }

    async fn get_chunks(&self, project_id: &str, ids: &[i64]) -> OmniResult<Vec<Chunk>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM chunks WHERE project_id = $1 AND chunk_id = ANY($2)",
                &[&project_id, &ids],
            )
            .await
            .map_err(map_pg("vector"))?;
        let by_id: std::collections::HashMap<i64, Chunk> =
            rows.iter().map(|row| (row.get::<_, i64>("chunk_id"), row_to_chunk(row))).collect();
        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    async fn upsert_file(&self, project_id: &str, file: &FileInfo) -> OmniResult<i64> {
        let path_str = file.path.to_string_lossy().to_string();
        let row = self
            .client
            .query_one(
                "INSERT INTO files (project_id, rel_path, language, content_hash, size_bytes)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (project_id, rel_path) DO UPDATE SET
                    language = excluded.language, content_hash = excluded.content_hash,
                    size_bytes = excluded.size_bytes
                 RETURNING id",
                &[
                    &project_id,
                    &path_str,
                    &file.language.as_str(),
                    &file.content_hash,
                    &(file.size_bytes as i64),
                ],
            )
            .await
            .map_err(map_pg("vector"))?;
        Ok(row.get::<_, i64>("id"))
    }

    async fn get_file_hash(&self, project_id: &str, path: &Path) -> OmniResult<Option<String>> {
        let path_str = path.to_string_lossy().to_string();
        Ok(self
            .client
            .query_opt(
                "SELECT content_hash FROM files WHERE project_id = $1 AND rel_path = $2",
                &[&project_id, &path_str],
            )
            .await
            .map_err(map_pg("vector"))?
            .map(|row| row.get::<_, String>("content_hash")))
    }

    async fn get_file_by_path(&self, project_id: &str, path: &Path) -> OmniResult<Option<FileInfo>> {
        let path_str = path.to_string_lossy().to_string();
        Ok(self
            .client
            .query_opt(
                "SELECT * FROM files WHERE project_id = $1 AND rel_path = $2",
                &[&project_id, &path_str],
            )
            .await
            .map_err(map_pg("vector"))?
            .as_ref()
            .map(row_to_file_info))
    }

    async fn delete_file(&self, project_id: &str, path: &Path) -> OmniResult<()> {
        let path_str = path.to_string_lossy().to_string();
        let file_id: Option<i64> = self
            .client
            .query_opt(
                "SELECT id FROM files WHERE project_id = $1 AND rel_path = $2",
                &[&project_id, &path_str],
            )
            .await
            .map_err(map_pg("vector"))?
            .map(|row| row.get("id"));
        if let Some(file_id) = file_id {
            self.client
                .execute("DELETE FROM symbols WHERE project_id = $1 AND file_id = $2", &[&project_id, &file_id])
                .await
                .map_err(map_pg("vector"))?;
            self.client
                .execute("DELETE FROM chunks WHERE project_id = $1 AND file_id = $2", &[&project_id, &file_id])
                .await
                .map_err(map_pg("vector"))?;
            self.client
                .execute("DELETE FROM files WHERE project_id = $1 AND id = $2", &[&project_id, &file_id])
                .await
                .map_err(map_pg("vector"))?;
        }
        Ok(())
    }

    async fn symbol_ids_for_path(&self, project_id: &str, path: &Path) -> OmniResult<Vec<i64>> {
        let path_str = path.to_string_lossy().to_string();
        let rows = self
            .client
            .query(
                "SELECT s.id FROM symbols s JOIN files f ON f.id = s.file_id AND f.project_id = s.project_id
                 WHERE s.project_id = $1 AND f.rel_path = $2",
                &[&project_id, &path_str],
            )
            .await
            .map_err(map_pg("vector"))?;
        Ok(rows.iter().map(|row| row.get::<_, i64>("id")).collect())
    }

    async fn reindex_file(
        &self,
        project_id: &str,
        file: &FileInfo,
        chunks: &[Chunk],
        symbols: &[Symbol],
    ) -> OmniResult<(i64, Vec<i64>)> {
        let file_id = self.upsert_file(project_id, file).await?;

        self.client
            .execute("DELETE FROM chunks WHERE project_id = $1 AND file_id = $2", &[&project_id, &file_id])
            .await
            .map_err(map_pg("vector"))?;
        self.client
            .execute("DELETE FROM symbols WHERE project_id = $1 AND file_id = $2", &[&project_id, &file_id])
            .await
            .map_err(map_pg("vector"))?;

        // Chunks are always rebuilt from scratch by the caller (`chunk.id` is
        // 0, unpersisted), so every row here is a fresh insert; the
        // `chunk_id` column's `bigserial` default assigns the id.
        let mut chunk_ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let row = self
                .client
                .query_one(
                    "INSERT INTO chunks (
                        project_id, file_id, symbol_path, kind, visibility,
                        line_start, line_end, content, doc_comment, token_count, weight
                     ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
                     RETURNING chunk_id",
                    &[
                        &project_id,
                        &file_id,
                        &chunk.symbol_path,
                        &chunk.kind.as_str(),
                        &chunk.visibility.as_str(),
                        &(chunk.line_start as i32),
                        &(chunk.line_end as i32),
                        &chunk.content,
                        &chunk.doc_comment,
                        &(chunk.token_count as i32),
                        &chunk.weight,
                    ],
                )
                .await
                .map_err(map_pg("vector"))?;
            chunk_ids.push(row.get::<_, i64>("chunk_id"));
        }

        for (i, symbol) in symbols.iter().enumerate() {
            let chunk_id = chunk_ids.get(i).copied();
            self.client
                .execute(
                    "INSERT INTO symbols (project_id, file_id, chunk_id, name, fqn, kind, line)
                     VALUES ($1,$2,$3,$4,$5,$6,$7)
                     ON CONFLICT (project_id, fqn) DO UPDATE SET
                        file_id = excluded.file_id, chunk_id = excluded.chunk_id,
                        name = excluded.name, kind = excluded.kind, line = excluded.line",
                    &[
                        &project_id,
                        &file_id,
                        &chunk_id,
                        &symbol.name,
                        &symbol.fqn,
                        &symbol.kind.as_str(),
                        &(symbol.line as i32),
                    ],
                )
                .await
                .map_err(map_pg("vector"))?;
        }

        Ok((file_id, chunk_ids))
    }

    async fn chunks_for_file(&self, project_id: &str, file_id: i64) -> OmniResult<Vec<Chunk>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM chunks WHERE project_id = $1 AND file_id = $2 ORDER BY line_start ASC",
                &[&project_id, &file_id],
            )
            .await
            .map_err(map_pg("vector"))?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn get_file_path_for_chunk(&self, project_id: &str, chunk_id: i64) -> OmniResult<Option<PathBuf>> {
        Ok(self
            .client
            .query_opt(
                "SELECT f.rel_path AS rel_path FROM files f
                 JOIN chunks c ON c.file_id = f.id AND c.project_id = f.project_id
                 WHERE c.project_id = $1 AND c.chunk_id = $2",
                &[&project_id, &chunk_id],
            )
            .await
            .map_err(map_pg("vector"))?
            .map(|row| PathBuf::from(row.get::<_, String>("rel_path"))))
    }

    async fn get_symbol_by_fqn(&self, project_id: &str, fqn: &str) -> OmniResult<Option<Symbol>> {
        Ok(self
            .client
            .query_opt("SELECT * FROM symbols WHERE project_id = $1 AND fqn = $2", &[&project_id, &fqn])
            .await
            .map_err(map_pg("vector"))?
            .as_ref()
            .map(row_to_symbol))
    }

    async fn get_symbol_by_id(&self, project_id: &str, id: i64) -> OmniResult<Option<Symbol>> {
        Ok(self
            .client
            .query_opt("SELECT * FROM symbols WHERE project_id = $1 AND id = $2", &[&project_id, &id])
            .await
            .map_err(map_pg("vector"))?
            .as_ref()
            .map(row_to_symbol))
    }

    async fn search_symbols_by_name(&self, project_id: &str, name: &str, limit: usize) -> OmniResult<Vec<Symbol>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM symbols WHERE project_id = $1 AND name = $2 LIMIT $3",
                &[&project_id, &name, &(limit as i64)],
            )
            .await
            .map_err(map_pg("vector"))?;
        Ok(rows.iter().map(row_to_symbol).collect())
    }

    async fn get_first_symbol_for_file(&self, project_id: &str, file_id: i64) -> OmniResult<Option<Symbol>> {
        Ok(self
            .client
            .query_opt(
                "SELECT * FROM symbols WHERE project_id = $1 AND file_id = $2 ORDER BY line ASC LIMIT 1",
                &[&project_id, &file_id],
            )
            .await
            .map_err(map_pg("vector"))?
            .as_ref()
            .map(row_to_symbol))
    }

    async fn all_files_brief(&self, project_id: &str) -> OmniResult<Vec<(i64, PathBuf, Language)>> {
        let rows = self
            .client
            .query("SELECT id, rel_path, language FROM files WHERE project_id = $1", &[&project_id])
            .await
            .map_err(map_pg("vector"))?;
        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<_, i64>("id"),
                    PathBuf::from(row.get::<_, String>("rel_path")),
                    language_from_db_str(&row.get::<_, String>("language")),
                )
            })
            .collect())
    }

    async fn all_chunks(&self, project_id: &str) -> OmniResult<Vec<Chunk>> {
        let rows = self
            .client
            .query("SELECT * FROM chunks WHERE project_id = $1", &[&project_id])
            .await
            .map_err(map_pg("vector"))?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn statistics(&self, project_id: &str) -> OmniResult<(usize, usize)> {
        let file_count: i64 = self
            .client
            .query_one("SELECT COUNT(*) AS n FROM files WHERE project_id = $1", &[&project_id])
            .await
            .map_err(map_pg("vector"))?
            .get("n");
        let chunk_count: i64 = self
            .client
            .query_one("SELECT COUNT(*) AS n FROM chunks WHERE project_id = $1", &[&project_id])
            .await
            .map_err(map_pg("vector"))?
            .get("n");
        Ok((file_count as usize, chunk_count as usize))
    }

    async fn clear_all(&self, project_id: &str) -> OmniResult<()> {
        self.client
            .execute("DELETE FROM symbols WHERE project_id = $1", &[&project_id])
            .await
            .map_err(map_pg("vector"))?;
        self.client
            .execute("DELETE FROM chunks WHERE project_id = $1", &[&project_id])
            .await
            .map_err(map_pg("vector"))?;
        self.client
            .execute("DELETE FROM files WHERE project_id = $1", &[&project_id])
            .await
            .map_err(map_pg("vector"))?;
        Ok(())
    }

    async fn flush(&self, _project_id: &str) -> OmniResult<()> {
        // Every write above commits immediately; nothing to flush.
        Ok(())
    }
}

/// `GraphStore` over a Bolt-speaking graph database (Neo4j-compatible),
/// via `neo4rs`. Nodes are `(:Symbol {project_id, symbol_id, fqn})`; edges
/// are `[:DEP {kind}]` relationships between them.
pub struct BoltGraphStore {
    graph: neo4rs::Graph,
}

impl BoltGraphStore {
    pub async fn connect(cfg: &StorageConfig) -> OmniResult<Self> {
        let graph = tokio::time::timeout(
            Duration::from_millis(cfg.connect_timeout_ms),
            neo4rs::Graph::new(&cfg.graph_uri, &cfg.graph_user, &cfg.graph_password),
        )
        .await
        .map_err(|_| OmniError::StoreUnreachable { store: "graph", reason: "connect timed out".into() })?
        .map_err(map_neo4j)?;
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for BoltGraphStore {
    async fn upsert_nodes(&self, project_id: &str, symbols: &[Symbol]) -> OmniResult<()> {
        for s in symbols {
            let q = neo4rs::query(
                "MERGE (n:Symbol {project_id: $project_id, symbol_id: $symbol_id}) SET n.fqn = $fqn",
            )
            .param("project_id", project_id)
            .param("symbol_id", s.id)
            .param("fqn", s.fqn.clone());
            self.graph.run(q).await.map_err(map_neo4j)?;
        }
        Ok(())
    }

    async fn upsert_edges(&self, project_id: &str, edges: &[DependencyEdge]) -> OmniResult<()> {
        for e in edges {
            let q = neo4rs::query(
                "MATCH (a:Symbol {project_id: $project_id, symbol_id: $source_id})
                 MATCH (b:Symbol {project_id: $project_id, symbol_id: $target_id})
                 MERGE (a)-[:DEP {kind: $kind}]->(b)",
            )
            .param("project_id", project_id)
            .param("source_id", e.source_id)
            .param("target_id", e.target_id)
            .param("kind", e.kind.as_str());
            self.graph.run(q).await.map_err(map_neo4j)?;
        }
        Ok(())
    }

    async fn delete_by_file(&self, project_id: &str, symbol_ids: &[i64]) -> OmniResult<()> {
        let q = neo4rs::query(
            "MATCH (n:Symbol {project_id: $project_id}) WHERE n.symbol_id IN $ids DETACH DELETE n",
        )
        .param("project_id", project_id)
        .param("ids", symbol_ids.to_vec());
        self.graph.run(q).await.map_err(map_neo4j)?;
        Ok(())
    }

    async fn neighbors(
        &self,
        project_id: &str,
        seed: i64,
        edge_kinds: Option<&[DependencyKind]>,
        direction: EdgeDirection,
        depth: usize,
        limit: usize,
    ) -> OmniResult<Subgraph> {
        let node_budget = limit.min(super::NODE_BUDGET_CAP).max(1);
        let kind_filter: Option<Vec<&'static str>> =
            edge_kinds.map(|kinds| kinds.iter().map(|k| k.as_str()).collect());

        let mut visited: HashSet<i64> = HashSet::from([seed]);
        let mut distance = std::collections::HashMap::from([(seed, 0usize)]);
        let mut frontier = VecDeque::from([seed]);
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut edge_seen: HashSet<(i64, i64, String)> = HashSet::new();
        let mut truncated = false;

        'bfs: for hop in 0..depth.max(1) {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            let batch: Vec<i64> = frontier.drain(..).collect();
            for current in batch {
                let pattern = match direction {
                    EdgeDirection::Out => "(n)-[r:DEP]->(m)",
                    EdgeDirection::In => "(n)<-[r:DEP]-(m)",
                    EdgeDirection::Both => "(n)-[r:DEP]-(m)",
                };
                let cypher = format!(
                    "MATCH (n:Symbol {{project_id: $project_id, symbol_id: $seed}}){} \
                     RETURN m.symbol_id AS other, m.fqn AS fqn, r.kind AS kind",
                    pattern.replacen("(n)", "(n)", 1)
                );
                let q = neo4rs::query(&cypher).param("project_id", project_id).param("seed", current);
                let mut result = self.graph.execute(q).await.map_err(map_neo4j)?;
                while let Some(row) = result.next().await.map_err(map_neo4j)? {
                    let other: i64 = row.get("other").map_err(map_neo4j)?;
                    let fqn: String = row.get("fqn").unwrap_or_default();
                    let kind_str: String = row.get("kind").unwrap_or_default();
                    if let Some(allowed) = &kind_filter {
                        if !allowed.contains(&kind_str.as_str()) {
                            continue;
                        }
                    }
                    let edge_key = (current, other, kind_str.clone());
                    if edge_seen.insert(edge_key) {
                        edges.push(crate::types::GraphEdgeView {
                            source_id: current,
                            target_id: other,
                            kind: DependencyKind::from_str_lossy(&kind_str),
                        });
                    }
                    if !visited.contains(&other) {
                        if nodes.len() >= node_budget {
                            truncated = true;
                            continue;
                        }
                        visited.insert(other);
                        distance.insert(other, hop + 1);
                        nodes.push(crate::types::GraphNodeView { id: other, fqn, distance: hop + 1 });
                        next_frontier.push(other);
                    }
                }
                if nodes.len() >= node_budget {
                    truncated = true;
                    break 'bfs;
                }
            }
            frontier.extend(next_frontier);
        }

        Ok(Subgraph { nodes, edges, truncated })
    }

    async fn counts(&self, project_id: &str) -> OmniResult<(usize, usize)> {
        let q = neo4rs::query(
            "MATCH (n:Symbol {project_id: $project_id})
             OPTIONAL MATCH (n)-[r:DEP]->(:Symbol {project_id: $project_id})
             RETURN count(DISTINCT n) AS nodes, count(r) AS edges",
        )
        .param("project_id", project_id);
        let mut result = self.graph.execute(q).await.map_err(map_neo4j)?;
        if let Some(row) = result.next().await.map_err(map_neo4j)? {
            let nodes: i64 = row.get("nodes").map_err(map_neo4j)?;
            let edges: i64 = row.get("edges").map_err(map_neo4j)?;
            Ok((nodes as usize, edges as usize))
        } else {
            Ok((0, 0))
        }
    }

    async fn has_cycles(&self, project_id: &str) -> OmniResult<bool> {
        // Bounded cycle probe: any node reachable back to itself within a
        // short hop count. A full Tarjan pass isn't worth a Cypher round trip
        // per `Status` call.
        let q = neo4rs::query(
            "MATCH (n:Symbol {project_id: $project_id})-[:DEP*1..8]->(n) RETURN n LIMIT 1",
        )
        .param("project_id", project_id);
        let mut result = self.graph.execute(q).await.map_err(map_neo4j)?;
        Ok(result.next().await.map_err(map_neo4j)?.is_some())
    }

    async fn clear_all(&self, project_id: &str) -> OmniResult<()> {
        let q = neo4rs::query("MATCH (n:Symbol {project_id: $project_id}) DETACH DELETE n")
            .param("project_id", project_id);
        self.graph.run(q).await.map_err(map_neo4j)?;
        Ok(())
    }
}

/// `CacheStore` over Redis, using `SCAN`-based prefix invalidation (no
/// native prefix-delete in the Redis command set).
pub struct RedisCacheStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(cfg: &StorageConfig) -> OmniResult<Self> {
        let url = format!("redis://{}:{}", cfg.cache_host, cfg.cache_port);
        let client = redis::Client::open(url).map_err(map_redis)?;
        let manager = tokio::time::timeout(
            Duration::from_millis(cfg.connect_timeout_ms),
            redis::aio::ConnectionManager::new(client),
        )
        .await
        .map_err(|_| OmniError::StoreUnreachable { store: "cache", reason: "connect timed out".into() })?
        .map_err(map_redis)?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> OmniResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(map_redis)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> OmniResult<()> {
        let mut conn = self.manager.clone();
        match ttl {
            Some(d) => conn.set_ex(key, value, d.as_secs().max(1)).await.map_err(map_redis)?,
            None => conn.set(key, value).await.map_err(map_redis)?,
        }
        Ok(())
    }

    async fn invalidate(&self, key_prefix: &str) -> OmniResult<()> {
        let mut conn = self.manager.clone();
        let pattern = format!("{key_prefix}*");
        let keys: Vec<String> = conn.keys(&pattern).await.map_err(map_redis)?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await.map_err(map_redis)?;
        }
        Ok(())
    }
}

/// `ProjectRegistry` over a Postgres `projects` table, for deployments where
/// multiple `omni-mcp`/`omni-daemon` processes share one registry.
pub struct PostgresProjectRegistry {
    client: tokio_postgres::Client,
}

impl PostgresProjectRegistry {
    pub async fn connect(cfg: &StorageConfig) -> OmniResult<Self> {
        let client = connect_postgres(cfg, Duration::from_millis(cfg.connect_timeout_ms)).await?;
        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS projects (
                    id text PRIMARY KEY,
                    path text NOT NULL UNIQUE,
                    name text NOT NULL,
                    languages jsonb NOT NULL DEFAULT '[]',
                    created_at bigint NOT NULL,
                    updated_at bigint NOT NULL,
                    storage_mode text NOT NULL
                );",
            )
            .await
            .map_err(map_pg("registry"))?;
        Ok(Self { client })
    }

    fn row_to_project(row: &tokio_postgres::Row) -> Project {
        let languages_json: serde_json::Value = row.get("languages");
        let languages: Vec<Language> = serde_json::from_value(languages_json).unwrap_or_default();
        Project {
            id: row.get("id"),
            path: std::path::PathBuf::from(row.get::<_, String>("path")),
            name: row.get("name"),
            languages,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            storage_mode: StorageMode::from_str_lossy(&row.get::<_, String>("storage_mode")),
        }
    }
}

#[async_trait]
impl ProjectRegistry for PostgresProjectRegistry {
    async fn register(&self, path: &Path, storage_mode: StorageMode) -> OmniResult<Project> {
        let canonical = path
            .canonicalize()
            .map_err(|e| OmniError::PathInvalid { path: path.to_path_buf(), reason: e.to_string() })?;
        let path_str = canonical.to_string_lossy().to_string();

        if let Some(row) = self
            .client
            .query_opt("SELECT * FROM projects WHERE path = $1", &[&path_str])
            .await
            .map_err(map_pg("registry"))?
        {
            return Ok(Self::row_to_project(&row));
        }

        let id = crate::config::Config::defaults(&canonical).project_id();
        let name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.clone());
        let now = now_unix();

        self.client
            .execute(
                "INSERT INTO projects (id, path, name, languages, created_at, updated_at, storage_mode)
                 VALUES ($1, $2, $3, '[]', $4, $4, $5)",
                &[&id, &path_str, &name, &now, &storage_mode.as_str()],
            )
            .await
            .map_err(map_pg("registry"))?;

        Ok(Project { id, path: canonical, name, languages: Vec::new(), created_at: now, updated_at: now, storage_mode })
    }

    async fn resolve(&self, project_ref: &str) -> OmniResult<Option<Project>> {
        if let Some(row) = self
            .client
            .query_opt("SELECT * FROM projects WHERE id = $1 OR name = $1", &[&project_ref])
            .await
            .map_err(map_pg("registry"))?
        {
            return Ok(Some(Self::row_to_project(&row)));
        }
        if let Ok(canonical) = Path::new(project_ref).canonicalize() {
            let path_str = canonical.to_string_lossy().to_string();
            if let Some(row) = self
                .client
                .query_opt("SELECT * FROM projects WHERE path = $1", &[&path_str])
                .await
                .map_err(map_pg("registry"))?
            {
                return Ok(Some(Self::row_to_project(&row)));
            }
        }
        Ok(None)
    }

    async fn list(&self) -> OmniResult<Vec<Project>> {
        let rows = self
            .client
            .query("SELECT * FROM projects ORDER BY updated_at DESC", &[])
            .await
            .map_err(map_pg("registry"))?;
        Ok(rows.iter().map(Self::row_to_project).collect())
    }

    async fn delete(&self, project_id: &str) -> OmniResult<()> {
        self.client
            .execute("DELETE FROM projects WHERE id = $1", &[&project_id])
            .await
            .map_err(map_pg("registry"))?;
        Ok(())
    }

    async fn find_duplicates(&self) -> OmniResult<Vec<Vec<Project>>> {
        let all = self.list().await?;
        let mut by_canonical: std::collections::HashMap<String, Vec<Project>> = std::collections::HashMap::new();
        for project in all {
            let key = match project.path.canonicalize() {
                Ok(p) => p.to_string_lossy().to_string(),
                Err(_) => project.path.to_string_lossy().to_string(),
            };
            by_canonical.entry(key).or_default().push(project);
        }
        Ok(by_canonical.into_values().filter(|group| group.len() > 1).collect())
    }

    async fn touch(&self, project_id: &str, languages: &[Language]) -> OmniResult<()> {
        let languages_json =
            serde_json::to_value(languages).map_err(|e| OmniError::Serialization(e.to_string()))?;
        self.client
            .execute(
                "UPDATE projects SET languages = $1, updated_at = $2 WHERE id = $3",
                &[&languages_json, &now_unix(), &project_id],
            )
            .await
            .map_err(map_pg("registry"))?;
        Ok(())
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
