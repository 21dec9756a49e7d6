//! Embedded backend: SQLite metadata + FTS5, the flat ANN vector index,
//! an in-process petgraph dependency graph, an in-process LRU cache, and a
//! SQLite-backed project registry (`registry.db`).
//!
//! This is the default `storageMode`. Every store here wraps a struct that
//! already exists in this crate (`MetadataIndex`, `VectorIndex`,
//! `DependencyGraph`) behind a `parking_lot::Mutex` so the trait objects can
//! be shared across the tokio tasks that `IndexService` dispatches to.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{OmniError, OmniResult};
use crate::graph::DependencyGraph;
use crate::index::MetadataIndex;
use crate::types::{
    Chunk, DependencyEdge, DependencyKind, EdgeDirection, FileInfo, Language, Project, StorageMode,
    Subgraph, Symbol,
};
use crate::vector::VectorIndex;

use super::traits::{CacheStore, ChunkUpsert, GraphStore, ProjectRegistry, VectorStore};

/// `VectorStore` over this crate's own `MetadataIndex` (chunk bodies + FTS5)
/// and `VectorIndex` (flat ANN). `project_id` is accepted for trait-object
/// parity with the server backend but unused: one embedded store instance
/// always belongs to exactly one project's data directory.
pub struct EmbeddedVectorStore {
    index: std::sync::Arc<Mutex<MetadataIndex>>,
    vectors: std::sync::Arc<Mutex<VectorIndex>>,
}

impl EmbeddedVectorStore {
    pub fn new(
        index: std::sync::Arc<Mutex<MetadataIndex>>,
        vectors: std::sync::Arc<Mutex<VectorIndex>>,
    ) -> Self {
        Self { index, vectors }
    }
}

#[async_trait]
impl VectorStore for EmbeddedVectorStore {
    async fn upsert_chunks(&self, _project_id: &str, chunks: &[ChunkUpsert]) -> OmniResult<()> {
        // The chunk row itself was already written by `MetadataIndex::reindex_file`
        // as part of the same ingest transaction; this only attaches the vector.
        let mut vectors = self.vectors.lock();
        let index = self.index.lock();
        for c in chunks {
            vectors.add(c.chunk.id as u64, &c.embedding)?;
            index.set_chunk_vector_id(c.chunk.id, c.chunk.id as u64)?;
        }
        Ok(())
    }

    async fn delete_by_file(&self, _project_id: &str, chunk_ids: &[i64]) -> OmniResult<()> {
        let mut vectors = self.vectors.lock();
        for &id in chunk_ids {
            vectors.remove(id as u64)?;
        }
        Ok(())
    }

    async fn search_ann(&self, _project_id: &str, query: &[f32], k: usize) -> OmniResult<Vec<(i64, f32)>> {
        let vectors = self.vectors.lock();
        Ok(vectors
            .search(query, k)?
            .into_iter()
            .map(|(id, score)| (id as i64, score))
            .collect())
    }

    async fn search_fts(&self, _project_id: &str, query: &str, k: usize) -> OmniResult<Vec<(i64, f32)>> {
        let index = self.index.lock();
        Ok(index
            .search_fts(query, k)?
            .into_iter()
            .map(|hit| (hit.chunk_id, hit.rank as f32))
            .collect())
    }

    async fn get_chunks(&self, _project_id: &str, ids: &[i64]) -> OmniResult<Vec<Chunk>> {
        self.index.lock().get_chunks(ids)
    }

    async fn upsert_file(&self, _project_id: &str, file: &FileInfo) -> OmniResult<i64> {
        self.index.lock().upsert_file(file)
    }

    async fn get_file_hash(&self, _project_id: &str, path: &Path) -> OmniResult<Option<String>> {
        self.index.lock().get_file_hash(path)
    }

    async fn get_file_by_path(&self, _project_id: &str, path: &Path) -> OmniResult<Option<FileInfo>> {
        self.index.lock().get_file_by_path(path)
    }

    async fn delete_file(&self, _project_id: &str, path: &Path) -> OmniResult<()> {
        self.index.lock().delete_file(path)
    }

    async fn symbol_ids_for_path(&self, _project_id: &str, path: &Path) -> OmniResult<Vec<i64>> {
        self.index.lock().symbol_ids_for_path(path)
    }

    async fn reindex_file(
        &self,
        _project_id: &str,
        file: &FileInfo,
        chunks: &[Chunk],
        symbols: &[Symbol],
    ) -> OmniResult<(i64, Vec<i64>)> {
        self.index.lock().reindex_file(file, chunks, symbols)
    }

    async fn chunks_for_file(&self, _project_id: &str, file_id: i64) -> OmniResult<Vec<Chunk>> {
        self.index.lock().chunks_for_file(file_id)
    }

    async fn get_file_path_for_chunk(&self, _project_id: &str, chunk_id: i64) -> OmniResult<Option<PathBuf>> {
        self.index.lock().get_file_path_for_chunk(chunk_id)
    }

    async fn get_symbol_by_fqn(&self, _project_id: &str, fqn: &str) -> OmniResult<Option<Symbol>> {
        self.index.lock().get_symbol_by_fqn(fqn)
    }

    async fn get_symbol_by_id(&self, _project_id: &str, id: i64) -> OmniResult<Option<Symbol>> {
        self.index.lock().get_symbol_by_id(id)
    }

    async fn search_symbols_by_name(&self, _project_id: &str, name: &str, limit: usize) -> OmniResult<Vec<Symbol>> {
        self.index.lock().search_symbols_by_name(name, limit)
    }

    async fn get_first_symbol_for_file(&self, _project_id: &str, file_id: i64) -> OmniResult<Option<Symbol>> {
        self.index.lock().get_first_symbol_for_file(file_id)
    }

    async fn all_files_brief(&self, _project_id: &str) -> OmniResult<Vec<(i64, PathBuf, Language)>> {
        self.index.lock().all_files_brief()
    }

    async fn all_chunks(&self, _project_id: &str) -> OmniResult<Vec<Chunk>> {
        self.index.lock().all_chunks()
    }

    async fn statistics(&self, _project_id: &str) -> OmniResult<(usize, usize)> {
        let stats = self.index.lock().statistics()?;
        Ok((stats.file_count, stats.chunk_count))
    }

    async fn clear_all(&self, _project_id: &str) -> OmniResult<()> {
        self.index.lock().clear_all()?;
        self.vectors.lock().clear();
        Ok(())
    }

    async fn flush(&self, _project_id: &str) -> OmniResult<()> {
        self.vectors.lock().save()
    }
}

/// `GraphStore` over this crate's own in-process `DependencyGraph`.
pub struct EmbeddedGraphStore {
    graph: std::sync::Arc<DependencyGraph>,
}

impl EmbeddedGraphStore {
    pub fn new(graph: std::sync::Arc<DependencyGraph>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl GraphStore for EmbeddedGraphStore {
    async fn upsert_nodes(&self, _project_id: &str, symbols: &[Symbol]) -> OmniResult<()> {
        for s in symbols {
            self.graph.add_symbol(s.id)?;
        }
        Ok(())
    }

    async fn upsert_edges(&self, _project_id: &str, edges: &[DependencyEdge]) -> OmniResult<()> {
        for e in edges {
            self.graph.add_edge(e)?;
        }
        Ok(())
    }

    async fn delete_by_file(&self, _project_id: &str, symbol_ids: &[i64]) -> OmniResult<()> {
        self.graph.remove_symbols(symbol_ids)
    }

    async fn neighbors(
        &self,
        _project_id: &str,
        seed: i64,
        edge_kinds: Option<&[DependencyKind]>,
        direction: EdgeDirection,
        depth: usize,
        limit: usize,
    ) -> OmniResult<Subgraph> {
        self.graph.neighbors(seed, edge_kinds, direction, depth, limit)
    }

    async fn counts(&self, _project_id: &str) -> OmniResult<(usize, usize)> {
        Ok((self.graph.node_count(), self.graph.edge_count()))
    }

    async fn has_cycles(&self, _project_id: &str) -> OmniResult<bool> {
        Ok(self.graph.has_cycles())
    }

    async fn clear_all(&self, _project_id: &str) -> OmniResult<()> {
        self.graph.clear();
        Ok(())
    }
}

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

/// In-process LRU `CacheStore`, capped at 4096 entries. TTLs are checked
/// lazily on read; there is no background sweep.
pub struct EmbeddedCacheStore {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

/// Capacity of the in-process LRU cache. Nonzero by construction.
const CACHE_CAPACITY: usize = 4096;

impl EmbeddedCacheStore {
    pub fn new() -> Self {
        let capacity = std::num::NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(std::num::NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }
}

impl Default for EmbeddedCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for EmbeddedCacheStore {
    async fn get(&self, key: &str) -> OmniResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock();
        let fresh = match entries.get(key) {
            Some(entry) => entry.expires_at.map(|t| t > Instant::now()).unwrap_or(true),
            None => return Ok(None),
        };
        if fresh {
            Ok(entries.get(key).map(|e| e.value.clone()))
        } else {
            entries.pop(key);
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> OmniResult<()> {
        self.entries.lock().put(
            key.to_string(),
            CacheEntry {
                value: value.to_vec(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key_prefix: &str) -> OmniResult<()> {
        let mut entries = self.entries.lock();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(key_prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            entries.pop(&key);
        }
        Ok(())
    }
}

/// SQLite-backed `ProjectRegistry`, one `registry.db` shared by every
/// project under a `dataRoot`. Independent of any single project's
/// `MetadataIndex` -- it is the directory that lets `ListProjects` and
/// `InitProject` work before any project-specific store is open.
pub struct EmbeddedProjectRegistry {
    conn: Mutex<Connection>,
}

impl EmbeddedProjectRegistry {
    pub fn open(data_root: &Path) -> OmniResult<Self> {
        std::fs::create_dir_all(data_root)?;
        let conn = Connection::open(data_root.join("registry.db"))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                languages TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                storage_mode TEXT NOT NULL
             );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
        let languages_json: String = row.get("languages")?;
        let languages: Vec<Language> = serde_json::from_str(&languages_json).unwrap_or_default();
        let storage_mode_str: String = row.get("storage_mode")?;
        Ok(Project {
            id: row.get("id")?,
            path: PathBuf::from(row.get::<_, String>("path")?),
            name: row.get("name")?,
            languages,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            storage_mode: StorageMode::from_str_lossy(&storage_mode_str),
        })
    }
}

#[async_trait]
impl ProjectRegistry for EmbeddedProjectRegistry {
    async fn register(&self, path: &Path, storage_mode: StorageMode) -> OmniResult<Project> {
        let canonical = path
            .canonicalize()
            .map_err(|e| OmniError::PathInvalid { path: path.to_path_buf(), reason: e.to_string() })?;
        let path_str = canonical.to_string_lossy().to_string();

        let conn = self.conn.lock();
        if let Some(existing) = conn
            .query_row(
                "SELECT * FROM projects WHERE path = ?1",
                params![path_str],
                Self::row_to_project,
            )
            .optional()?
        {
            return Ok(existing);
        }

        let id = crate::config::Config::defaults(&canonical).project_id();
        let name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.clone());
        let now = now_unix();

        conn.execute(
            "INSERT INTO projects (id, path, name, languages, created_at, updated_at, storage_mode)
             VALUES (?1, ?2, ?3, '[]', ?4, ?4, ?5)",
            params![id, path_str, name, now, storage_mode.as_str()],
        )?;

        Ok(Project {
            id,
            path: canonical,
            name,
            languages: Vec::new(),
            created_at: now,
            updated_at: now,
            storage_mode,
        })
    }

    async fn resolve(&self, project_ref: &str) -> OmniResult<Option<Project>> {
        let conn = self.conn.lock();
        if let Some(p) = conn
            .query_row(
                "SELECT * FROM projects WHERE id = ?1",
                params![project_ref],
                Self::row_to_project,
            )
            .optional()?
        {
            return Ok(Some(p));
        }
        if let Some(p) = conn
            .query_row(
                "SELECT * FROM projects WHERE name = ?1",
                params![project_ref],
                Self::row_to_project,
            )
            .optional()?
        {
            return Ok(Some(p));
        }
        if let Ok(canonical) = Path::new(project_ref).canonicalize() {
            let path_str = canonical.to_string_lossy().to_string();
            if let Some(p) = conn
                .query_row(
                    "SELECT * FROM projects WHERE path = ?1",
                    params![path_str],
                    Self::row_to_project,
                )
                .optional()?
            {
                return Ok(Some(p));
            }
        }
        Ok(None)
    }

    async fn list(&self) -> OmniResult<Vec<Project>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY updated_at DESC")?;
        let rows = stmt.query_map([], Self::row_to_project)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn delete(&self, project_id: &str) -> OmniResult<()> {
        self.conn.lock().execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
        Ok(())
    }

    async fn find_duplicates(&self) -> OmniResult<Vec<Vec<Project>>> {
        let all = self.list().await?;
        let mut by_canonical: HashMap<String, Vec<Project>> = HashMap::new();
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
        let languages_json = serde_json::to_string(languages).map_err(|e| OmniError::Serialization(e.to_string()))?;
        self.conn.lock().execute(
            "UPDATE projects SET languages = ?1, updated_at = ?2 WHERE id = ?3",
            params![languages_json, now_unix(), project_id],
        )?;
        Ok(())
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
