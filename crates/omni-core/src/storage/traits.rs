//! The four storage seams: `VectorStore`, `GraphStore`, `CacheStore`, and
//! `ProjectRegistry`. Each has exactly two realizations (`storage::embedded`,
//! `storage::server`), selected per project by `Config::storage.mode`.
//!
//! Every trait is `Send + Sync` and object-safe so callers can hold a
//! `Box<dyn VectorStore>` without caring which backend is underneath --
//! `IndexService` resolves the concrete type once, at project-open time,
//! and never matches on it again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::OmniResult;
use crate::types::{
    Chunk, DependencyEdge, DependencyKind, EdgeDirection, FileInfo, Language, Project, Subgraph,
    Symbol,
};

/// A chunk body plus its embedding, as produced by the ingest pipeline for
/// one file. In embedded mode the chunk row itself is already persisted by
/// `MetadataIndex::reindex_file`, so `EmbeddedVectorStore::upsert_chunks`
/// only attaches the embedding; in server mode there is no separate
/// metadata store, so `PostgresVectorStore::upsert_chunks` writes the full
/// row. Both are valid realizations of the same contract: after this call,
/// `get_chunks`/`search_ann`/`search_fts` see the chunk.
#[derive(Debug, Clone)]
pub struct ChunkUpsert {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Hybrid lexical/vector store over a single project's chunks, plus the
/// file manifest and symbol table those chunks belong to. A project's
/// files, chunks, and symbols are always written and queried together (a
/// chunk's `file_id` and a symbol's `chunk_id` are foreign keys into the
/// same store), so this trait -- not a separate metadata trait -- is
/// where that relational surface lives. `GraphStore` only sees bare
/// symbol ids and the edges between them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or update a file's manifest row. Returns the file's store id.
    async fn upsert_file(&self, project_id: &str, file: &FileInfo) -> OmniResult<i64>;

    /// Stored content hash for a file, for change-detection skip checks.
    async fn get_file_hash(&self, project_id: &str, path: &Path) -> OmniResult<Option<String>>;

    /// Look up a file's manifest row by its project-relative path.
    async fn get_file_by_path(&self, project_id: &str, path: &Path) -> OmniResult<Option<FileInfo>>;

    /// Delete a file and cascade to its chunks and symbols.
    async fn delete_file(&self, project_id: &str, path: &Path) -> OmniResult<()>;

    /// Symbol ids defined in a file, resolved before `delete_file` so the
    /// caller can evict the same ids from the dependency graph.
    async fn symbol_ids_for_path(&self, project_id: &str, path: &Path) -> OmniResult<Vec<i64>>;

    /// Atomically replace a file's chunks and symbols: delete the old rows,
    /// insert the new ones, return the file id and the new chunk ids in the
    /// same order as `chunks`.
    async fn reindex_file(
        &self,
        project_id: &str,
        file: &FileInfo,
        chunks: &[Chunk],
        symbols: &[Symbol],
    ) -> OmniResult<(i64, Vec<i64>)>;

    /// Insert or replace the given chunks' embeddings (the chunk rows
    /// themselves were already written by `reindex_file`).
    async fn upsert_chunks(&self, project_id: &str, chunks: &[ChunkUpsert]) -> OmniResult<()>;

    /// Drop every chunk embedding belonging to a file, ahead of re-ingestion
    /// or file deletion. `chunk_ids` is the set of ids owned by that file.
    async fn delete_by_file(&self, project_id: &str, chunk_ids: &[i64]) -> OmniResult<()>;

    /// Approximate nearest-neighbor search, cosine similarity, best first.
    async fn search_ann(&self, project_id: &str, query: &[f32], k: usize) -> OmniResult<Vec<(i64, f32)>>;

    /// BM25-ranked full-text search over chunk content, best first.
    async fn search_fts(&self, project_id: &str, query: &str, k: usize) -> OmniResult<Vec<(i64, f32)>>;

    /// Fetch chunk bodies by id, preserving the order of `ids` and silently
    /// dropping ids that no longer exist (e.g. a file deleted since search).
    async fn get_chunks(&self, project_id: &str, ids: &[i64]) -> OmniResult<Vec<Chunk>>;

    /// All chunks belonging to a single file, ordered by line number.
    async fn chunks_for_file(&self, project_id: &str, file_id: i64) -> OmniResult<Vec<Chunk>>;

    /// Resolve a chunk's owning file path.
    async fn get_file_path_for_chunk(&self, project_id: &str, chunk_id: i64) -> OmniResult<Option<PathBuf>>;

    /// Exact lookup of a symbol by fully-qualified name.
    async fn get_symbol_by_fqn(&self, project_id: &str, fqn: &str) -> OmniResult<Option<Symbol>>;

    /// Exact lookup of a symbol by store id.
    async fn get_symbol_by_id(&self, project_id: &str, id: i64) -> OmniResult<Option<Symbol>>;

    /// Lookup by short name, for resolving unqualified references.
    async fn search_symbols_by_name(&self, project_id: &str, name: &str, limit: usize) -> OmniResult<Vec<Symbol>>;

    /// First symbol defined in a file, ordered by line, used as an anchor
    /// node for import-level dependency edges and path-based graph seeds.
    async fn get_first_symbol_for_file(&self, project_id: &str, file_id: i64) -> OmniResult<Option<Symbol>>;

    /// Every indexed file's id, relative path, and language.
    async fn all_files_brief(&self, project_id: &str) -> OmniResult<Vec<(i64, PathBuf, Language)>>;

    /// Every chunk in the project, unordered, for the standards detector.
    async fn all_chunks(&self, project_id: &str) -> OmniResult<Vec<Chunk>>;

    /// Aggregate file and chunk counts, for `Status`.
    async fn statistics(&self, project_id: &str) -> OmniResult<(usize, usize)>;

    /// Drop every file, chunk, and symbol for a project, as part of a full
    /// reindex. Leaves the store itself (schema, connection) in place.
    async fn clear_all(&self, project_id: &str) -> OmniResult<()>;

    /// Flush any buffered writes to durable storage. A no-op for backends
    /// that persist every write immediately (the embedded flat ANN index
    /// batches writes in memory and needs this called before process exit).
    async fn flush(&self, project_id: &str) -> OmniResult<()>;
}

/// Symbol dependency graph over a single project.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Register symbols as graph nodes (a no-op for ids already present).
    async fn upsert_nodes(&self, project_id: &str, symbols: &[Symbol]) -> OmniResult<()>;

    /// Add dependency edges between already-registered symbols.
    async fn upsert_edges(&self, project_id: &str, edges: &[DependencyEdge]) -> OmniResult<()>;

    /// Remove every node and edge belonging to a file's symbols, ahead of
    /// re-ingestion or file deletion.
    async fn delete_by_file(&self, project_id: &str, symbol_ids: &[i64]) -> OmniResult<()>;

    /// Breadth-first traversal from `seed`, bounded by `depth` hops and
    /// `limit` visited nodes. `edge_kinds` of `None` matches every kind.
    async fn neighbors(
        &self,
        project_id: &str,
        seed: i64,
        edge_kinds: Option<&[DependencyKind]>,
        direction: EdgeDirection,
        depth: usize,
        limit: usize,
    ) -> OmniResult<Subgraph>;

    /// Total node and edge counts, for `Status`.
    async fn counts(&self, project_id: &str) -> OmniResult<(usize, usize)>;

    /// Whether the graph currently contains a cycle, for `Status`.
    async fn has_cycles(&self, project_id: &str) -> OmniResult<bool>;

    /// Drop every node and edge for a project, as part of a full reindex.
    async fn clear_all(&self, project_id: &str) -> OmniResult<()>;
}

/// Opaque key/value cache, namespaced by the caller via key prefixing (e.g.
/// `standards:{projectId}:{category}`). Used for coding-standards detection
/// results and anything else worth memoizing across Tool API calls.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a cached value, or `None` on a miss or expired entry.
    async fn get(&self, key: &str) -> OmniResult<Option<Vec<u8>>>;

    /// Store a value, optionally with a time-to-live after which it expires.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> OmniResult<()>;

    /// Drop every entry whose key starts with `key_prefix`.
    async fn invalidate(&self, key_prefix: &str) -> OmniResult<()>;
}

/// Cross-project directory: every checkout `InitProject` has ever seen,
/// independent of which single project is "hot" in the current process.
#[async_trait]
pub trait ProjectRegistry: Send + Sync {
    /// Register a new project rooted at `path`, or return the existing one
    /// if this exact canonical path is already registered.
    async fn register(&self, path: &Path, storage_mode: crate::types::StorageMode) -> OmniResult<Project>;

    /// Resolve a project reference: an exact id, an exact name, or a path
    /// that canonicalizes to a registered project's root.
    async fn resolve(&self, project_ref: &str) -> OmniResult<Option<Project>>;

    /// All registered projects, most recently updated first.
    async fn list(&self) -> OmniResult<Vec<Project>>;

    /// Deregister a project. Does not touch its on-disk data directory;
    /// callers that want that removed do so explicitly.
    async fn delete(&self, project_id: &str) -> OmniResult<()>;

    /// Groups of projects whose canonical path resolves to the same
    /// filesystem location (e.g. registered once via a symlink and once via
    /// its target) -- surfaced so `ListProjects` can flag them for cleanup.
    async fn find_duplicates(&self) -> OmniResult<Vec<Vec<Project>>>;

    /// Update the `updated_at` timestamp and `languages` for a project,
    /// called after each successful reindex.
    async fn touch(&self, project_id: &str, languages: &[crate::types::Language]) -> OmniResult<()>;
}
