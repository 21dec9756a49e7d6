//! SQLite-backed metadata index: files, chunks, symbols, dependency edges,
//! and FTS5 lexical search.
//!
//! This is the embedded backend's column store. It owns everything the
//! vector and graph stores don't: file manifests (for change detection),
//! chunk bodies (what actually gets returned to callers), symbol
//! fully-qualified names (for dependency resolution), and the FTS5 shadow
//! table lexical search reads from.
//!
//! ## Concurrency
//!
//! SQLite is configured in WAL mode for concurrent reads during writes.
//! Only one writer is allowed at a time (SQLite constraint); the pipeline
//! enforces this with its single-writer-per-project lane.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{OmniError, OmniResult};
use crate::parser::ParserTier;
use crate::types::{Chunk, ChunkKind, DependencyEdge, FileInfo, Language, Symbol, Visibility};

/// Aggregate counts reported by `Status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStatistics {
    /// Number of files in the index.
    pub file_count: usize,
    /// Number of chunks in the index.
    pub chunk_count: usize,
    /// Number of symbols in the index.
    pub symbol_count: usize,
}

/// A lexical search hit: chunk id plus its BM25 rank (more negative = better
/// match; SQLite's `bm25()` returns negated scores).
#[derive(Debug, Clone, Copy)]
pub struct FtsHit {
    /// Matched chunk id.
    pub chunk_id: i64,
    /// Raw BM25 score from SQLite (lower is better).
    pub rank: f64,
}

/// SQLite-backed metadata and full-text search index.
pub struct MetadataIndex {
    conn: Connection,
}

impl MetadataIndex {
    /// Open or create an index database at the given path.
    pub fn open(db_path: &Path) -> OmniResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;

        // Configure for performance
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "cache_size", -64_000)?; // 64MB cache
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let index = Self { conn };
        index.ensure_schema()?;

        Ok(index)
    }

    /// Create all tables and indexes if they don't exist.
    fn ensure_schema(&self) -> OmniResult<()> {
        self.conn
            .execute_batch(include_str!("schema.sql"))
            .map_err(OmniError::from)
    }

    /// Clear every file, chunk, symbol, dependency edge, and cached
    /// standard, as part of `full_reindex`. The database file itself (and
    /// its schema) is left in place.
    pub fn clear_all(&self) -> OmniResult<()> {
        self.conn.execute_batch(
            "DELETE FROM files;
             DELETE FROM standards_cache;",
        )?;
        Ok(())
    }

    /// Run an integrity check on the database.
    pub fn check_integrity(&self) -> OmniResult<bool> {
        let result: String =
            self.conn
                .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Get the raw connection for advanced queries.
    /// Use sparingly -- prefer adding methods to this struct.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // -----------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------

    /// Insert or update a file's manifest row by its path. Returns the
    /// file's database id.
    pub fn upsert_file(&self, file: &FileInfo) -> OmniResult<i64> {
        let path_str = file.path.to_string_lossy().to_string();
        let now = now_unix();

        self.conn.execute(
            "INSERT INTO files (rel_path, language, content_hash, size_bytes, parser_tier, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(rel_path) DO UPDATE SET
                language = excluded.language,
                content_hash = excluded.content_hash,
                size_bytes = excluded.size_bytes,
                indexed_at = excluded.indexed_at",
            params![
                path_str,
                file.language.as_str(),
                file.content_hash,
                file.size_bytes as i64,
                ParserTier::Ast.as_str(),
                now,
            ],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM files WHERE rel_path = ?1",
            params![path_str],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Record which parser tier actually produced a file's chunks (AST,
    /// regex, or fallback), so `Status`/`ParserTiers` can report real
    /// degradation instead of assuming full AST coverage.
    pub fn set_parser_tier(&self, file_id: i64, tier: ParserTier) -> OmniResult<()> {
        self.conn.execute(
            "UPDATE files SET parser_tier = ?1 WHERE id = ?2",
            params![tier.as_str(), file_id],
        )?;
        Ok(())
    }

    /// Look up the stored content hash for a file, for change detection.
    pub fn get_file_hash(&self, path: &Path) -> OmniResult<Option<String>> {
        let path_str = path.to_string_lossy().to_string();
        self.conn
            .query_row(
                "SELECT content_hash FROM files WHERE rel_path = ?1",
                params![path_str],
                |row| row.get(0),
            )
            .optional()
            .map_err(OmniError::from)
    }

    /// Delete a file and (via `ON DELETE CASCADE`) all of its chunks,
    /// symbols, and dependency edges.
    pub fn delete_file(&self, path: &Path) -> OmniResult<()> {
        let path_str = path.to_string_lossy().to_string();
        self.conn
            .execute("DELETE FROM files WHERE rel_path = ?1", params![path_str])?;
        self.invalidate_all_standards_cache()?;
        Ok(())
    }

    /// Symbol ids defined in a file, by path. Resolved before `delete_file`
    /// so the caller can evict the same ids from the in-memory dependency
    /// graph (which has no notion of files, only symbol ids).
    pub fn symbol_ids_for_path(&self, path: &Path) -> OmniResult<Vec<i64>> {
        let path_str = path.to_string_lossy().to_string();
        let mut stmt = self.conn.prepare(
            "SELECT s.id FROM symbols s JOIN files f ON f.id = s.file_id WHERE f.rel_path = ?1",
        )?;
        let rows = stmt.query_map(params![path_str], |row| row.get::<_, i64>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Returns the first symbol defined in a file, ordered by line number.
    /// Used as an anchor node for import-level dependency edges.
    pub fn get_first_symbol_for_file(&self, file_id: i64) -> OmniResult<Option<Symbol>> {
        self.conn
            .query_row(
                "SELECT id, name, fqn, kind, file_id, line, chunk_id
                 FROM symbols WHERE file_id = ?1 ORDER BY line ASC LIMIT 1",
                params![file_id],
                row_to_symbol,
            )
            .optional()
            .map_err(OmniError::from)
    }

    // -----------------------------------------------------------------
    // Chunks + symbols (atomic reindex)
    // -----------------------------------------------------------------

    /// Replace all chunks and symbols for a file in a single transaction:
    /// deletes the old rows, inserts the new ones, and returns the new
    /// chunk ids in the same order as the `chunks` slice.
    pub fn reindex_file(
        &mut self,
        file: &FileInfo,
        chunks: &[Chunk],
        symbols: &[Symbol],
    ) -> OmniResult<(i64, Vec<i64>)> {
        let file_id = file.id;
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM chunks WHERE file_id = ?1", params![file_id])?;

        let mut chunk_ids = Vec::with_capacity(chunks.len());
        {
            let mut insert_chunk = tx.prepare(
                "INSERT INTO chunks
                    (file_id, symbol_path, kind, visibility, line_start, line_end,
                     content, doc_comment, token_count, weight, vector_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for chunk in chunks {
                insert_chunk.execute(params![
                    file_id,
                    chunk.symbol_path,
                    chunk.kind.as_str(),
                    chunk.visibility.as_str(),
                    chunk.line_start,
                    chunk.line_end,
                    chunk.content,
                    chunk.doc_comment,
                    chunk.token_count,
                    chunk.weight,
                    chunk.vector_id.map(|v| v as i64),
                ])?;
                chunk_ids.push(tx.last_insert_rowid());
            }
        }

        {
            let mut insert_symbol = tx.prepare(
                "INSERT INTO symbols (file_id, chunk_id, name, fqn, kind, line)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(fqn) DO UPDATE SET
                    file_id = excluded.file_id,
                    chunk_id = excluded.chunk_id,
                    name = excluded.name,
                    kind = excluded.kind,
                    line = excluded.line",
            )?;

            for (i, symbol) in symbols.iter().enumerate() {
                // Symbols are built 1:1 from chunks in the same order in
                // `pipeline::process_file`, so `i` indexes into `chunk_ids`.
                let chunk_id = chunk_ids.get(i).copied();
                insert_symbol.execute(params![
                    file_id,
                    chunk_id,
                    symbol.name,
                    symbol.fqn,
                    symbol.kind.as_str(),
                    symbol.line,
                ])?;
            }
        }

        tx.commit()?;
        self.invalidate_all_standards_cache()?;
        Ok((file_id, chunk_ids))
    }

    /// Record the vector-store id assigned to a chunk after embedding.
    pub fn set_chunk_vector_id(&self, chunk_id: i64, vector_id: u64) -> OmniResult<()> {
        self.conn.execute(
            "UPDATE chunks SET vector_id = ?1 WHERE id = ?2",
            params![vector_id as i64, chunk_id],
        )?;
        Ok(())
    }

    /// Fetch a single chunk by id.
    pub fn get_chunk(&self, chunk_id: i64) -> OmniResult<Option<Chunk>> {
        self.conn
            .query_row(
                "SELECT id, file_id, symbol_path, kind, visibility, line_start, line_end,
                        content, doc_comment, token_count, weight, vector_id
                 FROM chunks WHERE id = ?1",
                params![chunk_id],
                row_to_chunk,
            )
            .optional()
            .map_err(OmniError::from)
    }

    /// Fetch chunks by id, preserving the order of `ids`. Ids with no
    /// matching row are silently skipped (the caller may have a stale
    /// vector-index entry for a chunk deleted since the last save).
    pub fn get_chunks(&self, ids: &[i64]) -> OmniResult<Vec<Chunk>> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(chunk) = self.get_chunk(id)? {
                out.push(chunk);
            }
        }
        Ok(out)
    }

    /// Resolve a chunk's owning file path, for building `SearchResult`.
    pub fn get_file_path_for_chunk(&self, chunk_id: i64) -> OmniResult<Option<std::path::PathBuf>> {
        self.conn
            .query_row(
                "SELECT f.rel_path FROM files f
                 JOIN chunks c ON c.file_id = f.id
                 WHERE c.id = ?1",
                params![chunk_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map(|opt| opt.map(std::path::PathBuf::from))
            .map_err(OmniError::from)
    }

    // -----------------------------------------------------------------
    // Lexical search (FTS5)
    // -----------------------------------------------------------------

    /// Run an FTS5 `MATCH` query over chunk content + symbol path, ranked
    /// by BM25. Returns up to `limit` hits, best match first.
    pub fn search_fts(&self, query: &str, limit: usize) -> OmniResult<Vec<FtsHit>> {
        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT rowid, bm25(chunks_fts) AS rank
             FROM chunks_fts WHERE chunks_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![sanitized, limit as i64], |row| {
            Ok(FtsHit {
                chunk_id: row.get(0)?,
                rank: row.get(1)?,
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }

    // -----------------------------------------------------------------
    // Symbols
    // -----------------------------------------------------------------

    /// Exact lookup of a symbol by fully-qualified name.
    pub fn get_symbol_by_fqn(&self, fqn: &str) -> OmniResult<Option<Symbol>> {
        self.conn
            .query_row(
                "SELECT id, name, fqn, kind, file_id, line, chunk_id
                 FROM symbols WHERE fqn = ?1",
                params![fqn],
                row_to_symbol,
            )
            .optional()
            .map_err(OmniError::from)
    }

    /// Exact lookup of a symbol by database id. Used to hydrate the node
    /// ids `DependencyGraph::upstream`/`downstream` return into full
    /// `Symbol` records for `GetRelationships`.
    pub fn get_symbol_by_id(&self, id: i64) -> OmniResult<Option<Symbol>> {
        self.conn
            .query_row(
                "SELECT id, name, fqn, kind, file_id, line, chunk_id
                 FROM symbols WHERE id = ?1",
                params![id],
                row_to_symbol,
            )
            .optional()
            .map_err(OmniError::from)
    }

    /// Lookup by short name, used to resolve unqualified references within
    /// a file (a call site naming a function without its module prefix).
    pub fn search_symbols_by_name(&self, name: &str, limit: usize) -> OmniResult<Vec<Symbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, fqn, kind, file_id, line, chunk_id
             FROM symbols WHERE name = ?1 LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![name, limit as i64], row_to_symbol)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// Fill in the `fqn` field of every node in a `Subgraph` produced by
    /// `DependencyGraph::neighbors`, which only knows symbol ids. Nodes
    /// whose symbol has since been deleted are dropped rather than left
    /// with an empty name.
    pub fn hydrate_subgraph(&self, subgraph: &mut crate::types::Subgraph) -> OmniResult<()> {
        subgraph.nodes.retain_mut(|node| match self.get_symbol_by_id(node.id) {
            Ok(Some(symbol)) => {
                node.fqn = symbol.fqn;
                true
            }
            _ => false,
        });
        Ok(())
    }

    // -----------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------

    /// Insert a dependency edge (idempotent: the schema's primary key
    /// de-duplicates `(source, target, kind)` triples).
    pub fn insert_dependency(&self, edge: &DependencyEdge) -> OmniResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO dependencies (source_id, target_id, kind)
             VALUES (?1, ?2, ?3)",
            params![edge.source_id, edge.target_id, edge.kind.as_str()],
        )?;
        Ok(())
    }

    /// Total number of dependency edges in the store.
    pub fn dependency_count(&self) -> OmniResult<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM dependencies", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // -----------------------------------------------------------------
    // Standards cache
    // -----------------------------------------------------------------

    /// Fetch a cached standards-detector result by its
    /// `standards:{projectId}:{category}` key.
    pub fn get_cached_standard(&self, cache_key: &str) -> OmniResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT payload FROM standards_cache WHERE cache_key = ?1",
                params![cache_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(OmniError::from)
    }

    /// Store (or replace) a standards-detector result.
    pub fn set_cached_standard(&self, cache_key: &str, payload: &str) -> OmniResult<()> {
        self.conn.execute(
            "INSERT INTO standards_cache (cache_key, payload, computed_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(cache_key) DO UPDATE SET payload = excluded.payload, computed_at = excluded.computed_at",
            params![cache_key, payload, now_unix()],
        )?;
        Ok(())
    }

    /// Invalidate every cached standards result for a project. Called after
    /// any change that could shift category membership.
    pub fn invalidate_standards_cache(&self, project_prefix: &str) -> OmniResult<()> {
        self.conn.execute(
            "DELETE FROM standards_cache WHERE cache_key LIKE ?1",
            params![format!("standards:{project_prefix}:%")],
        )?;
        Ok(())
    }

    /// Drop every cached standards result regardless of project id. Each
    /// metadata index belongs to exactly one project, so this is what
    /// `reindex_file`/`delete_file` call on every file-level write.
    fn invalidate_all_standards_cache(&self) -> OmniResult<()> {
        self.conn.execute("DELETE FROM standards_cache", [])?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------

    /// Aggregate row counts for `Status`.
    pub fn statistics(&self) -> OmniResult<IndexStatistics> {
        let file_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        let chunk_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        let symbol_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;

        Ok(IndexStatistics {
            file_count: file_count as usize,
            chunk_count: chunk_count as usize,
            symbol_count: symbol_count as usize,
        })
    }

    /// Every indexed file's full manifest row, for `ListProjects`-style
    /// listings and the module map.
    pub fn get_all_files(&self) -> OmniResult<Vec<FileInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, rel_path, language, content_hash, size_bytes FROM files",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let path: String = row.get(1)?;
            let lang: String = row.get(2)?;
            let content_hash: String = row.get(3)?;
            let size_bytes: i64 = row.get(4)?;
            Ok(FileInfo {
                id,
                path: std::path::PathBuf::from(path),
                language: language_from_db_str(&lang),
                content_hash,
                size_bytes: size_bytes as u64,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Look up a single file's manifest row by its relative path.
    pub fn get_file_by_path(&self, path: &Path) -> OmniResult<Option<FileInfo>> {
        let path_str = path.to_string_lossy().to_string();
        self.conn
            .query_row(
                "SELECT id, rel_path, language, content_hash, size_bytes FROM files WHERE rel_path = ?1",
                params![path_str],
                |row| {
                    let id: i64 = row.get(0)?;
                    let rel_path: String = row.get(1)?;
                    let lang: String = row.get(2)?;
                    let content_hash: String = row.get(3)?;
                    let size_bytes: i64 = row.get(4)?;
                    Ok(FileInfo {
                        id,
                        path: std::path::PathBuf::from(rel_path),
                        language: language_from_db_str(&lang),
                        content_hash,
                        size_bytes: size_bytes as u64,
                    })
                },
            )
            .optional()
            .map_err(OmniError::from)
    }

    /// Every chunk belonging to a single file, ordered by line number. Used
    /// by `GetFileContext` and `get_symbol`.
    pub fn get_chunks_for_file(&self, file_id: i64) -> OmniResult<Vec<Chunk>> {
        self.chunks_for_file(file_id)
    }

    /// Iterate over every indexed file's id, relative path, and language,
    /// for the standards detector and incremental-reindex deletion diffing.
    pub fn all_files_brief(&self) -> OmniResult<Vec<(i64, std::path::PathBuf, Language)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, rel_path, language FROM files")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let path: String = row.get(1)?;
            let lang: String = row.get(2)?;
            Ok((id, path, lang))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, path, lang) = row?;
            out.push((id, std::path::PathBuf::from(path), language_from_db_str(&lang)));
        }
        Ok(out)
    }

    /// Every chunk in the project, unordered. Used by the standards
    /// detector, which needs to scan all chunk bodies regardless of file.
    pub fn all_chunks(&self) -> OmniResult<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_id, symbol_path, kind, visibility, line_start, line_end,
                    content, doc_comment, token_count, weight, vector_id
             FROM chunks",
        )?;
        let rows = stmt.query_map([], row_to_chunk)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All chunks belonging to a single file, ordered by line number. Used
    /// by `GetFileContext`.
    pub fn chunks_for_file(&self, file_id: i64) -> OmniResult<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_id, symbol_path, kind, visibility, line_start, line_end,
                    content, doc_comment, token_count, weight, vector_id
             FROM chunks WHERE file_id = ?1 ORDER BY line_start ASC",
        )?;
        let rows = stmt.query_map(params![file_id], row_to_chunk)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn row_to_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<Symbol> {
    let kind_str: String = row.get(3)?;
    Ok(Symbol {
        id: row.get(0)?,
        name: row.get(1)?,
        fqn: row.get(2)?,
        kind: ChunkKind::from_str_lossy(&kind_str),
        file_id: row.get(4)?,
        line: row.get(5)?,
        chunk_id: row.get(6)?,
    })
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let kind_str: String = row.get(3)?;
    let visibility_str: String = row.get(4)?;
    let vector_id: Option<i64> = row.get(11)?;
    Ok(Chunk {
        id: row.get(0)?,
        file_id: row.get(1)?,
        symbol_path: row.get(2)?,
        kind: ChunkKind::from_str_lossy(&kind_str),
        visibility: Visibility::from_str_lossy(&visibility_str),
        line_start: row.get(5)?,
        line_end: row.get(6)?,
        content: row.get(7)?,
        doc_comment: row.get(8)?,
        token_count: row.get(9)?,
        weight: row.get(10)?,
        vector_id: vector_id.map(|v| v as u64),
    })
}

fn language_from_db_str(s: &str) -> Language {
    // `Language` doesn't expose a string parser (only `from_extension`), so
    // round-trip through the canonical string each variant serializes to.
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

/// Strip FTS5 special characters that would otherwise make the query a
/// syntax error (`"`, bare `*`, unbalanced parens), then turn it into a
/// prefix-match OR-query so short natural-language queries still hit.
fn sanitize_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() || c == '_' { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .map(|term| format!("{term}*"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkKind, Visibility};
    use std::path::PathBuf;

    fn sample_file(path: &str) -> FileInfo {
        FileInfo {
            id: 0,
            path: PathBuf::from(path),
            language: Language::Python,
            content_hash: "abc123".into(),
            size_bytes: 42,
        }
    }

    #[test]
    fn test_open_creates_database() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("test.db");
        let index = MetadataIndex::open(&db_path).expect("open database");
        assert!(index.check_integrity().expect("check integrity"));
    }

    #[test]
    fn test_upsert_and_get_file_hash() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = MetadataIndex::open(&dir.path().join("index.db")).expect("open");
        let file = sample_file("src/main.py");

        let id = index.upsert_file(&file).expect("upsert");
        assert!(id > 0);

        let hash = index.get_file_hash(&file.path).expect("get hash");
        assert_eq!(hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_reindex_file_and_fts_search() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut index = MetadataIndex::open(&dir.path().join("index.db")).expect("open");
        let mut file = sample_file("src/greet.py");
        let file_id = index.upsert_file(&file).expect("upsert");
        file.id = file_id;

        let chunk = Chunk {
            id: 0,
            file_id,
            symbol_path: "greet.say_hello".into(),
            kind: ChunkKind::Function,
            visibility: Visibility::Public,
            line_start: 1,
            line_end: 3,
            content: "def say_hello(name):\n    return f'hello {name}'".into(),
            doc_comment: None,
            token_count: 12,
            weight: 0.85,
            vector_id: None,
        };
        let symbol = Symbol {
            id: 0,
            name: "say_hello".into(),
            fqn: "greet.say_hello".into(),
            kind: ChunkKind::Function,
            file_id,
            line: 1,
            chunk_id: None,
        };

        let (returned_file_id, chunk_ids) =
            index.reindex_file(&file, &[chunk], &[symbol]).expect("reindex");
        assert_eq!(returned_file_id, file_id);
        assert_eq!(chunk_ids.len(), 1);

        let hits = index.search_fts("hello", 10).expect("fts search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, chunk_ids[0]);

        let resolved = index.get_symbol_by_fqn("greet.say_hello").expect("lookup");
        assert!(resolved.is_some());
    }

    #[test]
    fn test_delete_file_cascades() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut index = MetadataIndex::open(&dir.path().join("index.db")).expect("open");
        let mut file = sample_file("src/doomed.py");
        let file_id = index.upsert_file(&file).expect("upsert");
        file.id = file_id;

        let chunk = Chunk {
            id: 0,
            file_id,
            symbol_path: "doomed.run".into(),
            kind: ChunkKind::Function,
            visibility: Visibility::Public,
            line_start: 1,
            line_end: 2,
            content: "def run():\n    pass".into(),
            doc_comment: None,
            token_count: 4,
            weight: 0.85,
            vector_id: None,
        };
        index.reindex_file(&file, &[chunk], &[]).expect("reindex");

        index.delete_file(&file.path).expect("delete");
        let stats = index.statistics().expect("stats");
        assert_eq!(stats.file_count, 0);
        assert_eq!(stats.chunk_count, 0);
    }

    #[test]
    fn test_standards_cache_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = MetadataIndex::open(&dir.path().join("index.db")).expect("open");
        index
            .set_cached_standard("standards:deadbeefcafef00d:error_handling", "{}")
            .expect("set cache");
        let cached = index
            .get_cached_standard("standards:deadbeefcafef00d:error_handling")
            .expect("get cache");
        assert_eq!(cached.as_deref(), Some("{}"));

        index
            .invalidate_standards_cache("deadbeefcafef00d")
            .expect("invalidate");
        let cached = index
            .get_cached_standard("standards:deadbeefcafef00d:error_handling")
            .expect("get cache");
        assert!(cached.is_none());
    }
}
