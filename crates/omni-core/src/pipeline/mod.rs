//! Pipeline orchestrator.
//!
//! Wires together all subsystems into a coherent indexing + query engine.
//! This is the top-level public API of omni-core.
//!
//! ## Architecture
//!
//! The Engine owns the project's storage seam (`storage::Stores`: a
//! `VectorStore`, a `GraphStore`, and a `CacheStore`, selected per
//! `Config::storage.mode` at construction time) and coordinates the
//! pipeline's lifecycle:
//!
//! ```text
//! watcher --> pipeline channel --> process_event() --> parser --> chunker
//!                                                         |
//!                                                         v
//!                                                     embedder --> VectorStore
//!                                                         |
//!                                                         v
//!                                                     GraphStore
//! ```
//!
//! Search queries are handled via `SearchEngine`, which reads from the same
//! `VectorStore`/`GraphStore` trait objects rather than a concrete index --
//! that's what lets `storageMode = server`/`auto` actually change where an
//! `Engine`'s data lives.

use std::path::Path;

use tokio::sync::mpsc;

use crate::chunker;
use crate::config::{Config, ResumeCheckpoint, ResumePhase};
use crate::embedder::Embedder;
use crate::error::{OmniError, OmniResult};
use crate::parser;
use crate::search::SearchEngine;
use crate::storage::{ChunkUpsert, Stores};
use crate::types::{
    ApplyChangesResult, DependencyEdge, DependencyKind, FileChangeError, FileChangeKind,
    FileChangeRequest, FileInfo, Language, PipelineEvent, SearchResult, Symbol,
};
use crate::watcher::FileWatcher;

/// The main OmniContext engine.
///
/// This is the primary entry point for the library. It owns the project's
/// resolved storage backend and coordinates the pipeline's lifecycle.
pub struct Engine {
    config: Config,
    /// Deterministic per-project id, namespacing every store call.
    project_id: String,
    /// The project's resolved `VectorStore`/`GraphStore`/`CacheStore` trio.
    stores: Stores,
    /// ONNX embedding model for semantic embeddings.
    embedder: Embedder,
    /// Hybrid search engine (RRF fusion).
    search_engine: SearchEngine,
}

impl Engine {
    /// Create a new engine for the given repository.
    ///
    /// Initializes all subsystems: config, storage, embedder, and search
    /// engine.
    pub async fn new(repo_path: &Path) -> OmniResult<Self> {
        let config = Config::load(repo_path)?;
        Self::with_config(config).await
    }

    /// Create an engine with explicit configuration (for testing).
    pub async fn with_config(config: Config) -> OmniResult<Self> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)?;

        let stores = crate::storage::open(&config, &data_dir, config.embedding.dimensions).await?;
        let embedder = Embedder::new(&config.embedding)?;
        let search_engine = SearchEngine::new(config.search.rrf_k, config.search.token_budget);
        let project_id = config.project_id();

        tracing::info!(
            repo = %config.repo_path.display(),
            data_dir = %data_dir.display(),
            storage_mode = ?stores.resolved_mode,
            embedding_available = embedder.is_available(),
            "engine initialized"
        );

        Ok(Self {
            config,
            project_id,
            stores,
            embedder,
            search_engine,
        })
    }

    /// Start the indexing pipeline.
    ///
    /// 1. Performs a full directory scan
    /// 2. Processes each discovered file (parse -> chunk -> embed -> store)
    /// 3. Flushes the vector store to disk
    ///
    /// Progress is checkpointed to `resume.json` in the project's data
    /// directory as each file completes, and cleared on a clean finish --
    /// a crash mid-run leaves the checkpoint in place so the next `run_index`
    /// can report how far the previous pass got before it was interrupted.
    /// Resumption itself is just re-scanning: `process_file`'s content-hash
    /// check skips any file whose hash hasn't changed since it was last
    /// stored, so a restarted run never re-embeds work the crashed run
    /// already finished.
    pub async fn run_index(&self) -> OmniResult<IndexResult> {
        let repo_path = self.config.repo_path.clone();
        let data_dir = self.config.data_dir();
        let (tx, mut rx) = mpsc::channel::<PipelineEvent>(1024);

        let scanning = ResumeCheckpoint {
            phase: ResumePhase::Scanning,
            cursor: String::new(),
            files_done: 0,
            files_total: 0,
        };
        if let Err(e) = scanning.write(&data_dir) {
            tracing::warn!(error = %e, "failed to write resume checkpoint");
        }

        // Create file watcher for scanning
        let watcher = FileWatcher::new(
            &repo_path,
            &self.config.watcher,
            &self.config.indexing,
        );

        // Full directory scan. `full_scan` does blocking directory I/O and
        // uses `blocking_send`, so it runs on a blocking thread rather than
        // the async worker that's about to start draining `rx`.
        let scan_tx = tx.clone();
        let file_count = tokio::task::spawn_blocking(move || watcher.full_scan(&scan_tx))
            .await
            .map_err(|e| OmniError::Internal(format!("scan task panicked: {e}")))??;
        tracing::info!(files = file_count, "scan complete, processing files");

        // Close the sender side so the receiver will drain
        drop(tx);

        let mut result = IndexResult::default();
        let mut seen_paths: std::collections::HashSet<std::path::PathBuf> =
            std::collections::HashSet::new();
        let mut files_done = 0usize;

        // Process each event
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::FileChanged { path } => {
                    seen_paths.insert(path.clone());
                    match self.process_file(&path).await {
                        Ok(stats) => {
                            result.files_processed += 1;
                            result.chunks_created += stats.chunks;
                            result.symbols_extracted += stats.symbols;
                            result.embeddings_generated += stats.embeddings;
                        }
                        Err(e) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "failed to process file"
                            );
                            result.files_failed += 1;
                        }
                    }

                    files_done += 1;
                    let progress = ResumeCheckpoint {
                        phase: ResumePhase::Processing,
                        cursor: path.display().to_string(),
                        files_done,
                        files_total: file_count,
                    };
                    if let Err(e) = progress.write(&data_dir) {
                        tracing::warn!(error = %e, "failed to update resume checkpoint");
                    }
                }
                PipelineEvent::FileDeleted { path } => {
                    if let Err(e) = self.delete_file_internal(&path).await {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to delete file from index"
                        );
                    }
                }
                PipelineEvent::FullScan => {
                    // Already done above
                }
                PipelineEvent::Shutdown => {
                    break;
                }
            }
        }

        // Diff stage's `toRemove`: anything still in the index but absent
        // from this scan's discovered set has been deleted on disk since
        // the last run (the watcher's FileDeleted events only cover files
        // deleted *during* a live watch, not between two cold `Init`s).
        match self.stores.vector.all_files_brief(&self.project_id).await {
            Ok(existing) => {
                for (_id, path, _lang) in existing {
                    if !seen_paths.contains(&path) {
                        match self.delete_file_internal(&path).await {
                            Ok(()) => result.files_removed += 1,
                            Err(e) => tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "failed to remove stale file from index"
                            ),
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to list indexed files for deletion diff"),
        }

        // Persist vector store to disk
        if let Err(e) = self.stores.vector.flush(&self.project_id).await {
            tracing::warn!(error = %e, "failed to persist vector index");
        }

        if let Err(e) = ResumeCheckpoint::clear(&data_dir) {
            tracing::warn!(error = %e, "failed to clear resume checkpoint after clean finish");
        }

        tracing::info!(
            files = result.files_processed,
            chunks = result.chunks_created,
            symbols = result.symbols_extracted,
            embeddings = result.embeddings_generated,
            removed = result.files_removed,
            failed = result.files_failed,
            "indexing complete"
        );

        Ok(result)
    }

    /// Apply an explicit list of file changes reported by a caller (editor
    /// plugin, CI hook, IDE extension), independent of the OS file watcher.
    ///
    /// Changes are coalesced by `rel_path` before processing -- within one
    /// call, the latest change for a given path wins, so the caller does
    /// not need to pre-deduplicate rapid edit/save bursts. Partial success
    /// is first-class: a per-file failure is recorded in `errors` and does
    /// not abort the batch.
    pub async fn apply_changes(&self, changes: &[FileChangeRequest]) -> OmniResult<ApplyChangesResult> {
        let start = std::time::Instant::now();

        let mut coalesced: std::collections::HashMap<std::path::PathBuf, FileChangeKind> =
            std::collections::HashMap::new();
        for change in changes {
            coalesced.insert(change.rel_path.clone(), change.kind);
        }

        let mut result = ApplyChangesResult {
            mode: "incremental".into(),
            ..Default::default()
        };

        for (rel_path, kind) in coalesced {
            let abs_path = self.config.repo_path.join(&rel_path);
            let outcome = match kind {
                FileChangeKind::Deleted => self.delete_file_internal(&abs_path).await,
                FileChangeKind::Created | FileChangeKind::Modified => {
                    self.process_file(&abs_path).await.map(|_| ())
                }
            };

            match outcome {
                Ok(()) => result.succeeded += 1,
                Err(e) => {
                    result.failed += 1;
                    result.errors.push(FileChangeError {
                        rel_path,
                        code: e.code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.stores.vector.flush(&self.project_id).await {
            tracing::warn!(error = %e, "failed to persist vector index after apply_changes");
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Clear all persisted file/chunk/symbol/dependency/vector/graph state
    /// for this project and rerun a cold index, keeping the project's data
    /// directory and configuration in place.
    pub async fn full_reindex(&self) -> OmniResult<IndexResult> {
        tracing::info!("full_reindex requested, clearing persisted state");
        self.stores.vector.clear_all(&self.project_id).await?;
        self.stores.graph.clear_all(&self.project_id).await?;
        self.run_index().await
    }

    /// Remove a file and everything derived from it: its vectors, its
    /// dependency-graph nodes/edges, and its metadata rows. Used by both
    /// the watcher's `FileDeleted` event and `apply_changes`.
    async fn delete_file_internal(&self, path: &Path) -> OmniResult<()> {
        if let Ok(Some(file)) = self.stores.vector.get_file_by_path(&self.project_id, path).await {
            let chunk_ids: Vec<i64> = self
                .stores
                .vector
                .chunks_for_file(&self.project_id, file.id)
                .await
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.id)
                .collect();
            if !chunk_ids.is_empty() {
                if let Err(e) = self.stores.vector.delete_by_file(&self.project_id, &chunk_ids).await {
                    tracing::warn!(error = %e, "failed to evict vectors for deleted file");
                }
            }
        }

        match self.stores.vector.symbol_ids_for_path(&self.project_id, path).await {
            Ok(symbol_ids) if !symbol_ids.is_empty() => {
                if let Err(e) = self.stores.graph.delete_by_file(&self.project_id, &symbol_ids).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to evict symbols from dependency graph"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to resolve symbols for deleted file"
            ),
        }

        self.stores.vector.delete_file(&self.project_id, path).await?;
        if let Err(e) = self.stores.cache.invalidate(&format!("standards:{}", self.project_id)).await {
            tracing::warn!(error = %e, "failed to invalidate standards cache after delete");
        }
        Ok(())
    }

    /// Process a single file through the pipeline.
    ///
    /// Parse -> Chunk -> Embed -> Store.
    async fn process_file(&self, path: &Path) -> OmniResult<FileProcessStats> {
        let mut stats = FileProcessStats::default();

        // Read file content
        let content = std::fs::read_to_string(path).map_err(|e| {
            OmniError::Internal(format!("failed to read {}: {e}", path.display()))
        })?;

        // Detect language
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let language = Language::from_extension(ext);

        // Compute file hash for change detection
        let hash = compute_file_hash(&content);

        // Check if file has changed since last index
        if let Ok(Some(existing_hash)) = self.stores.vector.get_file_hash(&self.project_id, path).await {
            if existing_hash == hash {
                tracing::debug!(path = %path.display(), "file unchanged, skipping");
                return Ok(stats);
            }
        }

        // Parse the file into structural elements. This never hard-fails --
        // unsupported languages and parse errors fall back to a single
        // whole-file chunk.
        let (elements, _tier) = parser::parse_file(path, content.as_bytes(), language)?;

        // Build the FileInfo
        let mut file_info = FileInfo {
            id: 0, // will be set by upsert
            path: path.to_path_buf(),
            language,
            content_hash: hash.clone(),
            size_bytes: content.len() as u64,
        };

        // Upsert the file first to get a file_id
        let file_id = self.stores.vector.upsert_file(&self.project_id, &file_info).await?;

        // Chunk the elements (returns Vec<Chunk>)
        let chunks = chunker::chunk_elements(&elements, file_id, &self.config);

        // Build Symbol records from the chunks
        let symbols: Vec<Symbol> = chunks
            .iter()
            .filter(|c| !c.symbol_path.is_empty())
            .map(|c| Symbol {
                id: 0,
                name: c
                    .symbol_path
                    .rsplit(|ch: char| ch == '.' || ch == ':')
                    .next()
                    .unwrap_or(&c.symbol_path)
                    .to_string(),
                fqn: c.symbol_path.clone(),
                kind: c.kind,
                file_id,
                line: c.line_start,
                chunk_id: None,
            })
            .collect();

        stats.chunks = chunks.len();
        stats.symbols = symbols.len();

        // `upsert_file` returns the real row id; `reindex_file` keys its
        // delete+insert on `file.id`, so it must carry that id forward.
        file_info.id = file_id;

        // Evict this file's previous vectors before `reindex_file` drops
        // their owning chunk rows -- otherwise the vector store would keep
        // serving embeddings for chunk ids that no longer exist. `remove`
        // tombstones are idempotent, so evicting ids with no live vector is
        // harmless.
        let old_chunk_ids: Vec<i64> = self
            .stores
            .vector
            .chunks_for_file(&self.project_id, file_id)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        if !old_chunk_ids.is_empty() {
            if let Err(e) = self.stores.vector.delete_by_file(&self.project_id, &old_chunk_ids).await {
                tracing::warn!(error = %e, "failed to evict stale vectors");
            }
        }

        // Atomic reindex: delete old chunks/symbols, insert new
        let (_fid, chunk_ids) = self
            .stores
            .vector
            .reindex_file(&self.project_id, &file_info, &chunks, &symbols)
            .await?;

        // Register every defined symbol as a graph node, even ones with no
        // edges yet, so `GetRelationships` can seed from them directly.
        // `reindex_file` assigns real symbol ids but doesn't hand them back,
        // so they're re-resolved by fqn.
        let mut registered_symbols = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            if let Some(stored) = self.stores.vector.get_symbol_by_fqn(&self.project_id, &symbol.fqn).await? {
                registered_symbols.push(stored);
            }
        }
        if !registered_symbols.is_empty() {
            if let Err(e) = self.stores.graph.upsert_nodes(&self.project_id, &registered_symbols).await {
                tracing::warn!(error = %e, "failed to register graph nodes");
            }
        }

        // Generate embeddings and store them against the new chunk ids.
        if self.embedder.is_available() && !chunks.is_empty() {
            let texts: Vec<String> = chunks
                .iter()
                .map(|c| {
                    crate::embedder::format_chunk_for_embedding(
                        language.as_str(),
                        &c.symbol_path,
                        &format!("{:?}", c.kind),
                        &c.content,
                    )
                })
                .collect();
            let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();

            let embeddings = self.embedder.embed_batch(&text_refs);
            let mut upserts = Vec::new();
            for (i, maybe_embedding) in embeddings.into_iter().enumerate() {
                let Some(embedding) = maybe_embedding else { continue };
                let Some(&chunk_id) = chunk_ids.get(i) else { continue };
                let mut chunk = chunks[i].clone();
                chunk.id = chunk_id;
                upserts.push(ChunkUpsert { chunk, embedding });
                stats.embeddings += 1;
            }
            if !upserts.is_empty() {
                if let Err(e) = self.stores.vector.upsert_chunks(&self.project_id, &upserts).await {
                    tracing::warn!(error = %e, "failed to store chunk embeddings");
                }
            }
        }

        // ---------------------------------------------------------------
        // Dependency edges: references within the file, then import
        // statements. Both are resolved to real symbol ids and batched
        // into one `upsert_edges` call rather than writing edge-by-edge.
        // ---------------------------------------------------------------
        let mut edges: Vec<DependencyEdge> = Vec::new();

        for element in &elements {
            if element.references.is_empty() {
                continue;
            }

            let source_symbol = if !element.symbol_path.is_empty() {
                self.stores.vector.get_symbol_by_fqn(&self.project_id, &element.symbol_path).await?
            } else {
                None
            };

            let source_id = match source_symbol {
                Some(s) => s.id,
                None => continue,
            };

            for ref_name in &element.references {
                let target = match self.stores.vector.get_symbol_by_fqn(&self.project_id, ref_name).await? {
                    Some(s) => Some(s),
                    None => self
                        .stores
                        .vector
                        .search_symbols_by_name(&self.project_id, ref_name, 1)
                        .await?
                        .into_iter()
                        .next(),
                };

                if let Some(target_sym) = target {
                    if target_sym.id != source_id {
                        edges.push(DependencyEdge {
                            source_id,
                            target_id: target_sym.id,
                            kind: DependencyKind::Calls,
                        });
                    }
                }
            }
        }

        let imports = parser::parse_imports(path, content.as_bytes(), language)
            .unwrap_or_default();

        if !imports.is_empty() {
            let file_source_id = self
                .stores
                .vector
                .get_first_symbol_for_file(&self.project_id, file_id)
                .await?
                .map(|s| s.id);

            if let Some(source_id) = file_source_id {
                for import in &imports {
                    for name in &import.imported_names {
                        if name == "*" {
                            continue;
                        }
                        let target = self
                            .stores
                            .vector
                            .search_symbols_by_name(&self.project_id, name, 1)
                            .await?
                            .into_iter()
                            .next();

                        if let Some(target_sym) = target {
                            if target_sym.id != source_id {
                                edges.push(DependencyEdge {
                                    source_id,
                                    target_id: target_sym.id,
                                    kind: DependencyKind::Imports,
                                });
                            }
                        }
                    }

                    let target = match self
                        .stores
                        .vector
                        .get_symbol_by_fqn(&self.project_id, &import.import_path)
                        .await?
                    {
                        Some(s) => Some(s),
                        None => self
                            .stores
                            .vector
                            .search_symbols_by_name(&self.project_id, &import.import_path, 1)
                            .await?
                            .into_iter()
                            .next(),
                    };

                    if let Some(target_sym) = target {
                        if target_sym.id != source_id {
                            edges.push(DependencyEdge {
                                source_id,
                                target_id: target_sym.id,
                                kind: import.kind,
                            });
                        }
                    }
                }
            }
        }

        if !edges.is_empty() {
            if let Err(e) = self.stores.graph.upsert_edges(&self.project_id, &edges).await {
                tracing::warn!(error = %e, "failed to store dependency edges");
            }
        }

        if let Err(e) = self.stores.cache.invalidate(&format!("standards:{}", self.project_id)).await {
            tracing::warn!(error = %e, "failed to invalidate standards cache after reindex");
        }

        tracing::debug!(
            path = %path.display(),
            chunks = stats.chunks,
            symbols = stats.symbols,
            embeddings = stats.embeddings,
            imports = imports.len(),
            edges = edges.len(),
            "file processed"
        );

        Ok(stats)
    }

    /// Execute a search query.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> OmniResult<Vec<SearchResult>> {
        self.search_engine
            .search(&self.project_id, query, limit, self.stores.vector.as_ref(), &self.embedder)
            .await
    }

    /// Execute a full hybrid/fts/vector/graph search query (the Tool API's
    /// `Search` operation), with filters and graph seeding.
    pub async fn search_with_query(
        &self,
        query: &crate::types::SearchQuery,
    ) -> OmniResult<Vec<SearchResult>> {
        self.search_engine
            .search_with_query(
                &self.project_id,
                query,
                self.stores.vector.as_ref(),
                &self.embedder,
                self.stores.graph.as_ref(),
            )
            .await
    }

    /// Fetch a file's own chunks, plus (when `include_related` is set) the
    /// chunks of files one hop away via `imports`/`calls` edges. Implements
    /// the Tool API's `GetFileContext` operation.
    pub async fn get_file_context(
        &self,
        rel_path: &Path,
        include_related: bool,
    ) -> OmniResult<crate::types::FileContext> {
        let file = self
            .stores
            .vector
            .get_file_by_path(&self.project_id, rel_path)
            .await?
            .ok_or_else(|| OmniError::UnknownFile { rel_path: rel_path.display().to_string() })?;
        let chunks = self.stores.vector.chunks_for_file(&self.project_id, file.id).await?;

        let mut related_chunks = Vec::new();
        if include_related {
            let mut related_file_ids = std::collections::HashSet::new();
            for symbol_id in self.stores.vector.symbol_ids_for_path(&self.project_id, rel_path).await? {
                let subgraph = self
                    .stores
                    .graph
                    .neighbors(
                        &self.project_id,
                        symbol_id,
                        None,
                        crate::types::EdgeDirection::Both,
                        1,
                        crate::graph::MAX_TRAVERSAL_NODES,
                    )
                    .await?;
                for node in &subgraph.nodes {
                    if node.id == symbol_id {
                        continue;
                    }
                    if let Some(symbol) = self.stores.vector.get_symbol_by_id(&self.project_id, node.id).await? {
                        if symbol.file_id != file.id {
                            related_file_ids.insert(symbol.file_id);
                        }
                    }
                }
            }
            for related_id in related_file_ids {
                related_chunks.extend(self.stores.vector.chunks_for_file(&self.project_id, related_id).await?);
            }
        }

        Ok(crate::types::FileContext { file, chunks, related_chunks })
    }

    /// Bounded graph traversal from a seed (symbol id or file-relative
    /// path), implementing the Tool API's `GetRelationships` operation.
    pub async fn get_relationships(
        &self,
        seed: &str,
        edge_kinds: Option<&[DependencyKind]>,
        direction: crate::types::EdgeDirection,
        depth: usize,
    ) -> OmniResult<crate::types::Subgraph> {
        let seed_id = if let Ok(id) = seed.parse::<i64>() {
            id
        } else {
            let path = Path::new(seed);
            let file = self
                .stores
                .vector
                .get_file_by_path(&self.project_id, path)
                .await?
                .ok_or_else(|| OmniError::UnknownSeed { seed: seed.to_string() })?;
            self.stores
                .vector
                .get_first_symbol_for_file(&self.project_id, file.id)
                .await?
                .ok_or_else(|| OmniError::UnknownSeed { seed: seed.to_string() })?
                .id
        };

        let depth = depth.min(5);
        let mut subgraph = self
            .stores
            .graph
            .neighbors(
                &self.project_id,
                seed_id,
                edge_kinds,
                direction,
                depth,
                crate::graph::MAX_TRAVERSAL_NODES,
            )
            .await?;
        if subgraph.nodes.is_empty() {
            return Err(OmniError::UnknownSeed { seed: seed.to_string() });
        }

        // The graph only knows symbol ids; hydrate each node's `fqn` from
        // the vector store's symbol table before returning.
        for node in &mut subgraph.nodes {
            if let Some(symbol) = self.stores.vector.get_symbol_by_id(&self.project_id, node.id).await? {
                node.fqn = symbol.fqn;
            }
        }
        Ok(subgraph)
    }

    /// Get engine status information.
    pub async fn status(&self) -> OmniResult<EngineStatus> {
        let (files_indexed, chunks_indexed) = self.stores.vector.statistics(&self.project_id).await?;
        let (graph_nodes, graph_edges) = self.stores.graph.counts(&self.project_id).await?;
        let has_cycles = self.stores.graph.has_cycles(&self.project_id).await?;
        Ok(EngineStatus {
            repo_path: self.config.repo_path.display().to_string(),
            data_dir: self.config.data_dir().display().to_string(),
            files_indexed,
            chunks_indexed,
            graph_nodes,
            graph_edges,
            has_cycles,
            search_mode: if self.embedder.is_available() {
                "hybrid".into()
            } else {
                "keyword-only".into()
            },
        })
    }

    /// Get a reference to this engine's resolved storage backend (for the
    /// MCP server, the daemon's IPC handlers, and anything else that needs
    /// to read through the `VectorStore`/`GraphStore`/`CacheStore` seam
    /// directly, e.g. the coding-standards detector).
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Get the repository root path.
    pub fn repo_path(&self) -> &Path {
        &self.config.repo_path
    }

    /// Get a reference to this engine's effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Deterministic per-project id, used as the store and cache namespace.
    pub fn project_id(&self) -> String {
        self.project_id.clone()
    }

    /// Shut down the engine gracefully, persisting data to disk.
    pub async fn shutdown(&self) -> OmniResult<()> {
        self.stores.vector.flush(&self.project_id).await?;
        tracing::info!("engine shut down");
        Ok(())
    }
}

/// Result of an indexing operation.
#[derive(Debug, Clone, Default)]
pub struct IndexResult {
    /// Number of files successfully processed.
    pub files_processed: usize,
    /// Number of files that failed to process.
    pub files_failed: usize,
    /// Total chunks created across all files.
    pub chunks_created: usize,
    /// Total symbols extracted across all files.
    pub symbols_extracted: usize,
    /// Total embeddings generated.
    pub embeddings_generated: usize,
    /// Files removed from the index because they no longer exist on disk.
    pub files_removed: usize,
}

/// Status information about the engine.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStatus {
    /// Repository path being indexed.
    pub repo_path: String,
    /// Data directory for index files.
    pub data_dir: String,
    /// Number of files in the index.
    pub files_indexed: usize,
    /// Number of chunks in the index.
    pub chunks_indexed: usize,
    /// Number of nodes in the dependency graph.
    pub graph_nodes: usize,
    /// Number of edges in the dependency graph.
    pub graph_edges: usize,
    /// Whether the dependency graph contains cycles.
    pub has_cycles: bool,
    /// Current search mode (hybrid or keyword-only).
    pub search_mode: String,
}

/// Stats from processing a single file.
#[derive(Debug, Default)]
struct FileProcessStats {
    chunks: usize,
    symbols: usize,
    embeddings: usize,
}

/// Compute a SHA-256 hash of file content for change detection.
fn compute_file_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Register `config`'s repo in the cross-project registry, or return the
/// existing row if it's already there. Callers decide when this runs (the
/// CLI's `index` command, the MCP server's startup); `Engine::with_config`
/// never does this implicitly so constructing an `Engine` in a test never
/// touches the shared registry database.
pub async fn register_project_async(config: &Config) -> OmniResult<crate::types::Project> {
    let (registry, resolved_mode) = crate::storage::open_registry(config).await?;
    let project = registry.register(&config.repo_path, resolved_mode).await?;
    registry.touch(&project.id, &[]).await?;
    Ok(project)
}

/// Blocking wrapper over [`register_project_async`] for callers (the CLI)
/// that have no tokio runtime of their own yet. Panics if called from
/// inside an already-running runtime; use the async form there instead.
pub fn register_project(config: &Config) -> OmniResult<crate::types::Project> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| OmniError::Config { details: format!("build registry runtime: {e}") })?;
    rt.block_on(register_project_async(config))
}

/// List every project registered under `config`'s data root, most
/// recently updated first.
pub async fn list_projects_async(config: &Config) -> OmniResult<Vec<crate::types::Project>> {
    let (registry, _resolved_mode) = crate::storage::open_registry(config).await?;
    registry.list().await
}

/// Blocking wrapper over [`list_projects_async`] for callers (the CLI)
/// that have no tokio runtime of their own yet. Panics if called from
/// inside an already-running runtime; use the async form there instead.
pub fn list_projects(config: &Config) -> OmniResult<Vec<crate::types::Project>> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| OmniError::Config { details: format!("build registry runtime: {e}") })?;
    rt.block_on(list_projects_async(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_file_hash() {
        let hash1 = compute_file_hash("hello world");
        let hash2 = compute_file_hash("hello world");
        let hash3 = compute_file_hash("different content");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64); // SHA-256 hex = 64 chars
    }

    #[tokio::test]
    async fn test_engine_creation() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::defaults(dir.path());
        let engine = Engine::with_config(config).await;
        assert!(engine.is_ok(), "engine should create successfully");
    }

    #[tokio::test]
    async fn test_engine_status() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::defaults(dir.path());
        let engine = Engine::with_config(config).await.expect("create engine");
        let status = engine.status().await.expect("get status");
        assert_eq!(status.files_indexed, 0);
        assert_eq!(status.chunks_indexed, 0);
        assert_eq!(status.search_mode, "keyword-only");
    }

    #[tokio::test]
    async fn test_index_empty_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::defaults(dir.path());
        let engine = Engine::with_config(config).await.expect("create engine");
        let result = engine.run_index().await.expect("index");
        assert_eq!(result.files_processed, 0);
        assert_eq!(result.chunks_created, 0);
    }

    #[tokio::test]
    async fn test_index_single_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path();

        // Create a simple Python file
        std::fs::write(
            root.join("hello.py"),
            "def greet(name):\n    \"\"\"Say hello.\"\"\"\n    return f'Hello, {name}!'\n",
        )
        .expect("write");

        let config = Config::defaults(root);
        let engine = Engine::with_config(config).await.expect("create engine");
        let result = engine.run_index().await.expect("index");

        assert_eq!(result.files_processed, 1);
        assert!(result.chunks_created > 0, "should create at least 1 chunk");

        // Verify status reflects the indexed data
        let status = engine.status().await.expect("status");
        assert_eq!(status.files_indexed, 1);
        assert!(status.chunks_indexed > 0);
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::defaults(dir.path());
        let engine = Engine::with_config(config).await.expect("create engine");
        let results = engine.search("test query", 10).await.expect("search");
        assert!(results.is_empty());
    }
}
