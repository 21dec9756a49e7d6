//! Hybrid search engine with RRF fusion and multi-signal ranking.
//!
//! Combines semantic (vector) search and keyword (FTS5/BM25) search into a
//! single ranked result set via weighted Reciprocal Rank Fusion, then
//! layers structural-importance and visibility weighting on top. Every
//! lookup goes through the project's `VectorStore`/`GraphStore` trait
//! objects rather than a concrete index, so the same engine serves both
//! embedded and server-mode projects.

use std::collections::HashMap;

use crate::embedder::Embedder;
use crate::error::OmniResult;
use crate::storage::{GraphStore, VectorStore};
use crate::types::{EdgeDirection, ScoreBreakdown, SearchKind, SearchQuery, SearchResult};

/// Weight applied to the vector (semantic) branch in the fused score.
const WEIGHT_VECTOR: f64 = 1.0;
/// Weight applied to the lexical (FTS5) branch in the fused score.
const WEIGHT_LEXICAL: f64 = 0.7;
/// Weight applied to the graph-proximity branch, when a caller supplies one.
const WEIGHT_GRAPH: f64 = 0.5;

/// Node budget for the graph branch's traversal: wide enough to cover a
/// `graphDepth = 5` fan-out without pulling in the whole project graph.
const GRAPH_BRANCH_NODE_LIMIT: usize = 500;

/// Hybrid search engine that fuses multiple retrieval signals.
pub struct SearchEngine {
    /// RRF constant k.
    rrf_k: u32,
    /// Default token budget carried from configuration; reserved for
    /// callers that need to size a result set by token count rather than
    /// item count.
    #[allow(dead_code)]
    token_budget: u32,
}

/// One retrieval branch's ranked hit list, keyed by chunk id.
struct RankedHits(HashMap<i64, u32>);

impl RankedHits {
    fn rank_of(&self, chunk_id: i64) -> Option<u32> {
        self.0.get(&chunk_id).copied()
    }
}

impl SearchEngine {
    /// Create a new search engine with the given RRF constant and token
    /// budget.
    pub fn new(rrf_k: u32, token_budget: u32) -> Self {
        Self { rrf_k, token_budget }
    }

    /// Number of candidates to pull from each branch before fusion: widen
    /// recall beyond the requested limit so RRF fusion has enough of a
    /// pool to rerank from (`ceil(1.5 * limit) + 20`).
    fn candidate_pool_size(limit: usize) -> usize {
        ((limit * 3).div_ceil(2)) + 20
    }

    /// Execute a hybrid search query.
    ///
    /// 1. Run the semantic (vector) branch, if the embedder is available.
    /// 2. Run the lexical (FTS5 BM25) branch.
    /// 3. Fuse both rank lists with weighted RRF.
    /// 4. Apply structural importance (chunk kind + visibility) weighting.
    /// 5. Sort, truncate to `limit`, and attach the owning file path.
    pub async fn search(
        &self,
        project_id: &str,
        query: &str,
        limit: usize,
        vector: &dyn VectorStore,
        embedder: &Embedder,
    ) -> OmniResult<Vec<SearchResult>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let pool_size = Self::candidate_pool_size(limit);

        let semantic = self.semantic_branch(project_id, query, pool_size, vector, embedder).await;
        let lexical = self.lexical_branch(project_id, query, pool_size, vector).await?;

        let mut candidate_ids: Vec<i64> = semantic.0.keys().copied().collect();
        for id in lexical.0.keys() {
            if !candidate_ids.contains(id) {
                candidate_ids.push(*id);
            }
        }

        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(i64, f64, ScoreBreakdown)> = Vec::with_capacity(candidate_ids.len());
        for chunk_id in candidate_ids {
            let semantic_rank = semantic.rank_of(chunk_id);
            let keyword_rank = lexical.rank_of(chunk_id);
            let rrf = self.weighted_rrf(semantic_rank, keyword_rank, None);

            scored.push((
                chunk_id,
                rrf,
                ScoreBreakdown {
                    semantic_rank,
                    keyword_rank,
                    rrf_score: rrf,
                    structural_weight: 1.0,
                    dependency_boost: 0.0,
                    recency_boost: 0.0,
                },
            ));
        }

        // Resolve chunk bodies, apply structural weighting, and drop any id
        // whose chunk has since been deleted (stale vector-index entry).
        let mut results = Vec::with_capacity(scored.len());
        for (chunk_id, rrf, mut breakdown) in scored {
            let Some(chunk) = single_chunk(vector, project_id, chunk_id).await? else {
                continue;
            };
            let Some(file_path) = vector.get_file_path_for_chunk(project_id, chunk_id).await? else {
                continue;
            };

            let structural_weight = chunk.kind.default_weight() * chunk.visibility.weight_multiplier();
            breakdown.structural_weight = structural_weight;
            let final_score = rrf * structural_weight;

            results.push(SearchResult {
                chunk,
                file_path,
                score: final_score,
                score_breakdown: breakdown,
            });
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }

    /// Execute a full `SearchQuery`: branch selection by `kind`, an optional
    /// graph branch seeded from `graphSeed`, post-fusion filters, and the
    /// spec's tie-break rule (vector similarity desc, then path asc, then
    /// `startLine` asc).
    ///
    /// Empty corpus and `kind = graph` with no `graphSeed` both return `[]`
    /// without error, per the Query Engine contract.
    pub async fn search_with_query(
        &self,
        project_id: &str,
        query: &SearchQuery,
        vector: &dyn VectorStore,
        embedder: &Embedder,
        graph: &dyn GraphStore,
    ) -> OmniResult<Vec<SearchResult>> {
        let k = query.k.clamp(1, 100);
        if query.kind == SearchKind::Graph && query.graph_seed.is_none() {
            return Ok(Vec::new());
        }
        if query.text.trim().is_empty() && query.kind != SearchKind::Graph {
            return Ok(Vec::new());
        }

        let pool_size = Self::candidate_pool_size(k);

        let semantic = if matches!(query.kind, SearchKind::Hybrid | SearchKind::Vector) {
            self.semantic_branch(project_id, &query.text, pool_size, vector, embedder).await
        } else {
            RankedHits(HashMap::new())
        };

        let lexical = if matches!(query.kind, SearchKind::Hybrid | SearchKind::Fts) {
            self.lexical_branch(project_id, &query.text, pool_size, vector).await?
        } else {
            RankedHits(HashMap::new())
        };

        let graph_hits = if matches!(query.kind, SearchKind::Hybrid | SearchKind::Graph) {
            self.graph_branch(project_id, query, vector, graph).await?
        } else {
            RankedHits(HashMap::new())
        };

        let mut candidate_ids: Vec<i64> = semantic.0.keys().copied().collect();
        for id in lexical.0.keys().chain(graph_hits.0.keys()) {
            if !candidate_ids.contains(id) {
                candidate_ids.push(*id);
            }
        }
        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<SearchResult> = Vec::with_capacity(candidate_ids.len());
        for chunk_id in candidate_ids {
            let semantic_rank = semantic.rank_of(chunk_id);
            let keyword_rank = lexical.rank_of(chunk_id);
            let graph_rank = graph_hits.rank_of(chunk_id);
            let rrf = self.weighted_rrf(semantic_rank, keyword_rank, graph_rank);

            let Some(chunk) = single_chunk(vector, project_id, chunk_id).await? else { continue };
            let Some(file_path) = vector.get_file_path_for_chunk(project_id, chunk_id).await? else { continue };

            if !passes_filters(&query.filters, vector, project_id, &file_path, &chunk).await {
                continue;
            }

            let structural_weight = chunk.kind.default_weight() * chunk.visibility.weight_multiplier();
            let final_score = rrf * structural_weight;

            results.push(SearchResult {
                score: final_score,
                file_path,
                score_breakdown: ScoreBreakdown {
                    semantic_rank,
                    keyword_rank,
                    rrf_score: rrf,
                    structural_weight,
                    dependency_boost: 0.0,
                    recency_boost: 0.0,
                },
                chunk,
            });
        }

        // Tie-break: score desc, then semantic similarity proxy (lower
        // semantic rank = higher similarity) desc, then path asc, then
        // startLine asc.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let a_rank = a.score_breakdown.semantic_rank.unwrap_or(u32::MAX);
                    let b_rank = b.score_breakdown.semantic_rank.unwrap_or(u32::MAX);
                    a_rank.cmp(&b_rank)
                })
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.chunk.line_start.cmp(&b.chunk.line_start))
        });
        results.truncate(k);
        Ok(results)
    }

    /// Resolve `graphSeed` (a numeric symbol id or a file-relative path) to
    /// a seed symbol, traverse up to `graphDepth` hops (default 2, max 5),
    /// and rank resulting chunk ids by BFS distance (closer = better).
    async fn graph_branch(
        &self,
        project_id: &str,
        query: &SearchQuery,
        vector: &dyn VectorStore,
        graph: &dyn GraphStore,
    ) -> OmniResult<RankedHits> {
        let Some(seed_ref) = &query.graph_seed else {
            return Ok(RankedHits(HashMap::new()));
        };

        let seed_symbol_id = if let Ok(id) = seed_ref.parse::<i64>() {
            Some(id)
        } else {
            let path = std::path::Path::new(seed_ref.as_str());
            match vector.get_file_by_path(project_id, path).await? {
                Some(file) => vector
                    .get_first_symbol_for_file(project_id, file.id)
                    .await?
                    .map(|s| s.id),
                None => None,
            }
        };

        let Some(seed_symbol_id) = seed_symbol_id else {
            return Ok(RankedHits(HashMap::new()));
        };

        let depth = query.graph_depth.unwrap_or(2).min(5);
        let subgraph = graph
            .neighbors(
                project_id,
                seed_symbol_id,
                None,
                EdgeDirection::Both,
                depth,
                GRAPH_BRANCH_NODE_LIMIT,
            )
            .await?;

        let mut ranks = HashMap::new();
        for node in &subgraph.nodes {
            let Some(symbol) = vector.get_symbol_by_id(project_id, node.id).await? else { continue };
            let Some(chunk_id) = symbol.chunk_id else { continue };
            // Lower distance = better rank; ties keep the first (closest)
            // insertion because `entry().or_insert` never overwrites.
            ranks.entry(chunk_id).or_insert(node.distance as u32 + 1);
        }
        Ok(RankedHits(ranks))
    }

    async fn semantic_branch(
        &self,
        project_id: &str,
        query: &str,
        pool_size: usize,
        vector: &dyn VectorStore,
        embedder: &Embedder,
    ) -> RankedHits {
        if !embedder.is_available() {
            return RankedHits(HashMap::new());
        }

        let Ok(query_vector) = embedder.embed_single(query) else {
            return RankedHits(HashMap::new());
        };

        let Ok(hits) = vector.search_ann(project_id, &query_vector, pool_size).await else {
            return RankedHits(HashMap::new());
        };

        let mut ranks = HashMap::with_capacity(hits.len());
        for (rank, (chunk_id, _score)) in hits.into_iter().enumerate() {
            ranks.insert(chunk_id, rank as u32 + 1);
        }
        RankedHits(ranks)
    }

    async fn lexical_branch(
        &self,
        project_id: &str,
        query: &str,
        pool_size: usize,
        vector: &dyn VectorStore,
    ) -> OmniResult<RankedHits> {
        let hits = vector.search_fts(project_id, query, pool_size).await?;
        let mut ranks = HashMap::with_capacity(hits.len());
        for (rank, (chunk_id, _score)) in hits.into_iter().enumerate() {
            ranks.insert(chunk_id, rank as u32 + 1);
        }
        Ok(RankedHits(ranks))
    }

    /// Weighted RRF fusion across up to three branches (vector, lexical,
    /// graph-proximity), per the configured `rrf_k` constant.
    fn weighted_rrf(
        &self,
        semantic_rank: Option<u32>,
        keyword_rank: Option<u32>,
        graph_rank: Option<u32>,
    ) -> f64 {
        let k = f64::from(self.rrf_k);
        let semantic = semantic_rank.map_or(0.0, |r| WEIGHT_VECTOR / (k + f64::from(r)));
        let keyword = keyword_rank.map_or(0.0, |r| WEIGHT_LEXICAL / (k + f64::from(r)));
        let graph = graph_rank.map_or(0.0, |r| WEIGHT_GRAPH / (k + f64::from(r)));
        semantic + keyword + graph
    }

    /// Compute an unweighted RRF score from two rank lists (equal weight on
    /// both branches). Used where callers want plain two-signal fusion
    /// without the vector/lexical/graph weighting `search` applies.
    pub fn rrf_score(&self, semantic_rank: Option<u32>, keyword_rank: Option<u32>) -> f64 {
        let k = f64::from(self.rrf_k);
        let semantic = semantic_rank.map_or(0.0, |r| 1.0 / (k + f64::from(r)));
        let keyword = keyword_rank.map_or(0.0, |r| 1.0 / (k + f64::from(r)));
        semantic + keyword
    }
}

/// Fetch one chunk by id through the plural `get_chunks` contract.
async fn single_chunk(
    vector: &dyn VectorStore,
    project_id: &str,
    chunk_id: i64,
) -> OmniResult<Option<crate::types::Chunk>> {
    Ok(vector.get_chunks(project_id, &[chunk_id]).await?.into_iter().next())
}

/// Post-fusion filter check: `relPathGlob`, `symbolKinds`, `language`.
/// Applied after hydration since filters reference file-level metadata the
/// candidate ids don't carry.
async fn passes_filters(
    filters: &crate::types::SearchFilters,
    vector: &dyn VectorStore,
    project_id: &str,
    file_path: &std::path::Path,
    chunk: &crate::types::Chunk,
) -> bool {
    if let Some(glob) = &filters.rel_path_glob {
        match globset::Glob::new(glob) {
            Ok(g) => {
                if !g.compile_matcher().is_match(file_path) {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }

    if !filters.symbol_kinds.is_empty() && !filters.symbol_kinds.contains(&chunk.kind) {
        return false;
    }

    if let Some(lang) = filters.language {
        match vector.get_file_by_path(project_id, file_path).await {
            Ok(Some(file)) if file.language == lang => {}
            _ => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rrf_score_both_signals() {
        let engine = SearchEngine::new(60, 4000);
        let score = engine.rrf_score(Some(1), Some(1));
        // 1/(60+1) + 1/(60+1) = 2/61
        let expected = 2.0 / 61.0;
        assert!((score - expected).abs() < 1e-10);
    }

    #[test]
    fn test_rrf_score_semantic_only() {
        let engine = SearchEngine::new(60, 4000);
        let score = engine.rrf_score(Some(1), None);
        let expected = 1.0 / 61.0;
        assert!((score - expected).abs() < 1e-10);
    }

    #[test]
    fn test_rrf_score_no_signal() {
        let engine = SearchEngine::new(60, 4000);
        let score = engine.rrf_score(None, None);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_rrf_higher_rank_gets_higher_score() {
        let engine = SearchEngine::new(60, 4000);
        let score_rank1 = engine.rrf_score(Some(1), Some(1));
        let score_rank10 = engine.rrf_score(Some(10), Some(10));
        assert!(score_rank1 > score_rank10);
    }

    #[test]
    fn test_weighted_rrf_prefers_vector_over_lexical_at_equal_rank() {
        let engine = SearchEngine::new(60, 4000);
        let vector_only = engine.weighted_rrf(Some(1), None, None);
        let lexical_only = engine.weighted_rrf(None, Some(1), None);
        assert!(vector_only > lexical_only);
    }

    #[test]
    fn test_candidate_pool_size_widens_recall() {
        // ceil(1.5 * 10) + 20 = 15 + 20 = 35
        assert_eq!(SearchEngine::candidate_pool_size(10), 35);
    }

    #[tokio::test]
    async fn test_search_empty_query_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = crate::storage::open_embedded(dir.path(), 8).expect("open embedded");
        let embedding_config = crate::config::EmbeddingConfig::default();
        let embedder = Embedder::degraded(&embedding_config);

        let engine = SearchEngine::new(60, 4000);
        let results = engine
            .search("proj", "", 10, stores.vector.as_ref(), &embedder)
            .await
            .expect("search");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_finds_lexical_match() {
        use crate::types::{Chunk, ChunkKind, FileInfo, Language, Symbol, Visibility};

        let dir = tempfile::tempdir().expect("tempdir");
        let stores = crate::storage::open_embedded(dir.path(), 8).expect("open embedded");
        let embedding_config = crate::config::EmbeddingConfig::default();
        let embedder = Embedder::degraded(&embedding_config);
        let project_id = "proj";

        let file = FileInfo {
            id: 0,
            path: "auth.py".into(),
            language: Language::Python,
            content_hash: "h".into(),
            size_bytes: 10,
        };

        let chunk = Chunk {
            id: 0,
            file_id: 0,
            symbol_path: "auth.validate_token".into(),
            kind: ChunkKind::Function,
            visibility: Visibility::Public,
            line_start: 1,
            line_end: 2,
            content: "def validate_token(token):\n    return token.is_valid()".into(),
            doc_comment: None,
            token_count: 10,
            weight: 0.85,
            vector_id: None,
        };
        let symbol = Symbol {
            id: 0,
            name: "validate_token".into(),
            fqn: "auth.validate_token".into(),
            kind: ChunkKind::Function,
            file_id: 0,
            line: 1,
            chunk_id: None,
        };
        stores
            .vector
            .reindex_file(project_id, &file, &[chunk], &[symbol])
            .await
            .expect("reindex");

        let engine = SearchEngine::new(60, 4000);
        let results = engine
            .search(project_id, "validate token", 10, stores.vector.as_ref(), &embedder)
            .await
            .expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.symbol_path, "auth.validate_token");
        assert!(results[0].score_breakdown.keyword_rank.is_some());
    }
}
