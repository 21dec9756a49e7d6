//! Flat brute-force cosine-similarity vector index with disk persistence.
//!
//! `usearch`'s HNSW bindings were evaluated and parked (see the `TODO` in
//! the workspace `Cargo.toml`) because of version-compatibility churn, so
//! the embedded backend's nearest-neighbor search is served by an
//! in-memory flat index instead: every vector is L2-normalized on insert
//! so cosine similarity reduces to a dot product, and `search` does a
//! linear scan with a bounded max-heap for the top-k. Flat is exact and
//! fast enough for the single-project, tens-of-thousands-of-chunks scale
//! this crate targets; a future HNSW layer would implement the same
//! `add`/`search`/`remove` surface without touching callers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{OmniError, OmniResult};

/// Flat vector index, held entirely in memory and snapshotted to disk.
pub struct VectorIndex {
    dimensions: usize,
    path: PathBuf,
    ids: Vec<u64>,
    /// Row-major, L2-normalized vectors: `vectors[i * dimensions .. (i+1) * dimensions]`.
    vectors: Vec<f32>,
    /// Tombstones: ids removed since the last compaction.
    removed: std::collections::HashSet<u64>,
}

const MAGIC: &[u8; 8] = b"OMNIVEC1";

impl VectorIndex {
    /// Create or open a vector index backed by the given file path.
    /// If the file exists, its contents are loaded eagerly.
    pub fn open(index_path: &Path, dimensions: usize) -> OmniResult<Self> {
        if let Some(parent) = index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut index = Self {
            dimensions,
            path: index_path.to_path_buf(),
            ids: Vec::new(),
            vectors: Vec::new(),
            removed: std::collections::HashSet::new(),
        };

        if index_path.exists() {
            index.load()?;
        }

        Ok(index)
    }

    /// Add (or replace) a vector under the given id. The vector is
    /// L2-normalized before storage so `search` can score by dot product.
    pub fn add(&mut self, id: u64, vector: &[f32]) -> OmniResult<()> {
        if vector.len() != self.dimensions {
            return Err(OmniError::VectorUnavailable {
                reason: format!(
                    "dimension mismatch: index is {}, vector is {}",
                    self.dimensions,
                    vector.len()
                ),
            });
        }

        let normalized = normalize(vector);
        self.removed.remove(&id);

        if let Some(pos) = self.ids.iter().position(|&existing| existing == id) {
            let start = pos * self.dimensions;
            self.vectors[start..start + self.dimensions].copy_from_slice(&normalized);
        } else {
            self.ids.push(id);
            self.vectors.extend_from_slice(&normalized);
        }

        Ok(())
    }

    /// Search for the K nearest neighbors to the query vector by cosine
    /// similarity (descending). Tombstoned ids are skipped.
    pub fn search(&self, query: &[f32], k: usize) -> OmniResult<Vec<(u64, f32)>> {
        if query.len() != self.dimensions || k == 0 {
            return Ok(Vec::new());
        }

        let q = normalize(query);

        // Min-heap of size k on similarity, so we only keep the top-k.
        let mut heap: BinaryHeap<ScoredId> = BinaryHeap::with_capacity(k + 1);

        for (i, &id) in self.ids.iter().enumerate() {
            if self.removed.contains(&id) {
                continue;
            }
            let start = i * self.dimensions;
            let vec = &self.vectors[start..start + self.dimensions];
            let score = dot(&q, vec);

            if heap.len() < k {
                heap.push(ScoredId { score: -score, id });
            } else if let Some(top) = heap.peek() {
                if -top.score < score {
                    heap.pop();
                    heap.push(ScoredId { score: -score, id });
                }
            }
        }

        let mut results: Vec<(u64, f32)> = heap.into_iter().map(|s| (s.id, -s.score)).collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(results)
    }

    /// Tombstone a vector by id. Space is reclaimed on the next `save`/`load`
    /// cycle (compaction happens in `save`).
    pub fn remove(&mut self, id: u64) -> OmniResult<()> {
        self.removed.insert(id);
        Ok(())
    }

    /// Drop every vector, as part of `full_reindex`. The index keeps its
    /// dimension and backing file path.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.vectors.clear();
        self.removed.clear();
    }

    /// Persist the index to disk, compacting out tombstoned vectors.
    pub fn save(&mut self) -> OmniResult<()> {
        self.compact();

        let mut buf = Vec::with_capacity(16 + self.ids.len() * (8 + self.dimensions * 4));
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&(self.dimensions as u64).to_le_bytes());
        buf.extend_from_slice(&(self.ids.len() as u64).to_le_bytes());
        for &id in &self.ids {
            buf.extend_from_slice(&id.to_le_bytes());
        }
        for &v in &self.vectors {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        let tmp_path = self.path.with_extension("bin.tmp");
        {
            let mut f = std::fs::File::create(&tmp_path)?;
            f.write_all(&buf)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Load (or reload) the index from disk.
    fn load(&mut self) -> OmniResult<()> {
        let mut f = std::fs::File::open(&self.path)?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;

        if buf.len() < 24 || &buf[0..8] != MAGIC {
            return Err(OmniError::VectorUnavailable {
                reason: format!("corrupt vector index file: {}", self.path.display()),
            });
        }

        let dims = u64::from_le_bytes(buf[8..16].try_into().unwrap()) as usize;
        let count = u64::from_le_bytes(buf[16..24].try_into().unwrap()) as usize;

        if dims != self.dimensions {
            return Err(OmniError::VectorUnavailable {
                reason: format!(
                    "vector index dimension {dims} does not match configured {}",
                    self.dimensions
                ),
            });
        }

        let ids_start = 24;
        let ids_end = ids_start + count * 8;
        let vecs_end = ids_end + count * dims * 4;
        if buf.len() < vecs_end {
            return Err(OmniError::VectorUnavailable {
                reason: format!("truncated vector index file: {}", self.path.display()),
            });
        }

        let mut ids = Vec::with_capacity(count);
        for chunk in buf[ids_start..ids_end].chunks_exact(8) {
            ids.push(u64::from_le_bytes(chunk.try_into().unwrap()));
        }

        let mut vectors = Vec::with_capacity(count * dims);
        for chunk in buf[ids_end..vecs_end].chunks_exact(4) {
            vectors.push(f32::from_le_bytes(chunk.try_into().unwrap()));
        }

        self.ids = ids;
        self.vectors = vectors;
        self.removed.clear();
        Ok(())
    }

    /// Drop tombstoned vectors from the in-memory arrays.
    fn compact(&mut self) {
        if self.removed.is_empty() {
            return;
        }

        let mut new_ids = Vec::with_capacity(self.ids.len());
        let mut new_vectors = Vec::with_capacity(self.vectors.len());

        for (i, &id) in self.ids.iter().enumerate() {
            if self.removed.contains(&id) {
                continue;
            }
            let start = i * self.dimensions;
            new_ids.push(id);
            new_vectors.extend_from_slice(&self.vectors[start..start + self.dimensions]);
        }

        self.ids = new_ids;
        self.vectors = new_vectors;
        self.removed.clear();
    }

    /// Returns the number of live (non-tombstoned) vectors in the index.
    pub fn len(&self) -> usize {
        self.ids.len() - self.removed.len()
    }

    /// Returns true if the index has no live vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Wrapper so `BinaryHeap` (a max-heap) can be used as a min-heap on
/// similarity by negating the score.
#[derive(Debug, Clone, Copy)]
struct ScoredId {
    score: f32,
    id: u64,
}

impl PartialEq for ScoredId {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for ScoredId {}
impl PartialOrd for ScoredId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.partial_cmp(&other.score).unwrap_or(Ordering::Equal)
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_index_creation() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let index = VectorIndex::open(&dir.path().join("vectors.bin"), 4).expect("create index");
        assert_eq!(index.dimensions(), 4);
        assert!(index.is_empty());
    }

    #[test]
    fn test_add_and_search_exact_match_ranks_first() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut index = VectorIndex::open(&dir.path().join("vectors.bin"), 3).expect("create index");

        index.add(1, &[1.0, 0.0, 0.0]).expect("add 1");
        index.add(2, &[0.0, 1.0, 0.0]).expect("add 2");
        index.add(3, &[0.9, 0.1, 0.0]).expect("add 3");

        let results = index.search(&[1.0, 0.0, 0.0], 2).expect("search");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1);
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn test_remove_excludes_from_search() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut index = VectorIndex::open(&dir.path().join("vectors.bin"), 2).expect("create index");
        index.add(1, &[1.0, 0.0]).expect("add");
        index.add(2, &[1.0, 0.1]).expect("add");
        index.remove(1).expect("remove");

        let results = index.search(&[1.0, 0.0], 5).expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("vectors.bin");

        {
            let mut index = VectorIndex::open(&path, 3).expect("create index");
            index.add(10, &[1.0, 2.0, 3.0]).expect("add");
            index.add(11, &[3.0, 2.0, 1.0]).expect("add");
            index.save().expect("save");
        }

        let reloaded = VectorIndex::open(&path, 3).expect("reload index");
        assert_eq!(reloaded.len(), 2);
        let results = reloaded.search(&[1.0, 2.0, 3.0], 1).expect("search");
        assert_eq!(results[0].0, 10);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut index = VectorIndex::open(&dir.path().join("vectors.bin"), 4).expect("create index");
        let result = index.add(1, &[1.0, 2.0]);
        assert!(result.is_err());
    }
}
