//! Coding-standards detector.
//!
//! Scans indexed chunk content for recurring idioms in four fixed
//! categories (validation, error handling, logging, testing), groups
//! matches by a normalized "signature" so that structurally identical
//! snippets aggregate even when their literals differ, and scores each
//! group by how consistently it recurs across distinct files.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::OmniResult;
use crate::storage::{CacheStore, VectorStore};
use crate::types::Chunk;

/// Cached standards entries expire after this long, so a stale cache can't
/// outlive many reindexes' worth of drift in the underlying conventions.
const CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Occurrences below this count are dropped unless `n >= 5` (see `passes_filter`).
const MIN_OCCURRENCES: usize = 2;
/// A canonical example is never longer than this many lines.
const MAX_EXAMPLE_LINES: usize = 40;

/// One of the four standards-detector categories this codebase recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardCategory {
    Validation,
    ErrorHandling,
    Logging,
    Testing,
}

impl StandardCategory {
    /// All four categories, in the order they're reported when none is requested.
    pub const ALL: [StandardCategory; 4] = [
        StandardCategory::Validation,
        StandardCategory::ErrorHandling,
        StandardCategory::Logging,
        StandardCategory::Testing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StandardCategory::Validation => "validation",
            StandardCategory::ErrorHandling => "error_handling",
            StandardCategory::Logging => "logging",
            StandardCategory::Testing => "testing",
        }
    }

    pub fn from_str_lossy(s: &str) -> Option<Self> {
        match s {
            "validation" => Some(StandardCategory::Validation),
            "error_handling" => Some(StandardCategory::ErrorHandling),
            "logging" => Some(StandardCategory::Logging),
            "testing" => Some(StandardCategory::Testing),
            _ => None,
        }
    }

    /// Substrings whose presence on a line marks it as exhibiting this
    /// category's convention. Matching is substring-based (not a grammar) --
    /// cheap, language-agnostic, and good enough for aggregate detection.
    fn markers(&self) -> &'static [&'static str] {
        match self {
            StandardCategory::Validation => &[
                "assert!(",
                "assert_eq!(",
                "debug_assert!(",
                ".is_valid(",
                "fn validate",
                "def validate",
                "raise ValueError",
                "throw new",
                "check_",
            ],
            StandardCategory::ErrorHandling => &[
                "-> Result<",
                "-> OmniResult<",
                ".unwrap()",
                ".expect(",
                "except ",
                "rescue ",
                "catch (",
                "Err(",
                "raise ",
            ],
            StandardCategory::Logging => &[
                "tracing::",
                "log::",
                "println!(",
                "print!(",
                "console.log(",
                "logger.",
            ],
            StandardCategory::Testing => &[
                "#[test]",
                "#[tokio::test]",
                "def test_",
                "assert_eq!(",
                "assert!(",
                "expect(",
                "describe(",
                "it(",
            ],
        }
    }

    /// Fixed weight applied to every signature group in this category.
    /// Categories with a narrower, less ambiguous marker set get a higher
    /// prior since a match is more likely to reflect a real convention.
    fn prior(&self) -> f64 {
        match self {
            StandardCategory::Validation => 0.85,
            StandardCategory::ErrorHandling => 0.9,
            StandardCategory::Logging => 0.8,
            StandardCategory::Testing => 0.85,
        }
    }
}

/// One detected convention: a normalized signature recurring across the project.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Standard {
    pub category: StandardCategory,
    /// Normalized form of the matched line (literals and identifiers
    /// collapsed so structurally identical idioms group together).
    pub signature: String,
    pub occurrences: usize,
    pub distinct_files: usize,
    pub confidence: f64,
    /// Longest contributing chunk's body, verbatim, truncated to 40 lines.
    pub example: String,
}

/// Detects recurring coding conventions from indexed chunk content. Reads
/// through the `VectorStore`/`CacheStore` trait seams so detection works
/// the same way against either storage backend.
pub struct StandardsDetector;

impl StandardsDetector {
    /// Run detection directly against the store, bypassing the cache.
    pub async fn detect(
        vector: &dyn VectorStore,
        project_id: &str,
        category: Option<StandardCategory>,
    ) -> OmniResult<Vec<Standard>> {
        let chunks = vector.all_chunks(project_id).await?;
        let categories: &[StandardCategory] = match &category {
            Some(c) => std::slice::from_ref(c),
            None => &StandardCategory::ALL,
        };

        let mut results = Vec::new();
        for cat in categories {
            results.extend(Self::detect_category(&chunks, *cat));
        }

        results.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    /// Run detection through the per-project cache, keyed
    /// `standards:{projectId}:{category}`. A cache miss computes and stores;
    /// a hit deserializes straight from the cache entry. Callers that mutate
    /// a project's index must invalidate the `standards:{projectId}` prefix
    /// themselves -- the cache has no way to observe index writes on its own.
    pub async fn detect_cached(
        vector: &dyn VectorStore,
        cache: &dyn CacheStore,
        project_id: &str,
        category: Option<StandardCategory>,
    ) -> OmniResult<Vec<Standard>> {
        let categories: &[StandardCategory] = match &category {
            Some(c) => std::slice::from_ref(c),
            None => &StandardCategory::ALL,
        };

        let mut results = Vec::new();
        for cat in categories {
            let cache_key = format!("standards:{project_id}:{}", cat.as_str());
            if let Some(payload) = cache.get(&cache_key).await? {
                if let Ok(cached) = serde_json::from_slice::<Vec<Standard>>(&payload) {
                    results.extend(cached);
                    continue;
                }
            }

            let chunks = vector.all_chunks(project_id).await?;
            let computed = Self::detect_category(&chunks, *cat);
            if let Ok(payload) = serde_json::to_vec(&computed) {
                cache.set(&cache_key, &payload, Some(CACHE_TTL)).await?;
            }
            results.extend(computed);
        }

        results.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    fn detect_category(chunks: &[Chunk], category: StandardCategory) -> Vec<Standard> {
        let markers = category.markers();

        // (normalized signature) -> contributing (file_id, chunk) matches.
        let mut groups: HashMap<String, Vec<(i64, &Chunk)>> = HashMap::new();

        for chunk in chunks {
            for line in chunk.content.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if markers.iter().any(|m| trimmed.contains(m)) {
                    let signature = normalize_signature(trimmed);
                    groups.entry(signature).or_default().push((chunk.file_id, chunk));
                }
            }
        }

        if groups.is_empty() {
            return Vec::new();
        }

        let total_occurrences: usize = groups.values().map(Vec::len).sum();
        let log_total = ((1 + total_occurrences) as f64).ln();

        let mut standards = Vec::with_capacity(groups.len());
        for (signature, matches) in groups {
            let n = matches.len();
            let distinct_files = matches
                .iter()
                .map(|(file_id, _)| *file_id)
                .collect::<std::collections::HashSet<_>>()
                .len();

            if !passes_filter(n, distinct_files) {
                continue;
            }

            let file_diversity = (distinct_files as f64 / n as f64).clamp(0.3, 1.0);
            let log_n = ((1 + n) as f64).ln();
            let confidence = ((log_n / log_total) * file_diversity * category.prior()).min(1.0);

            let example = matches
                .iter()
                .map(|(_, c)| *c)
                .max_by_key(|c| c.line_end.saturating_sub(c.line_start))
                .map(|c| truncate_lines(&c.content, MAX_EXAMPLE_LINES))
                .unwrap_or_default();

            standards.push(Standard {
                category,
                signature,
                occurrences: n,
                distinct_files,
                confidence,
                example,
            });
        }

        standards
    }
}

/// `n < MinOccurrences` or `distinctFiles < 2` drops a group, unless it
/// recurs often enough (`n >= 5`) to be meaningful even in one file.
fn passes_filter(n: usize, distinct_files: usize) -> bool {
    (n >= MIN_OCCURRENCES && distinct_files >= 2) || n >= 5
}

fn truncate_lines(content: &str, max_lines: usize) -> String {
    content.lines().take(max_lines).collect::<Vec<_>>().join("\n")
}

/// Collapse a line to its structural shape: string literals become `"…"`,
/// numeric literals become `0`, and identifiers outside the small
/// recognized vocabulary become `_`. This lets e.g. `assert!(user.age > 18)`
/// and `assert!(item.count > 3)` aggregate under one signature.
fn normalize_signature(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' || c == '\'' {
            let quote = c;
            let mut j = i + 1;
            while j < chars.len() && chars[j] != quote {
                j += 1;
            }
            out.push(quote);
            out.push('…');
            out.push(quote);
            i = if j < chars.len() { j + 1 } else { chars.len() };
            continue;
        }

        if c.is_ascii_digit() {
            let mut j = i;
            while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                j += 1;
            }
            out.push('0');
            i = j;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut j = i;
            while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            let word: String = chars[i..j].iter().collect();
            if is_vocabulary_word(&word) {
                out.push_str(&word);
            } else {
                out.push('_');
            }
            i = j;
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

const VOCABULARY: &[&str] = &[
    "fn", "def", "function", "class", "pub", "public", "private", "protected", "static", "const",
    "let", "var", "return", "if", "else", "for", "while", "match", "switch", "case", "try",
    "catch", "except", "finally", "raise", "throw", "new", "self", "this", "true", "false",
    "none", "null", "nil", "some", "ok", "err", "result", "assert", "assert_eq", "debug_assert",
    "expect", "unwrap", "validate", "check", "is_valid", "test", "tokio", "describe", "it", "log",
    "info", "warn", "error", "debug", "trace", "tracing", "println", "print", "console",
];

fn is_vocabulary_word(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    VOCABULARY.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkKind, FileInfo, Language, Symbol, Visibility};

    async fn index_chunk(vector: &dyn VectorStore, project_id: &str, path: &str, content: &str) {
        let file = FileInfo {
            id: 0,
            path: path.into(),
            language: Language::Python,
            content_hash: format!("hash-{path}"),
            size_bytes: content.len() as u64,
        };

        let chunk = Chunk {
            id: 0,
            file_id: 0,
            symbol_path: format!("{path}.validate"),
            kind: ChunkKind::Function,
            visibility: Visibility::Public,
            line_start: 1,
            line_end: content.lines().count() as u32,
            content: content.into(),
            doc_comment: None,
            token_count: 20,
            weight: 0.85,
            vector_id: None,
        };
        let symbol = Symbol {
            id: 0,
            name: "validate".into(),
            fqn: format!("{path}.validate"),
            kind: ChunkKind::Function,
            file_id: 0,
            line: 1,
            chunk_id: None,
        };
        vector
            .reindex_file(project_id, &file, &[chunk], &[symbol])
            .await
            .expect("reindex");
    }

    #[test]
    fn test_normalize_signature_collapses_literals() {
        let a = normalize_signature("assert!(user.age > 18)");
        let b = normalize_signature("assert!(item.count > 3)");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_signature_collapses_strings() {
        let a = normalize_signature(r#"raise ValueError("bad token")"#);
        let b = normalize_signature(r#"raise ValueError("missing field")"#);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_detect_requires_multiple_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = crate::storage::open_embedded(dir.path(), 8).expect("open embedded");

        // Same signature, same file, repeated -- shouldn't pass the filter
        // (distinct_files < 2 and n < 5).
        index_chunk(
            stores.vector.as_ref(),
            "proj",
            "solo.py",
            "def validate(x):\n    assert!(x.value > 0)\n    assert!(x.value > 0)\n",
        )
        .await;

        let standards = StandardsDetector::detect(stores.vector.as_ref(), "proj", Some(StandardCategory::Validation))
            .await
            .expect("detect");
        assert!(standards.is_empty());
    }

    #[tokio::test]
    async fn test_detect_finds_cross_file_pattern() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = crate::storage::open_embedded(dir.path(), 8).expect("open embedded");

        index_chunk(stores.vector.as_ref(), "proj", "a.py", "def validate(x):\n    assert!(x.age > 18)\n").await;
        index_chunk(stores.vector.as_ref(), "proj", "b.py", "def validate(y):\n    assert!(y.count > 3)\n").await;

        let standards = StandardsDetector::detect(stores.vector.as_ref(), "proj", Some(StandardCategory::Validation))
            .await
            .expect("detect");
        assert_eq!(standards.len(), 1);
        assert_eq!(standards[0].distinct_files, 2);
        assert!(standards[0].confidence > 0.0);
    }

    #[tokio::test]
    async fn test_detect_cached_roundtrips_through_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = crate::storage::open_embedded(dir.path(), 8).expect("open embedded");

        index_chunk(stores.vector.as_ref(), "deadbeef", "a.py", "def validate(x):\n    assert!(x.age > 18)\n").await;
        index_chunk(stores.vector.as_ref(), "deadbeef", "b.py", "def validate(y):\n    assert!(y.count > 3)\n").await;

        let first = StandardsDetector::detect_cached(
            stores.vector.as_ref(),
            stores.cache.as_ref(),
            "deadbeef",
            Some(StandardCategory::Validation),
        )
        .await
        .expect("detect cached");
        let second = StandardsDetector::detect_cached(
            stores.vector.as_ref(),
            stores.cache.as_ref(),
            "deadbeef",
            Some(StandardCategory::Validation),
        )
        .await
        .expect("detect cached again");

        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].signature, second[0].signature);
    }
}
