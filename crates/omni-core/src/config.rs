//! Configuration loading and validation.
//!
//! Configuration is resolved with the following precedence (highest wins):
//!
//! 1. CLI flags
//! 2. Environment variables (`OMNI_*`)
//! 3. Project config (`.omnicontext/config.toml`)
//! 4. User config (`~/.config/omnicontext/config.toml`)
//! 5. Compiled-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{OmniError, OmniResult};

/// Top-level configuration for OmniContext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Repository root path to index.
    pub repo_path: PathBuf,

    /// Indexing configuration.
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Watcher configuration.
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage backend selection and server-mode connection settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Concurrency tuning (ingest worker pool, embedder semaphore, timeouts).
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

/// Indexing-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// File patterns to exclude from indexing (glob syntax).
    #[serde(default = "IndexingConfig::default_excludes")]
    pub exclude_patterns: Vec<String>,

    /// Maximum file size to index (in bytes). Files larger than this are skipped.
    #[serde(default = "IndexingConfig::default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum number of concurrent parse tasks.
    #[serde(default = "IndexingConfig::default_parse_concurrency")]
    pub parse_concurrency: usize,

    /// Maximum chunk size in tokens.
    #[serde(default = "IndexingConfig::default_max_chunk_tokens")]
    pub max_chunk_tokens: u32,

    /// Whether to follow symbolic links.
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Number of backward overlap lines to include before each chunk for CAST context.
    /// These lines provide surrounding context to prevent orphaned chunks.
    #[serde(default = "IndexingConfig::default_overlap_lines")]
    pub overlap_lines: usize,

    /// Target overlap in tokens for CAST context windowing.
    /// When set, takes precedence over `overlap_lines` for determining
    /// how much backward context to capture.
    #[serde(default = "IndexingConfig::default_overlap_tokens")]
    pub overlap_tokens: u32,

    /// Overlap fraction for intra-element splitting (0.0 - 0.5).
    /// Controls how much content is repeated between consecutive chunks
    /// when a single large element is split into multiple chunks.
    #[serde(default = "IndexingConfig::default_overlap_fraction")]
    pub overlap_fraction: f64,

    /// Whether to include module-level declarations (imports, top-level constants,
    /// type definitions) in each chunk's context header regardless of their distance.
    #[serde(default = "IndexingConfig::default_include_module_declarations")]
    pub include_module_declarations: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: Self::default_excludes(),
            max_file_size: Self::default_max_file_size(),
            parse_concurrency: Self::default_parse_concurrency(),
            max_chunk_tokens: Self::default_max_chunk_tokens(),
            follow_symlinks: false,
            overlap_lines: Self::default_overlap_lines(),
            overlap_tokens: Self::default_overlap_tokens(),
            overlap_fraction: Self::default_overlap_fraction(),
            include_module_declarations: Self::default_include_module_declarations(),
        }
    }
}

impl IndexingConfig {
    fn default_excludes() -> Vec<String> {
        vec![
            ".git".into(),
            "node_modules".into(),
            "target".into(),
            "__pycache__".into(),
            ".venv".into(),
            "venv".into(),
            "dist".into(),
            "build".into(),
            ".next".into(),
            "*.lock".into(),
            "*.min.js".into(),
            "*.min.css".into(),
            "*.map".into(),
        ]
    }

    fn default_max_file_size() -> u64 {
        5 * 1024 * 1024 // 5MB
    }

    fn default_parse_concurrency() -> usize {
        2
    }

    fn default_max_chunk_tokens() -> u32 {
        512
    }

    fn default_overlap_lines() -> usize { 10 }

    fn default_overlap_tokens() -> u32 { 150 }

    fn default_overlap_fraction() -> f64 { 0.12 }

    fn default_include_module_declarations() -> bool { true }
}

/// Search-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results to return.
    #[serde(default = "SearchConfig::default_limit")]
    pub default_limit: usize,

    /// Maximum number of results to return.
    #[serde(default = "SearchConfig::default_max_limit")]
    pub max_limit: usize,

    /// RRF constant (k parameter).
    #[serde(default = "SearchConfig::default_rrf_k")]
    pub rrf_k: u32,

    /// Default token budget for context building.
    #[serde(default = "SearchConfig::default_token_budget")]
    pub token_budget: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: Self::default_limit(),
            max_limit: Self::default_max_limit(),
            rrf_k: Self::default_rrf_k(),
            token_budget: Self::default_token_budget(),
        }
    }
}

impl SearchConfig {
    fn default_limit() -> usize { 10 }
    fn default_max_limit() -> usize { 100 }
    fn default_rrf_k() -> u32 { 60 }
    fn default_token_budget() -> u32 { 4000 }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Path to the ONNX model file.
    #[serde(default = "EmbeddingConfig::default_model_path")]
    pub model_path: PathBuf,

    /// Output embedding dimensions.
    #[serde(default = "EmbeddingConfig::default_dimensions")]
    pub dimensions: usize,

    /// Batch size for embedding inference.
    #[serde(default = "EmbeddingConfig::default_batch_size")]
    pub batch_size: usize,

    /// Maximum sequence length for the tokenizer.
    #[serde(default = "EmbeddingConfig::default_max_seq_length")]
    pub max_seq_length: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: Self::default_model_path(),
            dimensions: Self::default_dimensions(),
            batch_size: Self::default_batch_size(),
            max_seq_length: Self::default_max_seq_length(),
        }
    }
}

impl EmbeddingConfig {
    fn default_model_path() -> PathBuf {
        // Default: auto-download cache location for jina-embeddings-v2-base-code.
        // If the model isn't here yet, the embedder will auto-download it.
        // Users can override via config or OMNI_MODEL_PATH env var.
        crate::embedder::model_manager::model_path(&crate::embedder::model_manager::DEFAULT_MODEL)
    }
    fn default_dimensions() -> usize { 768 } // jina-code v2 output dimensions
    fn default_batch_size() -> usize { 32 }
    fn default_max_seq_length() -> usize { 512 } // practical limit for code chunks
}

/// File watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Debounce interval in milliseconds.
    #[serde(default = "WatcherConfig::default_debounce_ms")]
    pub debounce_ms: u64,

    /// Interval between full scans (in seconds) for catching missed events.
    #[serde(default = "WatcherConfig::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::default_debounce_ms(),
            poll_interval_secs: Self::default_poll_interval_secs(),
        }
    }
}

impl WatcherConfig {
    fn default_debounce_ms() -> u64 { 2_000 }
    fn default_poll_interval_secs() -> u64 { 5 }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Whether to output logs as JSON.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".into()
    }
}

/// Storage backend selection plus the connection settings the `server` mode
/// needs. Embedded mode ignores everything here except `data_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub mode: crate::types::StorageMode,

    /// Root directory for embedded per-project data (`registry.db` plus
    /// `projects/<id>/`). Defaults to the OS data-local dir when unset.
    #[serde(default)]
    pub data_root: Option<PathBuf>,

    /// Bound on how long `auto` mode waits for the server backend to accept
    /// a connection before falling back to embedded.
    #[serde(default = "StorageConfig::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "StorageConfig::default_pg_host")]
    pub pg_host: String,
    #[serde(default = "StorageConfig::default_pg_port")]
    pub pg_port: u16,
    #[serde(default = "StorageConfig::default_pg_db")]
    pub pg_db: String,
    #[serde(default = "StorageConfig::default_pg_user")]
    pub pg_user: String,
    #[serde(default)]
    pub pg_password: String,

    /// Bolt URI for the graph database (e.g. `bolt://localhost:7687`).
    #[serde(default = "StorageConfig::default_graph_uri")]
    pub graph_uri: String,
    #[serde(default = "StorageConfig::default_graph_user")]
    pub graph_user: String,
    #[serde(default)]
    pub graph_password: String,

    #[serde(default = "StorageConfig::default_cache_host")]
    pub cache_host: String,
    #[serde(default = "StorageConfig::default_cache_port")]
    pub cache_port: u16,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: crate::types::StorageMode::Embedded,
            data_root: None,
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            pg_host: Self::default_pg_host(),
            pg_port: Self::default_pg_port(),
            pg_db: Self::default_pg_db(),
            pg_user: Self::default_pg_user(),
            pg_password: String::new(),
            graph_uri: Self::default_graph_uri(),
            graph_user: Self::default_graph_user(),
            graph_password: String::new(),
            cache_host: Self::default_cache_host(),
            cache_port: Self::default_cache_port(),
        }
    }
}

impl StorageConfig {
    fn default_connect_timeout_ms() -> u64 { 2_000 }
    fn default_pg_host() -> String { "localhost".into() }
    fn default_pg_port() -> u16 { 5432 }
    fn default_pg_db() -> String { "omnicontext".into() }
    fn default_pg_user() -> String { "omnicontext".into() }
    fn default_graph_uri() -> String { "bolt://localhost:7687".into() }
    fn default_graph_user() -> String { "neo4j".into() }
    fn default_cache_host() -> String { "localhost".into() }
    fn default_cache_port() -> u16 { 6379 }
}

/// Tuning for the single-writer / bounded-ingest-pool concurrency model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Size of the bounded worker pool that parses and embeds files during
    /// ingestion. The writer lane itself is always exactly one task.
    #[serde(default = "ConcurrencyConfig::default_ingest_workers")]
    pub ingest_workers: usize,

    /// Permits in the semaphore guarding concurrent embedder inference calls.
    #[serde(default = "ConcurrencyConfig::default_embedder_concurrency")]
    pub embedder_concurrency: usize,

    /// Deadline for a single `Search`/`GetFileContext`/`GetRelationships`
    /// call, carried as a `CancellationToken` that fires when it elapses.
    #[serde(default = "ConcurrencyConfig::default_search_timeout_ms")]
    pub search_timeout_ms: u64,

    /// Deadline for a full `Init`/`run_index` pass.
    #[serde(default = "ConcurrencyConfig::default_init_timeout_ms")]
    pub init_timeout_ms: u64,

    /// Grace period after a deadline or explicit cancel during which an
    /// in-flight file transaction is allowed to complete or roll back
    /// before the operation is forcibly aborted.
    #[serde(default = "ConcurrencyConfig::default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            ingest_workers: Self::default_ingest_workers(),
            embedder_concurrency: Self::default_embedder_concurrency(),
            search_timeout_ms: Self::default_search_timeout_ms(),
            init_timeout_ms: Self::default_init_timeout_ms(),
            cancel_grace_ms: Self::default_cancel_grace_ms(),
        }
    }
}

impl ConcurrencyConfig {
    fn default_ingest_workers() -> usize { 4 }
    fn default_embedder_concurrency() -> usize { 2 }
    fn default_search_timeout_ms() -> u64 { 120_000 }
    fn default_init_timeout_ms() -> u64 { 1_800_000 }
    fn default_cancel_grace_ms() -> u64 { 5_000 }
}

impl Config {
    /// Load configuration from defaults, then overlay user config, then project config.
    pub fn load(repo_path: &Path) -> OmniResult<Self> {
        let mut config = Self::defaults(repo_path);

        // User config: ~/.config/omnicontext/config.toml
        if let Some(user_config_dir) = dirs::config_dir() {
            let user_config_path = user_config_dir.join("omnicontext").join("config.toml");
            if user_config_path.exists() {
                config.merge_from_file(&user_config_path)?;
            }
        }

        // Project config: <repo>/.omnicontext/config.toml
        let project_config_path = repo_path.join(".omnicontext").join("config.toml");
        if project_config_path.exists() {
            config.merge_from_file(&project_config_path)?;
        }

        // Environment overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Create a default configuration for the given repo path.
    pub fn defaults(repo_path: &Path) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
            embedding: EmbeddingConfig::default(),
            watcher: WatcherConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }

    /// Returns the data directory for this repo's index files.
    pub fn data_dir(&self) -> PathBuf {
        let hash = self.repo_hash();
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("omnicontext")
            .join("repos")
            .join(&hash);
        base
    }

    /// Root directory for the embedded `ProjectRegistry` (`registry.db`) and
    /// per-project storage (`projects/<id>/{vectors.db,graph.db,config.json,resume.json}`).
    /// Honors `storage.data_root` when set, otherwise falls back to the OS
    /// data-local dir under `omnicontext/`.
    pub fn registry_data_root(&self) -> PathBuf {
        self.storage
            .data_root
            .clone()
            .unwrap_or_else(|| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("omnicontext")
            })
    }

    /// Deterministic 16-hex-character identifier for this repo, stable
    /// across process restarts and used as the cache-key namespace for
    /// per-project data such as coding standards.
    pub fn project_id(&self) -> String {
        use sha2::{Digest, Sha256};
        let path_str = self.repo_path.to_string_lossy();
        let normalized = path_str.strip_prefix(r"\\?\").unwrap_or(&path_str);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }

    /// Merge values from a TOML config file (non-destructive overlay).
    fn merge_from_file(&mut self, path: &Path) -> OmniResult<()> {
        let content = std::fs::read_to_string(path)?;
        let overlay: toml::Value = toml::from_str(&content)
            .map_err(|e| OmniError::Config { details: format!("invalid TOML in {}: {e}", path.display()) })?;

        // Override individual sections if present
        if let Some(indexing) = overlay.get("indexing") {
            if let Ok(parsed) = indexing.clone().try_into::<IndexingConfig>() {
                self.indexing = parsed;
            }
        }
        if let Some(search) = overlay.get("search") {
            if let Ok(parsed) = search.clone().try_into::<SearchConfig>() {
                self.search = parsed;
            }
        }
        if let Some(embedding) = overlay.get("embedding") {
            if let Ok(parsed) = embedding.clone().try_into::<EmbeddingConfig>() {
                self.embedding = parsed;
            }
        }
        if let Some(watcher) = overlay.get("watcher") {
            if let Ok(parsed) = watcher.clone().try_into::<WatcherConfig>() {
                self.watcher = parsed;
            }
        }
        if let Some(logging) = overlay.get("logging") {
            if let Ok(parsed) = logging.clone().try_into::<LoggingConfig>() {
                self.logging = parsed;
            }
        }
        if let Some(storage) = overlay.get("storage") {
            if let Ok(parsed) = storage.clone().try_into::<StorageConfig>() {
                self.storage = parsed;
            }
        }
        if let Some(concurrency) = overlay.get("concurrency") {
            if let Ok(parsed) = concurrency.clone().try_into::<ConcurrencyConfig>() {
                self.concurrency = parsed;
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides (OMNI_* prefix).
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("OMNI_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(model) = std::env::var("OMNI_MODEL_PATH") {
            self.embedding.model_path = PathBuf::from(model);
        }
        if let Ok(mode) = std::env::var("OMNI_STORAGE_MODE") {
            self.storage.mode = crate::types::StorageMode::from_str_lossy(&mode.to_ascii_lowercase());
        }
        if let Ok(root) = std::env::var("OMNI_DATA_ROOT") {
            self.storage.data_root = Some(PathBuf::from(root));
        }
        if let Ok(host) = std::env::var("OMNI_PG_HOST") {
            self.storage.pg_host = host;
        }
        if let Ok(password) = std::env::var("OMNI_PG_PASSWORD") {
            self.storage.pg_password = password;
        }
    }

    /// Compute a short hash of the repo path for the data directory name.
    ///
    /// Normalizes the path to avoid Windows `\\?\` extended path prefix
    /// causing different hashes for the same physical directory.
    fn repo_hash(&self) -> String {
        use sha2::{Sha256, Digest};
        let path_str = self.repo_path.to_string_lossy();
        // Strip Windows extended path prefix for consistent hashing
        let normalized = path_str
            .strip_prefix(r"\\?\")
            .unwrap_or(&path_str);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..4])
    }
}

/// The per-project in-repo marker: `.omnicontext/project.json` at the
/// project root. Its presence is what `InitProject` checks to decide
/// between a fresh `Init` and `AlreadyInitialized`; its content lets a
/// later session detect an embedder-model change without opening the
/// project's stores first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectMarker {
    /// Deterministic 16-hex project id (`Config::project_id`).
    pub project_id: String,
    /// Name of the embedding model used for every chunk currently persisted.
    pub embedder_model: String,
    /// Embedding vector width, fixed for the lifetime of the project.
    pub dim: usize,
    /// Unix-epoch seconds this project was first initialized.
    pub created_at: i64,
}

impl ProjectMarker {
    /// Path to the marker file for a given project root.
    pub fn path(repo_path: &Path) -> PathBuf {
        repo_path.join(".omnicontext").join("project.json")
    }

    /// Read the marker, if present. Absence is not an error -- it just
    /// means the project hasn't been initialized yet (or was initialized
    /// by a registry row without a matching marker, the inconsistency
    /// `Init --new-config` reconciles).
    pub fn read(repo_path: &Path) -> OmniResult<Option<Self>> {
        let path = Self::path(repo_path);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| OmniError::CorruptRecord {
                rel_path: path.display().to_string(),
                details: e.to_string(),
            })
    }

    /// Write the marker, creating `.omnicontext/` if needed.
    pub fn write(&self, repo_path: &Path) -> OmniResult<()> {
        let path = Self::path(repo_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| OmniError::Serialization(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

/// Progress checkpoint for a running or crashed `Init`, written to
/// `resume.json` in the project's data directory. The actual resume
/// mechanism is content-hash matching (`MetadataIndex::get_file_hash`) --
/// a restarted `Init` re-scans every file but skips re-embedding any whose
/// hash already matches -- so this checkpoint only needs to carry enough
/// to report progress and detect a stale crash; it is never required to
/// replay state as its fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResumeCheckpoint {
    /// Which phase of `run_index` was in flight.
    pub phase: ResumePhase,
    /// Relative path of the last file fully processed, for progress
    /// reporting across a resumed `Init`.
    pub cursor: String,
    /// Files processed so far in this `Init` pass.
    pub files_done: usize,
    /// Total files discovered by the initial scan.
    pub files_total: usize,
}

/// Phase recorded in a [`ResumeCheckpoint`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResumePhase {
    Scanning,
    Processing,
}

impl ResumeCheckpoint {
    /// Path to the checkpoint file for a given project data directory.
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join("resume.json")
    }

    /// Read the checkpoint, if present. Absence means either this project
    /// has never run `Init` or its last `Init` completed cleanly (`run_index`
    /// removes the file on success).
    pub fn read(data_dir: &Path) -> OmniResult<Option<Self>> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| OmniError::CorruptRecord {
                rel_path: path.display().to_string(),
                details: e.to_string(),
            })
    }

    /// Persist the checkpoint, overwriting any previous one.
    pub fn write(&self, data_dir: &Path) -> OmniResult<()> {
        let path = Self::path(data_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| OmniError::Serialization(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Remove the checkpoint, called once a pass completes successfully.
    pub fn clear(data_dir: &Path) -> OmniResult<()> {
        let path = Self::path(data_dir);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::defaults(Path::new("/tmp/test-repo"));
        assert_eq!(config.indexing.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.watcher.debounce_ms, 2_000);
        assert_eq!(config.storage.mode, crate::types::StorageMode::Embedded);
        assert_eq!(config.concurrency.ingest_workers, 4);
    }

    #[test]
    fn test_language_from_extension() {
        use crate::types::Language;
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("xyz"), Language::Unknown);
    }

    #[test]
    fn test_chunk_kind_weights() {
        use crate::types::ChunkKind;
        assert!(ChunkKind::Class.default_weight() > ChunkKind::Test.default_weight());
        assert!(ChunkKind::Function.default_weight() > ChunkKind::TopLevel.default_weight());
    }

    #[test]
    fn test_project_marker_round_trip() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert_eq!(ProjectMarker::read(dir.path()).expect("read absent"), None);

        let marker = ProjectMarker {
            project_id: "abc123".into(),
            embedder_model: "jina-embeddings-v2-base-code".into(),
            dim: 768,
            created_at: 1_700_000_000,
        };
        marker.write(dir.path()).expect("write marker");

        let read_back = ProjectMarker::read(dir.path()).expect("read").expect("some");
        assert_eq!(read_back, marker);
    }

    #[test]
    fn test_resume_checkpoint_round_trip_and_clear() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert_eq!(ResumeCheckpoint::read(dir.path()).expect("read absent"), None);

        let checkpoint = ResumeCheckpoint {
            phase: ResumePhase::Processing,
            cursor: "src/main.rs".into(),
            files_done: 12,
            files_total: 40,
        };
        checkpoint.write(dir.path()).expect("write checkpoint");

        let read_back = ResumeCheckpoint::read(dir.path()).expect("read").expect("some");
        assert_eq!(read_back, checkpoint);

        ResumeCheckpoint::clear(dir.path()).expect("clear");
        assert_eq!(ResumeCheckpoint::read(dir.path()).expect("read after clear"), None);
    }
}
