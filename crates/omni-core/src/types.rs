//! Core domain types shared across all omni-core subsystems.
//!
//! These types form the API contract between modules. Changing them
//! requires updating all consumers, so they should be stable and minimal.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// File-level types
// ---------------------------------------------------------------------------

/// Metadata about an indexed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Database ID.
    pub id: i64,
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Detected programming language.
    pub language: Language,
    /// SHA-256 hash of file content at time of indexing.
    pub content_hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Supported programming languages and document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python (.py)
    Python,
    /// TypeScript (.ts, .tsx)
    TypeScript,
    /// JavaScript (.js, .jsx)
    JavaScript,
    /// Rust (.rs)
    Rust,
    /// Go (.go)
    Go,
    /// Java (.java)
    Java,
    /// C (.c, .h)
    C,
    /// C++ (.cpp, .cc, .cxx, .hpp, .hxx)
    Cpp,
    /// C# (.cs)
    CSharp,
    /// CSS / SCSS (.css, .scss)
    Css,
    /// Ruby (.rb)
    Ruby,
    /// PHP (.php)
    Php,
    /// Swift (.swift)
    Swift,
    /// Kotlin (.kt, .kts)
    Kotlin,
    /// HTML (.html, .htm)
    Html,
    /// Shell / Bash (.sh, .bash, .zsh)
    Shell,
    /// Markdown (.md, .mdx)
    Markdown,
    /// TOML configuration (.toml)
    Toml,
    /// YAML configuration (.yml, .yaml)
    Yaml,
    /// JSON data (.json, .jsonc)
    Json,
    /// Unknown / unsupported
    Unknown,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" => Self::Python,
            "ts" | "tsx" => Self::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "rs" => Self::Rust,
            "go" => Self::Go,
            "java" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Self::Cpp,
            "cs" => Self::CSharp,
            "css" | "scss" => Self::Css,
            "rb" => Self::Ruby,
            "php" => Self::Php,
            "swift" => Self::Swift,
            "kt" | "kts" => Self::Kotlin,
            "html" | "htm" => Self::Html,
            "sh" | "bash" | "zsh" => Self::Shell,
            "md" | "mdx" => Self::Markdown,
            "toml" => Self::Toml,
            "yml" | "yaml" => Self::Yaml,
            "json" | "jsonc" => Self::Json,
            _ => Self::Unknown,
        }
    }

    /// Returns the language identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Css => "css",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Html => "html",
            Self::Shell => "shell",
            Self::Markdown => "markdown",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true if this is an AST-parseable programming language.
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            Self::Python
                | Self::TypeScript
                | Self::JavaScript
                | Self::Rust
                | Self::Go
                | Self::Java
                | Self::C
                | Self::Cpp
                | Self::CSharp
                | Self::Css
                | Self::Ruby
                | Self::Php
                | Self::Swift
                | Self::Kotlin
        )
    }

    /// Returns true if this is a documentation or config format.
    pub fn is_document(&self) -> bool {
        matches!(
            self,
            Self::Markdown | Self::Toml | Self::Yaml | Self::Json | Self::Html | Self::Shell
        )
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Chunk types
// ---------------------------------------------------------------------------

/// The kind of code construct a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Function or method definition.
    Function,
    /// Class, struct, or record definition.
    Class,
    /// Trait, interface, or protocol definition.
    Trait,
    /// Implementation block (Rust `impl`, Java anonymous class, etc.).
    Impl,
    /// Constant or static variable.
    Const,
    /// Type alias or definition.
    TypeDef,
    /// Module or namespace declaration.
    Module,
    /// Test function or test block.
    Test,
    /// Top-level statements that don't fit other categories.
    TopLevel,
}

impl ChunkKind {
    /// Returns the default structural importance weight for this kind.
    pub fn default_weight(&self) -> f64 {
        match self {
            Self::Function => 0.85,
            Self::Class => 0.95,
            Self::Trait => 0.95,
            Self::Impl => 0.85,
            Self::Const => 0.70,
            Self::TypeDef => 0.90,
            Self::Module => 0.60,
            Self::Test => 0.60,
            Self::TopLevel => 0.50,
        }
    }

    /// Convert to database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Trait => "trait",
            Self::Impl => "impl",
            Self::Const => "const",
            Self::TypeDef => "typedef",
            Self::Module => "module",
            Self::Test => "test",
            Self::TopLevel => "top_level",
        }
    }

    /// Parse from database string.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "function" => Self::Function,
            "class" => Self::Class,
            "trait" => Self::Trait,
            "impl" => Self::Impl,
            "const" => Self::Const,
            "typedef" => Self::TypeDef,
            "module" => Self::Module,
            "test" => Self::Test,
            _ => Self::TopLevel,
        }
    }
}

/// Visibility of a code symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Accessible from outside the module/crate.
    Public,
    /// Accessible only within the current crate/package.
    Crate,
    /// Accessible from parent class or subclasses.
    Protected,
    /// Accessible only within the defining scope.
    Private,
}

impl Visibility {
    /// Convert to database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Crate => "crate",
            Self::Protected => "protected",
            Self::Private => "private",
        }
    }

    /// Parse from database string.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "public" => Self::Public,
            "crate" => Self::Crate,
            "protected" => Self::Protected,
            "private" => Self::Private,
            _ => Self::Private,
        }
    }

    /// Returns a weight multiplier for public vs private apis.
    pub fn weight_multiplier(&self) -> f64 {
        match self {
            Self::Public => 1.0,
            Self::Crate => 0.9,
            Self::Protected => 0.85,
            Self::Private => 0.70,
        }
    }
}

/// A semantically meaningful chunk of code extracted from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Database ID (0 if not yet persisted).
    pub id: i64,
    /// ID of the parent file in the index.
    pub file_id: i64,
    /// Fully qualified symbol path (e.g., `crate::auth::middleware::validate_token`).
    pub symbol_path: String,
    /// What kind of code construct this is.
    pub kind: ChunkKind,
    /// Visibility of the symbol.
    pub visibility: Visibility,
    /// Starting line number (1-indexed).
    pub line_start: u32,
    /// Ending line number (1-indexed, inclusive).
    pub line_end: u32,
    /// The source code content of this chunk.
    pub content: String,
    /// Extracted doc comment, if any.
    pub doc_comment: Option<String>,
    /// Estimated token count for this chunk.
    pub token_count: u32,
    /// Structural importance weight (0.0 - 1.0).
    pub weight: f64,
    /// ID of the corresponding vector in usearch (None if not yet embedded).
    pub vector_id: Option<u64>,
}

// ---------------------------------------------------------------------------
// Symbol types
// ---------------------------------------------------------------------------

/// A resolved symbol in the codebase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// Database ID.
    pub id: i64,
    /// Short name (e.g., `validate_token`).
    pub name: String,
    /// Fully qualified name (e.g., `crate::auth::middleware::validate_token`).
    pub fqn: String,
    /// What kind of symbol this is.
    pub kind: ChunkKind,
    /// File this symbol is defined in.
    pub file_id: i64,
    /// Line number of definition.
    pub line: u32,
    /// Associated chunk ID, if the full definition was chunked.
    pub chunk_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Dependency edge types
// ---------------------------------------------------------------------------

/// The kind of dependency relationship between two symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// File/module A imports module B.
    Imports,
    /// Function A calls function B.
    Calls,
    /// Class A extends/inherits from class B.
    Extends,
    /// Struct/class A implements trait/interface B.
    Implements,
    /// Function A uses type B as parameter or return type.
    UsesType,
    /// Function A creates an instance of struct/class B.
    Instantiates,
    /// Function A accesses a field of struct B.
    FieldAccess,
}

impl DependencyKind {
    /// Convert to database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::Calls => "calls",
            Self::Extends => "extends",
            Self::Implements => "implements",
            Self::UsesType => "uses_type",
            Self::Instantiates => "instantiates",
            Self::FieldAccess => "field_access",
        }
    }

    /// Parse from database string.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "imports" => Self::Imports,
            "calls" => Self::Calls,
            "extends" => Self::Extends,
            "implements" => Self::Implements,
            "uses_type" => Self::UsesType,
            "instantiates" => Self::Instantiates,
            "field_access" => Self::FieldAccess,
            _ => Self::Calls, // fallback
        }
    }
}

/// A directed edge in the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Source symbol ID.
    pub source_id: i64,
    /// Target symbol ID.
    pub target_id: i64,
    /// Kind of dependency.
    pub kind: DependencyKind,
}

/// An import statement extracted from source code.
///
/// Used for dependency graph construction. Each import is later resolved
/// to a target symbol in the index.
#[derive(Debug, Clone)]
pub struct ImportStatement {
    /// The raw import path (e.g., "os.path", "crate::config", "./utils").
    pub import_path: String,
    /// Optional specific names imported (e.g., ["Config", "load"]).
    pub imported_names: Vec<String>,
    /// Line number where the import appears.
    pub line: u32,
    /// Kind of dependency this import represents.
    pub kind: DependencyKind,
}

// ---------------------------------------------------------------------------
// Project registry types
// ---------------------------------------------------------------------------

/// A registered project: one indexed corpus rooted at an absolute path.
///
/// `id` is a deterministic 16-hex digest of the canonical path (see
/// `Config::project_id`), stable across processes on the same machine and
/// distinct for two checkouts of "the same" repo at different paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Deterministic 16-hex project id.
    pub id: String,
    /// Canonical absolute path to the project root.
    pub path: PathBuf,
    /// Human-readable name, defaulting to the root directory's file name.
    pub name: String,
    /// Languages detected across the indexed corpus.
    pub languages: Vec<Language>,
    /// Unix-epoch seconds when this project was first registered.
    pub created_at: i64,
    /// Unix-epoch seconds of the last registry mutation (reindex, rename).
    pub updated_at: i64,
    /// Which storage backend this project was last indexed with.
    pub storage_mode: StorageMode,
}

/// Selects which `StorageMode` backs a project's stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Single-file embedded stores (SQLite + flat ANN + in-process graph).
    Embedded,
    /// Networked stores (Postgres + graph DB + Redis).
    Server,
    /// Try `Server`, falling back to `Embedded` on a bounded-timeout
    /// connection failure. The resolved choice is recorded on the project
    /// row so subsequent sessions don't re-probe.
    Auto,
}

impl StorageMode {
    /// Parse from a config string; unrecognized values default to `Embedded`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "server" => Self::Server,
            "auto" => Self::Auto,
            _ => Self::Embedded,
        }
    }

    /// Config-facing string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Server => "server",
            Self::Auto => "auto",
        }
    }
}

// ---------------------------------------------------------------------------
// Query engine types (hybrid search with optional graph seeding + filters)
// ---------------------------------------------------------------------------

/// Which retrieval branches a `Search` call exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// Vector + lexical (+ graph, if a seed is given) fused via RRF.
    Hybrid,
    /// Lexical (FTS5/BM25) only.
    Fts,
    /// Vector (semantic) only.
    Vector,
    /// Graph-neighbor candidates only; returns `[]` with no `graphSeed`.
    Graph,
}

/// Post-fusion result filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Glob restricting matches to files whose relative path matches.
    #[serde(default)]
    pub rel_path_glob: Option<String>,
    /// Restrict matches to chunks of these kinds.
    #[serde(default)]
    pub symbol_kinds: Vec<ChunkKind>,
    /// Restrict matches to files in this language.
    #[serde(default)]
    pub language: Option<Language>,
}

/// A hybrid search query, matching the Tool API's `Search` input shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query (natural language or symbol name).
    pub text: String,
    /// Which branches to run.
    #[serde(default = "default_search_kind")]
    pub kind: SearchKind,
    /// Post-fusion filters.
    #[serde(default)]
    pub filters: SearchFilters,
    /// Maximum results to return after fusion (default 10, max 100).
    #[serde(default = "default_k")]
    pub k: usize,
    /// Graph seed: a node id (symbol) or a file-relative path, required for
    /// the graph branch to contribute anything.
    #[serde(default)]
    pub graph_seed: Option<String>,
    /// Traversal depth for the graph branch (default 2, max 5).
    #[serde(default)]
    pub graph_depth: Option<usize>,
}

fn default_search_kind() -> SearchKind {
    SearchKind::Hybrid
}

fn default_k() -> usize {
    10
}

impl SearchQuery {
    /// Build a plain hybrid text query with the given result cap, no
    /// filters or graph seed -- the common case.
    pub fn text(text: impl Into<String>, k: usize) -> Self {
        Self {
            text: text.into(),
            kind: SearchKind::Hybrid,
            filters: SearchFilters::default(),
            k,
            graph_seed: None,
            graph_depth: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Graph traversal types (`GetRelationships` / `GraphStore::Neighbors`)
// ---------------------------------------------------------------------------

/// Which direction to traverse edges relative to the seed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    /// Edges pointing into the seed (what depends on it).
    In,
    /// Edges pointing out of the seed (what it depends on).
    Out,
    /// Both directions.
    Both,
}

/// One node surfaced by a `Neighbors`/`GetRelationships` traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNodeView {
    /// Symbol id.
    pub id: i64,
    /// Fully qualified name.
    pub fqn: String,
    /// BFS distance from the seed (0 for the seed itself).
    pub distance: usize,
}

/// One edge surfaced by a `Neighbors`/`GetRelationships` traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdgeView {
    /// Source symbol id.
    pub source_id: i64,
    /// Target symbol id.
    pub target_id: i64,
    /// Edge kind.
    pub kind: DependencyKind,
}

/// The result of a bounded graph traversal: nodes and edges reachable from
/// a seed within `depth` hops, capped at `MaxTraversalNodes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subgraph {
    /// Reachable nodes, including the seed at distance 0.
    pub nodes: Vec<GraphNodeView>,
    /// Edges among the reachable nodes.
    pub edges: Vec<GraphEdgeView>,
    /// True if traversal stopped early because `MaxTraversalNodes` was hit.
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// GetFileContext
// ---------------------------------------------------------------------------

/// Result of `GetFileContext`: a file's own chunks plus, optionally, chunks
/// reachable from it by one hop of `contains`/`imports`/`calls` edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContext {
    /// The file's manifest row.
    pub file: FileInfo,
    /// The file's own chunks, in source order.
    pub chunks: Vec<Chunk>,
    /// Chunks from related files, only populated when `includeRelated` is set.
    pub related_chunks: Vec<Chunk>,
}

// ---------------------------------------------------------------------------
// Search types
// ---------------------------------------------------------------------------

/// A search result with scoring details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk: Chunk,
    /// File path of the matched chunk.
    pub file_path: PathBuf,
    /// Overall relevance score (higher is better).
    pub score: f64,
    /// Breakdown of how the score was computed (for debugging).
    pub score_breakdown: ScoreBreakdown,
}

/// Detailed scoring breakdown for a search result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Rank from semantic (vector) search (None if keyword-only match).
    pub semantic_rank: Option<u32>,
    /// Rank from keyword (FTS5) search (None if semantic-only match).
    pub keyword_rank: Option<u32>,
    /// RRF fusion score.
    pub rrf_score: f64,
    /// Structural importance weight applied.
    pub structural_weight: f64,
    /// Dependency proximity boost applied.
    pub dependency_boost: f64,
    /// Recency boost applied.
    pub recency_boost: f64,
}

// ---------------------------------------------------------------------------
// Pipeline events
// ---------------------------------------------------------------------------

/// Events flowing through the indexing pipeline.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A file was created or modified and needs (re-)indexing.
    FileChanged {
        /// Absolute path to the file.
        path: PathBuf,
    },
    /// A file was deleted and should be removed from the index.
    FileDeleted {
        /// Absolute path to the deleted file.
        path: PathBuf,
    },
    /// A full repository scan is requested.
    FullScan,
    /// Shutdown the pipeline gracefully.
    Shutdown,
}

/// The kind of change a caller reports via `NotifyFileChanges` /
/// `Engine::apply_changes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One externally-reported file change, as accepted by `ApplyChanges` /
/// `NotifyFileChanges`. `rel_path` is resolved against the engine's
/// repository root before processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangeRequest {
    pub kind: FileChangeKind,
    pub rel_path: PathBuf,
}

/// Outcome of `ApplyChanges` / `NotifyFileChanges`: per-file success and
/// failure counts plus the individual errors, since partial success is a
/// first-class outcome rather than an all-or-nothing result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyChangesResult {
    pub mode: String,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<FileChangeError>,
    pub duration_ms: u64,
}

/// One per-file failure from `ApplyChanges`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangeError {
    pub rel_path: PathBuf,
    pub code: String,
    pub message: String,
}

