//! Error types for omni-core.
//!
//! Uses a hierarchical error enum so callers can pattern-match on
//! the subsystem that failed. Each subsystem also has its own error
//! type internally, which gets converted to `OmniError` at the boundary.
//!
//! Every variant maps to one of four taxonomy kinds (`ErrorKind`): input,
//! environment, data, or cancellation. Tool-facing callers (the MCP server,
//! the daemon's JSON-RPC handlers) never let an `OmniError` cross the
//! process boundary directly -- it is always flattened into the
//! `{code, message, context}` triple via `ToolError`, so no internal type
//! names or stack traces leak out.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse-grained error taxonomy. Used to decide whether an error is safe
/// to retry, whether it should trigger a fallback, and whether
/// cancellation semantics (idempotent re-invocation) apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input from the caller: unknown project, invalid path, conflicting
    /// options. Never retried by the core.
    Input,
    /// External dependency unreachable or resource exhausted: store down,
    /// embedder down, disk full. Retried with capped backoff where covered.
    Environment,
    /// Corruption or parse failure in project data. Recovered locally via
    /// fallback chunks or by marking the affected file for reingest.
    Data,
    /// The operation was cancelled, not failed. Safe to retry.
    Cancellation,
}

/// Top-level error type for all omni-core operations.
#[derive(Debug, Error)]
pub enum OmniError {
    // ---- Input errors (§7: reported immediately, never retried) ----
    /// `projectRef` does not resolve to a registered project.
    #[error("unknown project: {project_ref}")]
    UnknownProject {
        /// The path/name/id the caller passed.
        project_ref: String,
    },

    /// The supplied project path is not usable (doesn't exist, not a
    /// directory, or cannot be canonicalized).
    #[error("invalid path: {path}: {reason}")]
    PathInvalid {
        /// The offending path.
        path: PathBuf,
        /// Why it's invalid.
        reason: String,
    },

    /// `InitProject` called on a path that already has a project marker.
    #[error("already initialized: {path}")]
    AlreadyInitialized {
        /// The project path.
        path: PathBuf,
    },

    /// Requested file is not present in the index.
    #[error("unknown file: {rel_path}")]
    UnknownFile {
        /// Project-relative path.
        rel_path: String,
    },

    /// `GetRelationships` seed (node id or relPath) does not resolve.
    #[error("unknown seed: {seed}")]
    UnknownSeed {
        /// The seed value the caller passed.
        seed: String,
    },

    /// Caller passed mutually exclusive or otherwise conflicting options.
    #[error("conflicting options: {details}")]
    ConflictingOptions {
        /// Description of the conflict.
        details: String,
    },

    // ---- Data errors (§7: parser failure / corruption) ----
    /// A single file failed to parse. The rest of the index is fine;
    /// the caller already fell back to a single-chunk file (see
    /// `parser::parse_file`), this variant is for places that still want
    /// to surface it as a structured warning.
    #[error("parse error for {path}: {message}")]
    Parse {
        /// Path to the file that failed to parse.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// A persisted record (chunk, symbol, edge) failed to deserialize or
    /// violates an invariant. The owning file is marked for reingest.
    #[error("corrupt record for {rel_path}: {details}")]
    CorruptRecord {
        /// Project-relative path of the file the record belongs to.
        rel_path: String,
        /// Diagnostic details.
        details: String,
    },

    /// Embedding inference failed for a chunk after retries were exhausted.
    /// Keyword search still works for the affected chunk.
    #[error("embedding error for chunk {chunk_id}: {message}")]
    Embed {
        /// Database ID of the chunk that failed to embed.
        chunk_id: i64,
        /// Human-readable error description.
        message: String,
    },

    /// Requested file or symbol was not found in the index.
    #[error("not found: {entity}")]
    NotFound {
        /// Description of what was not found.
        entity: String,
    },

    // ---- Environment errors (§7: retried with backoff, else surfaced) ----
    /// Embedding model is unavailable. System falls back to keyword-only search.
    #[error("embedding model unavailable: {reason}")]
    ModelUnavailable {
        /// Why the model couldn't be loaded.
        reason: String,
    },

    /// Vector index is unavailable. System falls back to keyword-only search.
    #[error("vector index unavailable: {reason}")]
    VectorUnavailable {
        /// Why the vector index couldn't be loaded.
        reason: String,
    },

    /// A configured store (server-mode Postgres/graph/cache) could not be
    /// reached within the configured timeout.
    #[error("store unreachable: {store}: {reason}")]
    StoreUnreachable {
        /// Which store (`vector`, `graph`, `cache`, `registry`).
        store: &'static str,
        /// Why the connection failed.
        reason: String,
    },

    /// Not enough disk space to continue indexing.
    #[error("insufficient disk space: {available_mb}MB available, {required_mb}MB required")]
    InsufficientDisk {
        /// Available space in megabytes.
        available_mb: u64,
        /// Required space in megabytes.
        required_mb: u64,
    },

    // ---- Fatal / config ----
    /// Database corruption detected. Requires reindex.
    #[error("database corruption: {details}")]
    DatabaseCorruption {
        /// Diagnostic details.
        details: String,
    },

    /// Configuration is invalid or missing required fields.
    #[error("configuration error: {details}")]
    Config {
        /// What's wrong with the config.
        details: String,
    },

    // ---- Cancellation (§7: distinguished from failure) ----
    /// The operation was cancelled (explicit cancel or deadline elapsed).
    /// Re-invocation of the same operation is safe.
    #[error("operation cancelled: {operation}")]
    Cancelled {
        /// Name of the cancelled operation.
        operation: String,
    },

    // ---- Wrapped external errors ----
    /// SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OmniError {
    /// Classify this error into one of the four taxonomy kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownProject { .. }
            | Self::PathInvalid { .. }
            | Self::AlreadyInitialized { .. }
            | Self::UnknownFile { .. }
            | Self::UnknownSeed { .. }
            | Self::ConflictingOptions { .. }
            | Self::NotFound { .. } => ErrorKind::Input,

            Self::Parse { .. } | Self::CorruptRecord { .. } | Self::DatabaseCorruption { .. } => {
                ErrorKind::Data
            }

            Self::Embed { .. }
            | Self::ModelUnavailable { .. }
            | Self::VectorUnavailable { .. }
            | Self::StoreUnreachable { .. }
            | Self::InsufficientDisk { .. }
            | Self::Database(_)
            | Self::Io(_) => ErrorKind::Environment,

            Self::Cancelled { .. } => ErrorKind::Cancellation,

            Self::Config { .. } | Self::Serialization(_) | Self::Internal(_) => {
                ErrorKind::Environment
            }
        }
    }

    /// Stable machine-readable code for this error, safe to show to an
    /// external caller (no internal type names, no stack traces).
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownProject { .. } => "UnknownProject",
            Self::PathInvalid { .. } => "PathInvalid",
            Self::AlreadyInitialized { .. } => "AlreadyInitialized",
            Self::UnknownFile { .. } => "UnknownFile",
            Self::UnknownSeed { .. } => "UnknownSeed",
            Self::ConflictingOptions { .. } => "ConflictingOptions",
            Self::Parse { .. } => "ParseError",
            Self::CorruptRecord { .. } => "CorruptRecord",
            Self::Embed { .. } => "EmbedError",
            Self::NotFound { .. } => "NotFound",
            Self::ModelUnavailable { .. } => "ModelUnavailable",
            Self::VectorUnavailable { .. } => "VectorUnavailable",
            Self::StoreUnreachable { .. } => "StoreUnreachable",
            Self::InsufficientDisk { .. } => "InsufficientDisk",
            Self::DatabaseCorruption { .. } => "DatabaseCorruption",
            Self::Config { .. } => "ConfigError",
            Self::Cancelled { .. } => "Cancelled",
            Self::Database(_) => "DatabaseError",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// The offending resource identifier, if this error names one
    /// (project ref, path, chunk id, ...). Used to populate the `context`
    /// field of the Tool API's `{code, message, context}` error triple.
    pub fn context(&self) -> Option<String> {
        match self {
            Self::UnknownProject { project_ref } => Some(project_ref.clone()),
            Self::PathInvalid { path, .. } | Self::AlreadyInitialized { path } => {
                Some(path.display().to_string())
            }
            Self::UnknownFile { rel_path } | Self::CorruptRecord { rel_path, .. } => {
                Some(rel_path.clone())
            }
            Self::UnknownSeed { seed } => Some(seed.clone()),
            Self::Parse { path, .. } => Some(path.display().to_string()),
            Self::Embed { chunk_id, .. } => Some(chunk_id.to_string()),
            Self::NotFound { entity } => Some(entity.clone()),
            Self::StoreUnreachable { store, .. } => Some((*store).to_string()),
            Self::Cancelled { operation } => Some(operation.clone()),
            _ => None,
        }
    }
}

/// Convenience type alias for Results in omni-core.
pub type OmniResult<T> = Result<T, OmniError>;

/// The `{code, message, context}` triple returned to Tool API callers.
/// This is the only error shape that crosses the process boundary; it
/// never carries an internal stack trace or Rust type name.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolError {
    /// Stable machine-readable code, e.g. `UnknownProject`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Identifier of the offending resource, if any.
    pub context: Option<String>,
}

impl From<&OmniError> for ToolError {
    fn from(e: &OmniError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
            context: e.context(),
        }
    }
}

impl From<OmniError> for ToolError {
    fn from(e: OmniError) -> Self {
        Self::from(&e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(
            OmniError::UnknownProject { project_ref: "x".into() }.kind(),
            ErrorKind::Input
        );
        assert_eq!(
            OmniError::Parse { path: "a.rs".into(), message: "boom".into() }.kind(),
            ErrorKind::Data
        );
        assert_eq!(
            OmniError::ModelUnavailable { reason: "oom".into() }.kind(),
            ErrorKind::Environment
        );
        assert_eq!(
            OmniError::Cancelled { operation: "Search".into() }.kind(),
            ErrorKind::Cancellation
        );
    }

    #[test]
    fn test_tool_error_never_leaks_type_name() {
        let err = OmniError::UnknownFile { rel_path: "src/lib.rs".into() };
        let tool_err: ToolError = (&err).into();
        assert_eq!(tool_err.code, "UnknownFile");
        assert_eq!(tool_err.context.as_deref(), Some("src/lib.rs"));
        assert!(!tool_err.message.contains("OmniError"));
    }
}
