//! JSON-RPC protocol types for daemon IPC.
//!
//! All communication between the VS Code extension and the daemon
//! uses newline-delimited JSON-RPC 2.0 messages over named pipes.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 envelope
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version, always "2.0".
    pub jsonrpc: String,
    /// Request ID for correlating responses.
    pub id: u64,
    /// Method name.
    pub method: String,
    /// Method parameters (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version, always "2.0".
    pub jsonrpc: String,
    /// Request ID this response corresponds to.
    pub id: u64,
    /// Successful result (mutually exclusive with `error`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error result (mutually exclusive with `result`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Response {
    /// Create a success response.
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: u64, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Method-specific parameter types
// ---------------------------------------------------------------------------

/// Parameters for the `search` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// The search query.
    pub query: String,
    /// Maximum results.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Parameters for the `get_file_context` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetFileContextParams {
    /// Path relative to the repository root.
    pub rel_path: String,
    /// Whether to also return chunks one hop away via `imports`/`calls` edges.
    #[serde(default)]
    pub include_related: bool,
}

/// Parameters for the `get_relationships` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRelationshipsParams {
    /// A symbol id (as a string) or a file-relative path.
    pub seed: String,
    /// Edge kinds to follow; omit to match every kind.
    pub edge_kinds: Option<Vec<String>>,
    /// Traversal direction: `"in"`, `"out"`, or `"both"` (default).
    pub direction: Option<String>,
    /// Hop count, clamped to 5.
    pub depth: Option<usize>,
}

/// One file change as reported by the `apply_changes` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangeParam {
    /// 'created', 'modified', or 'deleted'.
    pub kind: String,
    /// Path relative to the repository root.
    pub rel_path: String,
}

/// Parameters for the `apply_changes` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyChangesParams {
    /// Files created, modified, or deleted since the last index.
    #[serde(default)]
    pub changes: Option<Vec<FileChangeParam>>,
    /// If true, ignore `changes` and rebuild the index from scratch.
    #[serde(default)]
    pub full_reindex: Option<bool>,
}

/// Parameters for the `get_coding_standards` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCodingStandardsParams {
    /// Restrict detection to one category: 'validation', 'error_handling',
    /// 'logging', or 'testing'. Omit to run all four.
    pub category: Option<String>,
}

fn default_limit() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Standard JSON-RPC error codes.
pub mod error_codes {
    #![allow(dead_code)]
    /// Invalid JSON was received by the server.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Engine-specific error (indexing, search, etc.).
    pub const ENGINE_ERROR: i32 = -32000;
}
