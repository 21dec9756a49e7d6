//! AST parsing subsystem using tree-sitter.
//!
//! This module provides language-agnostic AST parsing with per-language
//! structural extractors. Each supported language registers an analyzer
//! that maps tree-sitter AST nodes to OmniContext structural elements.
//!
//! ## Architecture
//!
//! ```text
//! Source File -> Language Detection -> tree-sitter Grammar
//!            -> Incremental Parse -> CST
//!            -> Structural Extraction -> Vec<StructuralElement>
//! ```
//!
//! The parser is stateless and can be invoked from multiple threads
//! via `spawn_blocking`.

pub mod registry;
pub mod languages;

use std::path::Path;

use crate::error::OmniResult;
use crate::types::{ChunkKind, ImportStatement, Language, Visibility};

/// Quality tier of a registered language analyzer.
///
/// Surfaced to callers (`Status`, `ParserTiers`) so hosts can tell a
/// full AST-backed extraction apart from a best-effort regex/heuristic one
/// or the line-based fallback used for unsupported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserTier {
    /// Full tree-sitter grammar, structural extraction.
    Ast,
    /// Heuristic/regex-based extraction (no grammar, or grammar too shallow).
    Regex,
    /// No analyzer registered; a single file-kind chunk was emitted.
    Fallback,
}

impl ParserTier {
    /// Database/wire string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ast => "ast",
            Self::Regex => "regex",
            Self::Fallback => "fallback",
        }
    }
}

/// Derive a dotted/slashed module name from a file's path relative to the
/// project root. Used by every language analyzer to namespace the
/// fully-qualified symbol paths it produces.
///
/// Falls back to `"mod"` for paths with no usable file stem (matches the
/// convention already used by `RustAnalyzer`).
pub fn build_module_name_from_path(file_path: &Path) -> String {
    file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mod")
        .to_string()
}

/// A structural element extracted from an AST.
#[derive(Debug, Clone)]
pub struct StructuralElement {
    /// Fully qualified name of this element.
    pub symbol_path: String,
    /// Short name (last component of symbol_path).
    pub name: String,
    /// What kind of construct this is.
    pub kind: ChunkKind,
    /// Visibility specifier.
    pub visibility: Visibility,
    /// Starting line (1-indexed).
    pub line_start: u32,
    /// Ending line (1-indexed, inclusive).
    pub line_end: u32,
    /// Raw source code of this element.
    pub content: String,
    /// Extracted doc comment, if present.
    pub doc_comment: Option<String>,
    /// Symbols referenced within this element (for dependency extraction).
    pub references: Vec<String>,
}

/// Trait that each language analyzer must implement.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "python", "rust").
    fn language_id(&self) -> &str;

    /// Returns the tree-sitter `Language` for this analyzer.
    fn tree_sitter_language(&self) -> tree_sitter::Language;

    /// Extract structural elements from a parsed tree.
    fn extract_structure(
        &self,
        tree: &tree_sitter::Tree,
        source: &[u8],
        file_path: &Path,
    ) -> Vec<StructuralElement>;

    /// Extract import statements from a parsed tree for dependency graph construction.
    ///
    /// Default implementation returns empty (languages can override).
    fn extract_imports(
        &self,
        _tree: &tree_sitter::Tree,
        _source: &[u8],
        _file_path: &Path,
    ) -> Vec<ImportStatement> {
        Vec::new()
    }

    /// Quality tier of this analyzer. Defaults to `Ast` since every
    /// registered analyzer is backed by a real tree-sitter grammar except
    /// `DocumentAnalyzer`, which overrides this to `Regex`.
    fn tier(&self) -> ParserTier {
        ParserTier::Ast
    }
}

/// Build the single residual chunk emitted when no analyzer is registered
/// for a file's language, or when the registered analyzer's grammar fails
/// to parse the file. Retrieval stays possible (keyword + embedding over
/// the whole file) even though no symbols/edges are produced.
fn fallback_chunk(source: &[u8], file_path: &Path) -> StructuralElement {
    let content = String::from_utf8_lossy(source).into_owned();
    let line_end = content.lines().count().max(1) as u32;
    StructuralElement {
        symbol_path: build_module_name_from_path(file_path),
        name: build_module_name_from_path(file_path),
        kind: ChunkKind::TopLevel,
        visibility: Visibility::Public,
        line_start: 1,
        line_end,
        content,
        doc_comment: None,
        references: Vec::new(),
    }
}

/// Parse a source file and extract its structural elements.
///
/// This is the primary entry point for the parser. It:
/// 1. Detects the language from the file extension
/// 2. Loads the appropriate tree-sitter grammar
/// 3. Parses the source code
/// 4. Extracts structural elements via the language analyzer
///
/// Never fails the caller's ingest run: an unregistered language or a
/// tree-sitter parse failure both degrade to a single `fallback` chunk
/// rather than propagating an error. The returned `ParserTier` tells the
/// caller which path was taken so it can record it on the `File` row and
/// surface it from `Status`.
pub fn parse_file(
    file_path: &Path,
    source: &[u8],
    language: Language,
) -> OmniResult<(Vec<StructuralElement>, ParserTier)> {
    let registry = registry::global_registry();

    let Some(analyzer) = registry.get(language) else {
        tracing::warn!(
            path = %file_path.display(),
            %language,
            "no analyzer registered for language, emitting fallback chunk"
        );
        return Ok((vec![fallback_chunk(source, file_path)], ParserTier::Fallback));
    };

    let mut parser = tree_sitter::Parser::new();
    if let Err(e) = parser.set_language(&analyzer.tree_sitter_language()) {
        tracing::warn!(path = %file_path.display(), error = %e, "failed to set tree-sitter language, emitting fallback chunk");
        return Ok((vec![fallback_chunk(source, file_path)], ParserTier::Fallback));
    }

    let Some(tree) = parser.parse(source, None) else {
        tracing::warn!(
            path = %file_path.display(),
            "tree-sitter returned None (parse timeout or malformed input), emitting fallback chunk"
        );
        return Ok((vec![fallback_chunk(source, file_path)], ParserTier::Fallback));
    };

    let elements = analyzer.extract_structure(&tree, source, file_path);
    Ok((elements, analyzer.tier()))
}

/// Extract import statements from a source file.
///
/// Uses the same tree-sitter parse infrastructure as `parse_file`.
pub fn parse_imports(
    file_path: &Path,
    source: &[u8],
    language: Language,
) -> OmniResult<Vec<ImportStatement>> {
    let registry = registry::global_registry();

    let Some(analyzer) = registry.get(language) else {
        return Ok(Vec::new());
    };

    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&analyzer.tree_sitter_language()).is_err() {
        return Ok(Vec::new());
    }

    let Some(tree) = parser.parse(source, None) else {
        return Ok(Vec::new());
    };

    Ok(analyzer.extract_imports(&tree, source, file_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_unknown_language_falls_back() {
        let (elements, tier) = parse_file(
            Path::new("test.xyz"),
            b"hello world",
            Language::Unknown,
        )
        .expect("fallback never errors");
        assert_eq!(tier, ParserTier::Fallback);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ChunkKind::TopLevel);
    }
}
