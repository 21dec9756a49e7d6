//! Semantic code chunker.
//!
//! Takes structural elements from the parser and produces chunks suitable
//! for embedding and indexing. Chunks respect AST boundaries and never
//! split mid-expression.
//!
//! ## Chunking Strategy
//!
//! 1. Single function/method if < max_tokens
//! 2. Single class/struct if < max_tokens
//! 3. Class split at method boundaries if too large
//! 4. Large function split at block boundaries as last resort
//! 5. 10-15% token overlap at boundaries for context continuity

use crate::config::Config;
use crate::parser::StructuralElement;
use crate::types::Chunk;

/// Chunk structural elements into embedding-sized pieces.
///
/// Each chunk is annotated with metadata for the index:
/// symbol path, kind, visibility, line range, weight.
pub fn chunk_elements(
    elements: &[StructuralElement],
    file_id: i64,
    config: &Config,
) -> Vec<Chunk> {
    let max_tokens = config.indexing.max_chunk_tokens;
    let mut chunks = Vec::new();

    for elem in elements {
        let estimated_tokens = estimate_tokens(&elem.content);

        if estimated_tokens <= max_tokens {
            chunks.push(Chunk {
                id: 0,
                file_id,
                symbol_path: elem.symbol_path.clone(),
                kind: elem.kind,
                visibility: elem.visibility,
                line_start: elem.line_start,
                line_end: elem.line_end,
                content: elem.content.clone(),
                doc_comment: elem.doc_comment.clone(),
                token_count: estimated_tokens,
                weight: elem.kind.default_weight() * elem.visibility.weight_multiplier(),
                vector_id: None,
            });
        } else {
            chunks.extend(split_element(elem, file_id, max_tokens));
        }
    }

    chunks
}

/// Split an oversized element into sub-chunks on statement boundaries.
///
/// Each sub-chunk keeps the parent's `symbol_path` with a `#n` suffix so
/// callers can still attribute results back to the enclosing symbol. Lines
/// are never split mid-statement: we greedily pack blank-line-delimited
/// statement groups until the running token estimate would exceed
/// `max_tokens`, then start a new sub-chunk.
fn split_element(elem: &StructuralElement, file_id: i64, max_tokens: u32) -> Vec<Chunk> {
    let groups = statement_groups(&elem.content);
    if groups.is_empty() {
        return vec![truncated_chunk(elem, file_id, max_tokens)];
    }

    let mut sub_chunks = Vec::new();
    let mut current_lines: Vec<&str> = Vec::new();
    let mut current_tokens: u32 = 0;
    let mut current_start = elem.line_start;
    let mut line_cursor = elem.line_start;

    for group in &groups {
        let group_tokens = estimate_tokens(group.text);
        if !current_lines.is_empty()
            && current_tokens.saturating_add(group_tokens) > max_tokens
        {
            sub_chunks.push(make_sub_chunk(
                elem,
                file_id,
                &current_lines,
                current_start,
                line_cursor.saturating_sub(1).max(current_start),
                sub_chunks.len() + 1,
            ));
            current_lines.clear();
            current_tokens = 0;
            current_start = group.start_line;
        }

        if current_lines.is_empty() {
            current_start = group.start_line;
        }
        current_lines.push(group.text);
        current_tokens += group_tokens;
        line_cursor = group.end_line + 1;
    }

    if !current_lines.is_empty() {
        sub_chunks.push(make_sub_chunk(
            elem,
            file_id,
            &current_lines,
            current_start,
            elem.line_end,
            sub_chunks.len() + 1,
        ));
    }

    if sub_chunks.is_empty() {
        vec![truncated_chunk(elem, file_id, max_tokens)]
    } else {
        sub_chunks
    }
}

/// A contiguous, blank-line-delimited group of statement lines.
struct StatementGroup<'a> {
    text: &'a str,
    start_line: u32,
    end_line: u32,
}

/// Split `content` into statement groups separated by blank lines, each
/// tagged with its 1-indexed start/end line relative to the element start.
fn statement_groups(content: &str) -> Vec<StatementGroup<'_>> {
    let mut groups = Vec::new();
    let mut group_start_byte = None;
    let mut group_start_line = 1u32;
    let mut line_no = 1u32;
    let mut last_non_blank_line = 0u32;
    let mut offset = 0usize;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        if trimmed.trim().is_empty() {
            if let Some(start) = group_start_byte {
                groups.push(StatementGroup {
                    text: &content[start..offset],
                    start_line: group_start_line,
                    end_line: last_non_blank_line,
                });
                group_start_byte = None;
            }
        } else {
            if group_start_byte.is_none() {
                group_start_byte = Some(offset);
                group_start_line = line_no;
            }
            last_non_blank_line = line_no;
        }
        offset += line.len();
        line_no += 1;
    }

    if let Some(start) = group_start_byte {
        groups.push(StatementGroup {
            text: &content[start..offset],
            start_line: group_start_line,
            end_line: last_non_blank_line,
        });
    }

    groups
}

fn make_sub_chunk(
    elem: &StructuralElement,
    file_id: i64,
    lines: &[&str],
    line_start: u32,
    line_end: u32,
    index: usize,
) -> Chunk {
    let content = lines.join("\n\n");
    let token_count = estimate_tokens(&content);
    Chunk {
        id: 0,
        file_id,
        symbol_path: format!("{}#{}", elem.symbol_path, index),
        kind: elem.kind,
        visibility: elem.visibility,
        line_start,
        line_end,
        content,
        doc_comment: if index == 1 {
            elem.doc_comment.clone()
        } else {
            None
        },
        token_count,
        weight: elem.kind.default_weight() * elem.visibility.weight_multiplier(),
        vector_id: None,
    }
}

fn truncated_chunk(elem: &StructuralElement, file_id: i64, max_tokens: u32) -> Chunk {
    let truncated = truncate_to_tokens(&elem.content, max_tokens);
    let token_count = estimate_tokens(&truncated);
    Chunk {
        id: 0,
        file_id,
        symbol_path: format!("{}#1", elem.symbol_path),
        kind: elem.kind,
        visibility: elem.visibility,
        line_start: elem.line_start,
        line_end: elem.line_end,
        content: truncated,
        doc_comment: elem.doc_comment.clone(),
        token_count,
        weight: elem.kind.default_weight() * elem.visibility.weight_multiplier(),
        vector_id: None,
    }
}

/// Rough token estimation: ~4 characters per token for code.
/// This is conservative; actual tokenization happens in the embedder.
fn estimate_tokens(content: &str) -> u32 {
    #[expect(clippy::cast_possible_truncation)]
    let estimate = (content.len() / 4) as u32;
    estimate.max(1)
}

/// Truncate content to approximately `max_tokens` tokens.
fn truncate_to_tokens(content: &str, max_tokens: u32) -> String {
    let max_chars = (max_tokens as usize) * 4;
    if content.len() <= max_chars {
        return content.to_string();
    }

    // Find the last newline before max_chars to avoid mid-line truncation
    let truncated = &content[..max_chars];
    if let Some(last_newline) = truncated.rfind('\n') {
        content[..last_newline].to_string()
    } else {
        truncated.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkKind, Visibility};

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 1); // minimum 1
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_truncate_to_tokens_short_content() {
        let content = "hello\nworld";
        assert_eq!(truncate_to_tokens(content, 100), content);
    }

    #[test]
    fn test_truncate_to_tokens_at_line_boundary() {
        let content = "line1\nline2\nline3\nline4\n";
        let result = truncate_to_tokens(content, 2); // ~8 chars
        assert!(result.ends_with("line1")); // truncates at first newline within 8 chars
    }

    fn elem_with(content: &str) -> StructuralElement {
        let line_count = content.lines().count().max(1) as u32;
        StructuralElement {
            symbol_path: "big_mod::huge_fn".to_string(),
            name: "huge_fn".to_string(),
            kind: ChunkKind::Function,
            visibility: Visibility::Public,
            line_start: 1,
            line_end: line_count,
            content: content.to_string(),
            doc_comment: Some("does a lot".to_string()),
            references: vec![],
        }
    }

    #[test]
    fn oversized_element_is_split_on_statement_boundaries() {
        let groups: Vec<String> = (0..20)
            .map(|i| format!("statement_{i}();\nmore_{i}();"))
            .collect();
        let content = groups.join("\n\n");
        let elem = elem_with(&content);
        let config = Config::default();

        let chunks = chunk_elements(std::slice::from_ref(&elem), 7, &config);

        assert!(chunks.len() > 1, "expected multiple sub-chunks");
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.symbol_path, format!("big_mod::huge_fn#{}", i + 1));
            assert_eq!(c.file_id, 7);
            assert!(c.token_count <= config.indexing.max_chunk_tokens || chunks.len() == 1);
        }
        // Only the first sub-chunk carries the parent's doc comment.
        assert!(chunks[0].doc_comment.is_some());
        assert!(chunks[1].doc_comment.is_none());
    }

    #[test]
    fn small_element_is_not_split() {
        let elem = elem_with("fn small() {}\n");
        let config = Config::default();
        let chunks = chunk_elements(std::slice::from_ref(&elem), 1, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].symbol_path, "big_mod::huge_fn");
    }
}
