#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Separators tried when a cut point falls mid-content, highest priority
/// first: paragraph break, line break, sentence end, word boundary.
const SEPARATOR_PRIORITY: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A bounded substring of a document's cleaned text, sized for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Deterministic id: `{document_id}_chunk_{index}`.
    pub id: String,
    pub document_id: String,
    pub text: String,
    /// Character offset of the chunk start within the cleaned text.
    pub start_index: usize,
    /// Exclusive character offset of the chunk end.
    pub end_index: usize,
    pub chunk_index: usize,
}

/// Configuration for text chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters of overlap carried into the next chunk.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Normalize whitespace ahead of chunking: unify line endings, collapse
/// runs of spaces and tabs, cap consecutive blank lines at one, and trim.
#[inline]
pub fn clean_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for line in unified.split('\n') {
        let mut collapsed = String::with_capacity(line.len());
        let mut last_was_space = false;
        for ch in line.chars() {
            if ch == ' ' || ch == '\t' {
                if !last_was_space {
                    collapsed.push(' ');
                }
                last_was_space = true;
            } else {
                collapsed.push(ch);
                last_was_space = false;
            }
        }
        let trimmed = collapsed.trim_end();

        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(trimmed);
    }

    out.trim().to_string()
}

/// Split cleaned text into overlapping chunks.
///
/// A window of `chunk_size` characters advances over the text. When the naive
/// cut would land mid-content, the cut moves back to the last separator found
/// in priority order, provided the resulting chunk still reaches past the
/// overlap so the next window makes forward progress. The next window starts
/// at `cut_end - overlap`. Pure function of its inputs: identical text and
/// config always produce identical boundaries.
#[inline]
pub fn chunk_text(document_id: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char start, plus the end sentinel, so windows can
    // be computed in character space and sliced on valid boundaries.
    let mut offsets: Vec<usize> = cleaned.char_indices().map(|(i, _)| i).collect();
    offsets.push(cleaned.len());
    let total_chars = offsets.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index = 0usize;

    while start < total_chars {
        let naive_end = (start + config.chunk_size).min(total_chars);
        let end = if naive_end < total_chars {
            find_separator_cut(&cleaned, &offsets, start, naive_end, config.overlap)
                .unwrap_or(naive_end)
        } else {
            naive_end
        };

        let text_slice = cleaned
            .get(offsets[start]..offsets[end])
            .unwrap_or_default()
            .to_string();
        chunks.push(Chunk {
            id: format!("{}_chunk_{}", document_id, chunk_index),
            document_id: document_id.to_string(),
            text: text_slice,
            start_index: start,
            end_index: end,
            chunk_index,
        });
        chunk_index += 1;

        if end >= total_chars {
            break;
        }
        // Never move backward past the previous start; forward progress is
        // already guaranteed by the separator acceptance bound.
        start = end.saturating_sub(config.overlap).max(start + 1);
    }

    debug!(
        "Chunked document {} into {} chunks ({} cleaned chars)",
        document_id,
        chunks.len(),
        total_chars
    );

    chunks
}

/// Search backward from the naive cut for the highest-priority separator.
/// Returns the exclusive char index just past the separator, or `None` when
/// no separator yields a cut that keeps the next window moving forward.
fn find_separator_cut(
    cleaned: &str,
    offsets: &[usize],
    start: usize,
    naive_end: usize,
    overlap: usize,
) -> Option<usize> {
    let window = cleaned.get(offsets[start]..offsets[naive_end])?;

    for separator in SEPARATOR_PRIORITY {
        if let Some(byte_pos) = window.rfind(separator) {
            let cut_byte = offsets[start] + byte_pos + separator.len();
            // Convert the byte position back to a char index.
            let cut_char = match offsets.binary_search(&cut_byte) {
                Ok(idx) => idx,
                Err(_) => continue,
            };
            // The next window starts at cut - overlap; require the cut to
            // clear the overlap so the window advances.
            if cut_char > start + overlap && cut_char > start {
                return Some(cut_char);
            }
        }
    }
    None
}
