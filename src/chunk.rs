//! Word-boundary text chunker.
//!
//! Splits normalized document text into fixed-size, non-overlapping word
//! windows. Chunking is deterministic: identical text and chunk size always
//! produce the identical chunk sequence, so re-indexing a document is
//! idempotent. Joining chunk texts in order with single spaces reconstructs
//! the whitespace-normalized original.
//!
//! Chunk ids are `{document_id}_chunk_{index}` with indices contiguous
//! from 0.

use crate::models::Chunk;

/// Split text into word-window chunks of at most `chunk_size_words` words.
/// Empty or whitespace-only text yields no chunks.
pub fn chunk_text(document_id: &str, text: &str, chunk_size_words: usize) -> Vec<Chunk> {
    let size = chunk_size_words.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    words
        .chunks(size)
        .enumerate()
        .map(|(index, window)| {
            let start_word = (index * size) as i64;
            Chunk {
                id: format!("{}_chunk_{}", document_id, index),
                document_id: document_id.to_string(),
                chunk_index: index as i64,
                text: window.join(" "),
                token_count: window.len() as i64,
                start_word,
                end_word: start_word + window.len() as i64,
            }
        })
        .collect()
}
