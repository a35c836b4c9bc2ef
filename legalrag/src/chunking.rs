//! Overlapping word-window chunking.
//!
//! [`WordWindowChunker`] slides a window of `chunk_size` words over the
//! normalized document text, advancing `chunk_size - overlap` words per step.
//! Every non-empty document yields at least one chunk, and the last window
//! always ends on the last word.

use std::collections::HashMap;

use serde_json::Value;

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};
use crate::normalize::normalize;

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s without embeddings; vectors are computed
/// later by the [`IndexBuilder`](crate::IndexBuilder).
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace content.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into windows of `chunk_size` words that share `overlap` words
/// with their predecessor.
///
/// Chunk IDs are generated as `{doc_id}_chunk_{chunk_index}`.
///
/// # Example
///
/// ```
/// use legalrag::{Chunker, Document, WordWindowChunker};
///
/// let chunker = WordWindowChunker::new(4, 1).unwrap();
/// let doc = Document::new("nda", "NDA", "one two three four five six seven", "inline");
/// let chunks = chunker.chunk(&doc);
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[1].content, "four five six seven");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordWindowChunker {
    chunk_size: usize,
    overlap: usize,
}

impl WordWindowChunker {
    /// Create a new chunker.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `0 <= overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Maximum number of words per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of words shared by consecutive chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk already-normalized text on behalf of a document.
    pub fn chunk_text(&self, doc_id: &str, title: &str, normalized_text: &str) -> Vec<Chunk> {
        self.chunk_with_metadata(doc_id, title, normalized_text, &HashMap::new())
    }

    fn chunk_with_metadata(
        &self,
        doc_id: &str,
        title: &str,
        normalized_text: &str,
        metadata: &HashMap<String, Value>,
    ) -> Vec<Chunk> {
        let words: Vec<&str> = normalized_text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        // offsets[i] is the approximate character position of word i when the
        // words are separated by exactly one space.
        let mut offsets = Vec::with_capacity(words.len());
        let mut cursor = 0;
        for word in &words {
            offsets.push(cursor);
            cursor += word.chars().count() + 1;
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(words.len());
            let last = end - 1;
            let chunk_index = chunks.len();

            chunks.push(Chunk {
                chunk_id: format!("{doc_id}_chunk_{chunk_index}"),
                content: words[start..end].join(" "),
                source_doc_id: doc_id.to_string(),
                source_title: title.to_string(),
                chunk_index,
                start_char: offsets[start],
                end_char: offsets[last] + words[last].chars().count(),
                metadata: metadata.clone(),
            });

            if end == words.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl Chunker for WordWindowChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = normalize(&document.content);
        self.chunk_with_metadata(&document.id, &document.title, &text, &document.metadata)
    }
}

/// Chunk `normalized_text` with the given window parameters.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] unless `0 <= overlap < chunk_size`.
pub fn chunk(
    doc_id: &str,
    title: &str,
    normalized_text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    Ok(WordWindowChunker::new(chunk_size, overlap)?.chunk_text(doc_id, title, normalized_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(count: usize) -> String {
        (0..count).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(matches!(WordWindowChunker::new(10, 10), Err(RagError::ConfigError(_))));
        assert!(matches!(WordWindowChunker::new(10, 25), Err(RagError::ConfigError(_))));
        assert!(matches!(WordWindowChunker::new(0, 0), Err(RagError::ConfigError(_))));
        assert!(WordWindowChunker::new(10, 9).is_ok());
        assert!(WordWindowChunker::new(1, 0).is_ok());
    }

    #[test]
    fn nda_of_600_words_yields_two_overlapping_chunks() {
        let text = numbered_words(600);
        let chunks = chunk("nda", "NDA", &text, 512, 100).unwrap();

        assert_eq!(chunks.len(), 2);
        let first: Vec<&str> = chunks[0].content.split(' ').collect();
        let second: Vec<&str> = chunks[1].content.split(' ').collect();
        assert_eq!(first.len(), 512);
        assert_eq!(first[0], "w0");
        assert_eq!(first[511], "w511");
        assert_eq!(second.len(), 188);
        assert_eq!(second[0], "w412");
        assert_eq!(second[187], "w599");
    }

    #[test]
    fn short_document_yields_single_chunk() {
        let chunks = chunk("short", "Short", "only five words right here", 512, 100).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, chunks[0].content.len());
    }

    #[test]
    fn empty_and_whitespace_documents_yield_nothing() {
        let chunker = WordWindowChunker::new(8, 2).unwrap();
        assert!(chunker.chunk_text("a", "A", "").is_empty());
        assert!(chunker.chunk(&Document::new("b", "B", " \n\t ", "inline")).is_empty());
    }

    #[test]
    fn ids_indices_and_metadata_follow_the_document() {
        let doc = Document::new("privacy", "Privacy Policy", numbered_words(25), "inline")
            .with_metadata("doc_type", "policy");
        let chunks = WordWindowChunker::new(10, 3).unwrap().chunk(&doc);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.chunk_id, format!("privacy_chunk_{i}"));
            assert_eq!(chunk.source_doc_id, "privacy");
            assert_eq!(chunk.source_title, "Privacy Policy");
            assert_eq!(chunk.metadata.get("doc_type"), Some(&Value::from("policy")));
            assert_eq!(chunk.end_char - chunk.start_char, chunk.content.chars().count());
        }
    }

    #[test]
    fn offsets_advance_by_word_lengths() {
        let chunks = chunk("d", "D", "aa bbb c dddd", 2, 1).unwrap();
        let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start_char, c.end_char)).collect();
        assert_eq!(spans, vec![(0, 6), (3, 8), (7, 13)]);
    }

    #[test]
    fn raw_content_is_normalized_before_chunking() {
        let doc = Document::new("d", "D", "Section 1.\n\n  The  Parties\tagree.", "inline");
        let chunks = WordWindowChunker::new(16, 4).unwrap().chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Section 1. The Parties agree.");
    }
}
