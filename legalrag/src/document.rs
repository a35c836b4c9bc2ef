//! Data types for documents, chunks, and retrieval results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A source document as produced by a document source.
///
/// Documents are immutable once loaded. The index only keeps the
/// [`Chunk`]s derived from them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Human-readable title, surfaced in prompts and source references.
    pub title: String,
    /// The full text content.
    pub content: String,
    /// Where the document came from (file name, URL, generator, ...).
    pub source: String,
    /// Free-form metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            source: source.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A contiguous word window of a single [`Document`].
///
/// `start_char` and `end_char` are computed from cumulative word lengths over
/// the normalized text, so they approximate rather than exactly locate the
/// window in the original content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Identifier of the form `{doc_id}_chunk_{chunk_index}`.
    pub chunk_id: String,
    /// Window words joined by single spaces.
    pub content: String,
    /// The ID of the parent [`Document`].
    pub source_doc_id: String,
    /// The title of the parent [`Document`].
    pub source_title: String,
    /// Zero-based, dense position of this chunk within its document.
    pub chunk_index: usize,
    /// Approximate character offset of the first word.
    pub start_char: usize,
    /// Approximate character offset one past the last word.
    pub end_char: usize,
    /// Metadata inherited from the parent document.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Chunk {
    /// Number of whitespace-separated words in the chunk content.
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// A [`Chunk`] paired with the similarity computed for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// The retrieved chunk.
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Metric-dependent similarity; higher is more relevant.
    pub similarity_score: f32,
}

/// A compact citation of a retrieved chunk returned with every answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReference {
    /// Title of the document the chunk came from.
    pub document: String,
    /// The cited chunk.
    pub chunk_id: String,
    /// The chunk's similarity to the question.
    pub similarity: f32,
}

impl From<&RetrievedChunk> for SourceReference {
    fn from(retrieved: &RetrievedChunk) -> Self {
        Self {
            document: retrieved.chunk.source_title.clone(),
            chunk_id: retrieved.chunk.chunk_id.clone(),
            similarity: retrieved.similarity_score,
        }
    }
}
