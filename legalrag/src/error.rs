//! Error types for the `legalrag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in indexing, retrieval and generation.
///
/// An empty retrieval is deliberately not represented here: it is a valid
/// state that the [`Orchestrator`](crate::Orchestrator) answers with a fixed
/// refusal.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking parameters, an unknown metric, or any other
    /// configuration that cannot be used.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A vector did not have the dimensionality the index was built with.
    #[error("Dimension mismatch in {operation}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The index operation that rejected the vector.
        operation: &'static str,
        /// The index's fixed embedding dimension.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// The number of vectors and metadata records passed together differ.
    #[error("Length mismatch in {operation}: {vectors} vectors but {metadata} metadata records")]
    LengthMismatch {
        /// The index operation that rejected the input.
        operation: &'static str,
        /// Number of vectors supplied.
        vectors: usize,
        /// Number of metadata records supplied.
        metadata: usize,
    },

    /// A persisted index could not be restored as a consistent pair.
    #[error("Corrupt index at {}: {message}", path.display())]
    CorruptIndex {
        /// The base path of the persisted index.
        path: PathBuf,
        /// A description of the inconsistency.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation provider failed. Never retried.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A caller-imposed deadline elapsed before the operation finished.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        /// The operation that was cancelled.
        operation: &'static str,
        /// The deadline that was exceeded.
        timeout_ms: u64,
    },

    /// Documents could not be read or decoded.
    #[error("Loader error ({}): {message}", path.display())]
    LoaderError {
        /// The file being loaded.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An I/O failure while reading or writing a file.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl RagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
