//! Index construction: normalize → chunk → embed → add.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::chunking::{Chunker, WordWindowChunker};
use crate::document::{Chunk, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::{Metric, VectorIndex};
use crate::retriever::SharedIndex;

const DEFAULT_BATCH_SIZE: usize = 32;

/// Builds [`VectorIndex`]es from documents.
///
/// Builds are serialized: concurrent calls on the same builder wait on an
/// internal build lock, so at most one build populates an index at a time.
pub struct IndexBuilder {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    metric: Metric,
    batch_size: usize,
    build_lock: Mutex<()>,
}

impl IndexBuilder {
    /// Create a builder producing indexes under `metric`.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, metric: Metric) -> Self {
        Self { embedding_provider, metric, batch_size: DEFAULT_BATCH_SIZE, build_lock: Mutex::new(()) }
    }

    /// Set how many chunk texts are sent per embedding call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The metric of indexes produced by this builder.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Chunk, embed and index `documents`.
    ///
    /// Documents without content contribute no chunks. The resulting index
    /// has the provider's dimensionality even when it is empty.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`](crate::RagError::ConfigError) for invalid
    ///   chunk parameters or a zero-dimension provider
    /// - embedding failures, and dimension/length mismatches between the
    ///   provider's output and the chunks
    pub async fn build_index(
        &self,
        documents: &[Document],
        chunk_size: usize,
        overlap: usize,
    ) -> Result<VectorIndex> {
        let chunker = WordWindowChunker::new(chunk_size, overlap)?;
        let mut index = VectorIndex::new(self.embedding_provider.dimensions(), self.metric)?;

        let _guard = self.build_lock.lock().await;
        let chunks = chunk_documents(documents, &chunker);
        info!(
            documents = documents.len(),
            chunk_count = chunks.len(),
            chunk_size,
            overlap,
            "building index"
        );

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let vectors = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(
                    provider = self.embedding_provider.name(),
                    first_chunk = %batch[0].chunk_id,
                    error = %e,
                    "embedding failed during index build"
                );
                e
            })?;
            index.add(&vectors, batch.to_vec())?;
        }

        info!(total = index.len(), metric = %self.metric, "index built");
        Ok(index)
    }

    /// Build a fresh index and swap it into `target`.
    ///
    /// The build runs without touching `target`; readers keep using the old
    /// index until the write lock is taken for the swap itself.
    pub async fn rebuild(
        &self,
        target: &SharedIndex,
        documents: &[Document],
        chunk_size: usize,
        overlap: usize,
    ) -> Result<usize> {
        let fresh = self.build_index(documents, chunk_size, overlap).await?;
        let count = fresh.len();
        *target.write().await = fresh;
        info!(total = count, "index swapped");
        Ok(count)
    }
}

/// Chunk every document in order.
pub fn chunk_documents(documents: &[Document], chunker: &dyn Chunker) -> Vec<Chunk> {
    documents.iter().flat_map(|document| chunker.chunk(document)).collect()
}
