//! Free-text retrieval over a [`VectorIndex`].

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::document::RetrievedChunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// A vector index shared between one builder and any number of readers.
pub type SharedIndex = Arc<RwLock<VectorIndex>>;

/// Turns a query string into a ranked list of scored chunks.
///
/// The query is embedded before the index lock is taken, and the read guard
/// is released before results are returned, so no lock is ever held across
/// the embedding call.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: SharedIndex,
}

impl Retriever {
    /// Create a retriever over `index` using `embedding_provider` for queries.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, index: SharedIndex) -> Self {
        Self { embedding_provider, index }
    }

    /// The index this retriever reads from.
    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    /// The embedding provider used for queries.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Retrieve the `k` chunks nearest to `query_text`.
    ///
    /// No relevance threshold is applied: a non-empty index always returns
    /// `min(k, len)` chunks. An empty index returns an empty `Vec`.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures and [`RagError::DimensionMismatch`] if the
    /// provider's vectors do not match the index.
    pub async fn search(&self, query_text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let provider = self.embedding_provider.name().to_string();
        let mut embeddings = self.embedding_provider.embed_batch(&[query_text]).await.map_err(|e| {
            error!(provider = %provider, error = %e, "query embedding failed");
            e
        })?;
        let query_embedding = embeddings.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: provider.clone(),
            message: "provider returned no vector for the query".to_string(),
        })?;

        let index = self.index.read().await;
        let metric = index.metric();
        let hits = index.search(&query_embedding, k)?;
        let results: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter_map(|hit| {
                index.chunk(hit.position).map(|chunk| RetrievedChunk {
                    chunk: chunk.clone(),
                    similarity_score: metric.similarity(hit.score),
                })
            })
            .collect();
        drop(index);

        if results.is_empty() {
            info!(k, "retrieval returned no chunks");
        } else {
            debug!(k, returned = results.len(), top = results[0].similarity_score, "retrieval completed");
        }
        Ok(results)
    }
}
