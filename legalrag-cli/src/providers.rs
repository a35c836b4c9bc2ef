use std::sync::Arc;

use anyhow::Result;
use clap::ValueEnum;
use legalrag::{EmbeddingProvider, GenerationProvider, HashEmbeddingProvider, MockGenerationProvider, ModelConfig};

/// Which embedding and generation backends to use.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Hashed bag-of-words embeddings and canned answers; works offline.
    Mock,
    /// OpenAI embeddings and chat completions (`OPENAI_API_KEY`).
    #[cfg(feature = "openai")]
    Openai,
}

pub fn embedding_provider(backend: Backend, model: &ModelConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match backend {
        Backend::Mock => Ok(Arc::new(HashEmbeddingProvider::new(model.embedding_dim))),
        #[cfg(feature = "openai")]
        Backend::Openai => {
            let provider = legalrag::openai::OpenAIEmbeddingProvider::from_env()?.with_config(model);
            Ok(Arc::new(provider))
        }
    }
}

#[cfg_attr(not(feature = "openai"), allow(unused_variables))]
pub fn generation_provider(backend: Backend, model: &ModelConfig) -> Result<Arc<dyn GenerationProvider>> {
    match backend {
        Backend::Mock => Ok(Arc::new(MockGenerationProvider::new())),
        #[cfg(feature = "openai")]
        Backend::Openai => {
            let provider = legalrag::openai::OpenAIGenerationProvider::from_env()?.with_config(model);
            Ok(Arc::new(provider))
        }
    }
}
