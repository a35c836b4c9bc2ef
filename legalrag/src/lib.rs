//! Retrieval-augmented question answering over legal documents.
//!
//! This crate provides:
//! - Whitespace normalization and overlapping word-window chunking
//! - A flat exact vector index (L2 or cosine) with paired persistence
//! - Query-time retrieval, prompt assembly and a query orchestrator
//! - Post-generation safety checks
//! - Document loading, data-quality checks and offline evaluation
//!
//! Embedding and generation backends sit behind the [`EmbeddingProvider`]
//! and [`GenerationProvider`] traits. Deterministic implementations are
//! always available; OpenAI backends require the `openai` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use legalrag::{HashEmbeddingProvider, IndexBuilder, MockGenerationProvider, Orchestrator, RagConfig};
//! use legalrag::loader::DocumentLoader;
//!
//! let config = RagConfig::load(None)?;
//! let documents = DocumentLoader::load(&config.data.raw_data_path)?;
//! let embedder = Arc::new(HashEmbeddingProvider::new(config.model.embedding_dim));
//!
//! let index = IndexBuilder::new(embedder.clone(), config.rag.metric)
//!     .build_index(&documents, config.rag.chunk_size, config.rag.chunk_overlap)
//!     .await?;
//!
//! let orchestrator = Orchestrator::builder()
//!     .config(config)
//!     .embedding_provider(embedder)
//!     .index(index)
//!     .generation_provider(Arc::new(MockGenerationProvider::new()))
//!     .build()?;
//!
//! let answer = orchestrator.query_validated("What is the notice period?", 3, true).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod normalize;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod safety;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, WordWindowChunker};
pub use config::{DataConfig, ModelConfig, RagConfig, RagConfigBuilder, RetrievalConfig};
pub use document::{Chunk, Document, RetrievedChunk, SourceReference};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{RagError, Result};
pub use generation::{GenerationProvider, MockGenerationProvider};
pub use index::{Metric, SearchHit, VectorIndex};
pub use ingest::IndexBuilder;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RagResult, ValidatedAnswer, REFUSAL_ANSWER};
pub use prompt::{Prompt, PromptTemplate};
pub use retriever::{Retriever, SharedIndex};
pub use safety::{CheckResult, SafetyReport, SafetyValidator};
