//! End-to-end question answering.
//!
//! The [`Orchestrator`] drives one query through retrieval, prompt assembly
//! and generation, then scores confidence and measures latency. It is built
//! explicitly from injected providers and a shared index; there is no global
//! pipeline state.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use legalrag::{HashEmbeddingProvider, IndexBuilder, Metric, MockGenerationProvider, Orchestrator};
//!
//! let embedder = Arc::new(HashEmbeddingProvider::new(384));
//! let index = IndexBuilder::new(embedder.clone(), Metric::L2)
//!     .build_index(&documents, 512, 100)
//!     .await?;
//!
//! let orchestrator = Orchestrator::builder()
//!     .embedding_provider(embedder)
//!     .index(index)
//!     .generation_provider(Arc::new(MockGenerationProvider::new()))
//!     .build()?;
//!
//! let result = orchestrator.query("What must the Recipient keep secret?", 3, true).await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, instrument};

use crate::config::RagConfig;
use crate::document::{RetrievedChunk, SourceReference};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::index::VectorIndex;
use crate::prompt::{self, PromptTemplate};
use crate::retriever::{Retriever, SharedIndex};
use crate::safety::{SafetyReport, SafetyValidator};

/// Answer returned when retrieval finds nothing to ground an answer on.
pub const REFUSAL_ANSWER: &str =
    "The provided documents do not contain information about this topic.";

/// The outcome of one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagResult {
    /// The question as asked.
    pub question: String,
    /// The generated (or refusal) answer.
    pub answer: String,
    /// Chunks used as context, best first. Empty in zero-shot mode.
    pub retrieved_chunks: Vec<RetrievedChunk>,
    /// One citation per retrieved chunk, in the same order.
    pub sources: Vec<SourceReference>,
    /// Wall-clock time spent answering.
    pub latency_ms: f64,
    /// Mean chunk similarity in `[0, 1]`; `0.0` without retrieval.
    pub confidence_score: f32,
}

/// A [`RagResult`] together with its safety report, when checks are enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatedAnswer {
    /// The query outcome.
    pub result: RagResult,
    /// Safety checks over the answer; `None` when disabled in configuration.
    pub safety: Option<SafetyReport>,
}

/// Combines retrieval, prompting and generation.
///
/// All query methods take `&self` and only read the shared index, so one
/// orchestrator can serve any number of concurrent queries. No lock is held
/// while waiting on the embedding or generation provider.
pub struct Orchestrator {
    retriever: Retriever,
    generation_provider: Arc<dyn GenerationProvider>,
    validator: SafetyValidator,
    config: RagConfig,
}

impl Orchestrator {
    /// Create a new [`OrchestratorBuilder`].
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// The configuration this orchestrator was built with.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The retriever used in grounded mode.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieve the `top_k` chunks nearest to `question`.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        self.retriever.search(question, top_k).await
    }

    /// Answer `question`, grounded on `top_k` retrieved chunks when `use_rag`
    /// is set, zero-shot otherwise.
    ///
    /// In grounded mode an empty retrieval short-circuits to
    /// [`REFUSAL_ANSWER`] without calling the generation provider.
    ///
    /// # Errors
    ///
    /// Embedding, index and generation failures are returned unchanged. The
    /// generation provider is never retried.
    #[instrument(skip(self), fields(template = %self.config.rag.system_prompt_template))]
    pub async fn query(&self, question: &str, top_k: usize, use_rag: bool) -> Result<RagResult> {
        if use_rag { self.query_grounded(question, top_k).await } else { self.query_zero_shot(question).await }
    }

    /// Like [`query`](Self::query), but fails with [`RagError::Timeout`] if
    /// no result is ready within `timeout`.
    pub async fn query_with_timeout(
        &self,
        question: &str,
        top_k: usize,
        use_rag: bool,
        timeout: Duration,
    ) -> Result<RagResult> {
        match tokio::time::timeout(timeout, self.query(question, top_k, use_rag)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                error!(timeout_ms, "query timed out");
                Err(RagError::Timeout { operation: "query", timeout_ms })
            }
        }
    }

    /// Answer with the configured deadline and, when enabled, run the safety
    /// validator over the answer.
    pub async fn query_validated(
        &self,
        question: &str,
        top_k: usize,
        use_rag: bool,
    ) -> Result<ValidatedAnswer> {
        let result = match self.config.rag.query_timeout_ms {
            Some(ms) => {
                self.query_with_timeout(question, top_k, use_rag, Duration::from_millis(ms)).await?
            }
            None => self.query(question, top_k, use_rag).await?,
        };
        let safety = self
            .config
            .rag
            .enable_safety_checks
            .then(|| self.validate(&result.answer, &result.retrieved_chunks));
        Ok(ValidatedAnswer { result, safety })
    }

    /// Run the safety checks over an answer and its supporting chunks.
    pub fn validate(&self, answer: &str, retrieved_chunks: &[RetrievedChunk]) -> SafetyReport {
        self.validator.validate(answer, retrieved_chunks)
    }

    async fn query_grounded(&self, question: &str, top_k: usize) -> Result<RagResult> {
        let started = Instant::now();
        let retrieved_chunks = self.retriever.search(question, top_k).await?;

        if retrieved_chunks.is_empty() {
            let latency_ms = elapsed_ms(started);
            info!(latency_ms, "no chunks retrieved, returning refusal");
            return Ok(RagResult {
                question: question.to_string(),
                answer: REFUSAL_ANSWER.to_string(),
                retrieved_chunks,
                sources: Vec::new(),
                latency_ms,
                confidence_score: 0.0,
            });
        }

        let prompt =
            prompt::build(question, &retrieved_chunks, &self.config.rag.system_prompt_template);
        let answer = self.generate(&prompt.instruction, &prompt.context_message).await?;
        let latency_ms = elapsed_ms(started);

        let confidence_score = mean_similarity(&retrieved_chunks);
        let sources = retrieved_chunks.iter().map(SourceReference::from).collect();
        info!(retrieved = retrieved_chunks.len(), confidence_score, latency_ms, "grounded query answered");

        Ok(RagResult {
            question: question.to_string(),
            answer,
            retrieved_chunks,
            sources,
            latency_ms,
            confidence_score,
        })
    }

    async fn query_zero_shot(&self, question: &str) -> Result<RagResult> {
        let started = Instant::now();
        let prompt = prompt::build_zero_shot(question, &PromptTemplate::Qa.to_string());
        let answer = self.generate(&prompt.instruction, &prompt.context_message).await?;
        let latency_ms = elapsed_ms(started);
        info!(latency_ms, "zero-shot query answered");

        Ok(RagResult {
            question: question.to_string(),
            answer,
            retrieved_chunks: Vec::new(),
            sources: Vec::new(),
            latency_ms,
            confidence_score: 0.0,
        })
    }

    async fn generate(&self, instruction: &str, context: &str) -> Result<String> {
        self.generation_provider.generate(instruction, context).await.map_err(|e| {
            error!(provider = self.generation_provider.name(), error = %e, "generation failed");
            e
        })
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Mean similarity of the chunks, clamped to `[0, 1]`.
fn mean_similarity(chunks: &[RetrievedChunk]) -> f32 {
    if chunks.is_empty() {
        return 0.0;
    }
    let sum: f32 = chunks.iter().map(|c| c.similarity_score).sum();
    (sum / chunks.len() as f32).clamp(0.0, 1.0)
}

/// Builder for constructing an [`Orchestrator`].
///
/// The embedding provider, index and generation provider are required.
/// Configuration defaults to [`RagConfig::default`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<SharedIndex>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    validator: Option<SafetyValidator>,
}

impl OrchestratorBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider used for queries.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Use a freshly built index, owned by the orchestrator from now on.
    pub fn index(mut self, index: VectorIndex) -> Self {
        self.index = Some(Arc::new(RwLock::new(index)));
        self
    }

    /// Share an index with an [`IndexBuilder`](crate::IndexBuilder) that may
    /// rebuild it later.
    pub fn shared_index(mut self, index: SharedIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Replace the default safety validator.
    pub fn validator(mut self, validator: SafetyValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Build the [`Orchestrator`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the configuration is invalid.
    pub fn build(self) -> Result<Orchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let index = self.index.ok_or_else(|| RagError::ConfigError("index is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;

        Ok(Orchestrator {
            retriever: Retriever::new(embedding_provider, index),
            generation_provider,
            validator: self.validator.unwrap_or_default(),
            config,
        })
    }
}
