//! Offline retrieval and generation quality metrics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::retriever::Retriever;

/// A question paired with the title of the document that should answer it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalQuery {
    /// The question to ask.
    pub question: String,
    /// Title of the document expected among the retrieved chunks.
    pub expected_source: String,
}

impl EvalQuery {
    /// Create a query.
    pub fn new(question: impl Into<String>, expected_source: impl Into<String>) -> Self {
        Self { question: question.into(), expected_source: expected_source.into() }
    }
}

/// The built-in questions over the synthetic legal corpus.
pub fn default_queries() -> Vec<EvalQuery> {
    vec![
        EvalQuery::new(
            "What are the main obligations of the recipient in an NDA?",
            "Non-Disclosure Agreement Template",
        ),
        EvalQuery::new("How much is the total fee in the service agreement?", "Service Agreement"),
        EvalQuery::new("What data retention policy is mentioned?", "Privacy Policy"),
        EvalQuery::new("What benefits are employees entitled to?", "Employment Agreement"),
        EvalQuery::new("What is the disclaimer in the terms of service?", "Terms of Service"),
    ]
}

/// Retrieval quality against expected source titles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    /// Cut-off used for retrieval.
    pub k: usize,
    /// Share of queries whose expected source appears in the top `k`.
    pub recall_at_k: f64,
    /// Mean reciprocal rank of the first chunk from the expected source.
    pub mrr: f64,
    /// Number of queries evaluated.
    pub num_queries: usize,
}

/// Shallow answer statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    /// Mean answer length in words.
    pub avg_answer_words: f64,
    /// Share of answers that cite at least one source.
    pub has_sources_ratio: f64,
    /// Mean end-to-end latency.
    pub avg_latency_ms: f64,
    /// Number of queries evaluated.
    pub num_queries: usize,
}

/// Combined output of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Retrieval metrics.
    pub retrieval: RetrievalMetrics,
    /// Generation metrics.
    pub generation: GenerationMetrics,
    /// Latency distribution of the generation run.
    pub latency: RangeSummary,
}

/// Compute recall@k and MRR for `queries`.
pub async fn evaluate_retrieval(
    retriever: &Retriever,
    queries: &[EvalQuery],
    k: usize,
) -> Result<RetrievalMetrics> {
    let mut recall = RangeAccumulator::new();
    let mut reciprocal_rank = RangeAccumulator::new();

    for query in queries {
        let results = retriever.search(&query.question, k).await?;
        let rank = results.iter().position(|r| r.chunk.source_title == query.expected_source);
        debug!(question = %query.question, rank = ?rank.map(|r| r + 1), "retrieval evaluated");
        recall.add(if rank.is_some() { 1.0 } else { 0.0 });
        reciprocal_rank.add(rank.map_or(0.0, |r| 1.0 / (r + 1) as f64));
    }

    let metrics = RetrievalMetrics {
        k,
        recall_at_k: recall.mean(),
        mrr: reciprocal_rank.mean(),
        num_queries: queries.len(),
    };
    info!(k, recall = metrics.recall_at_k, mrr = metrics.mrr, "retrieval evaluation done");
    Ok(metrics)
}

/// Answer every query and summarize answer length, citations and latency.
pub async fn evaluate_generation(
    orchestrator: &Orchestrator,
    queries: &[EvalQuery],
    top_k: usize,
) -> Result<(GenerationMetrics, RangeSummary)> {
    let mut words = RangeAccumulator::new();
    let mut cited = RangeAccumulator::new();
    let mut latency = RangeAccumulator::new();

    for query in queries {
        let result = orchestrator.query(&query.question, top_k, true).await?;
        words.add(result.answer.split_whitespace().count() as f64);
        cited.add(if result.sources.is_empty() { 0.0 } else { 1.0 });
        latency.add(result.latency_ms);
    }

    let metrics = GenerationMetrics {
        avg_answer_words: words.mean(),
        has_sources_ratio: cited.mean(),
        avg_latency_ms: latency.mean(),
        num_queries: queries.len(),
    };
    info!(
        avg_answer_words = metrics.avg_answer_words,
        has_sources_ratio = metrics.has_sources_ratio,
        avg_latency_ms = metrics.avg_latency_ms,
        "generation evaluation done"
    );
    Ok((metrics, latency.summary()))
}

/// Run retrieval and generation evaluation together.
pub async fn evaluate(
    orchestrator: &Orchestrator,
    queries: &[EvalQuery],
    retrieval_k: usize,
    top_k: usize,
) -> Result<EvaluationReport> {
    let retrieval = evaluate_retrieval(orchestrator.retriever(), queries, retrieval_k).await?;
    let (generation, latency) = evaluate_generation(orchestrator, queries, top_k).await?;
    Ok(EvaluationReport { retrieval, generation, latency })
}

/// Mean Jaccard overlap of lowercase word sets over prediction/reference pairs.
///
/// Pairs where either side has no words are skipped; `None` if no pair is left.
pub fn word_overlap(predictions: &[&str], references: &[&str]) -> Option<f64> {
    let mut overlaps = RangeAccumulator::new();
    for (prediction, reference) in predictions.iter().zip(references) {
        let predicted: HashSet<String> = prediction.split_whitespace().map(str::to_lowercase).collect();
        let expected: HashSet<String> = reference.split_whitespace().map(str::to_lowercase).collect();
        if predicted.is_empty() || expected.is_empty() {
            continue;
        }
        let shared = predicted.intersection(&expected).count();
        let union = predicted.union(&expected).count();
        overlaps.add(shared as f64 / union as f64);
    }
    (overlaps.count() > 0).then(|| overlaps.mean())
}

/// Summary statistics of a [`RangeAccumulator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSummary {
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    /// Smallest value seen.
    pub min: f64,
    /// Largest value seen.
    pub max: f64,
    /// Number of values added.
    pub count: usize,
}

/// Collects values and reports mean, population standard deviation, min and
/// max. All statistics are `0.0` while empty.
#[derive(Debug, Clone, Default)]
pub struct RangeAccumulator {
    values: Vec<f64>,
}

impl RangeAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one value.
    pub fn add(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Number of values recorded.
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Arithmetic mean, or `0.0` when empty.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population standard deviation (divides by `n`), or `0.0` when empty.
    pub fn std(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance =
            self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.values.len() as f64;
        variance.sqrt()
    }

    /// Smallest value, or `0.0` when empty.
    pub fn min(&self) -> f64 {
        self.values.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }

    /// Largest value, or `0.0` when empty.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    /// All statistics at once.
    pub fn summary(&self) -> RangeSummary {
        RangeSummary {
            mean: self.mean(),
            std: self.std(),
            min: self.min(),
            max: self.max(),
            count: self.count(),
        }
    }
}
