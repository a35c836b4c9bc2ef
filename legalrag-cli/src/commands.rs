use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use legalrag::evaluation::{self, EvaluationReport};
use legalrag::loader::{DataValidator, DocumentLoader, ValidationCheck, save_chunks_jsonl};
use legalrag::{IndexBuilder, Metric, Orchestrator, RagConfig, ValidatedAnswer, VectorIndex};
use tracing::info;

use crate::providers::{self, Backend};

#[derive(Parser)]
#[command(name = "legalrag")]
#[command(about = "Grounded question answering over legal documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML configuration file; `LEGALRAG_<SECTION>_<FIELD>` variables override it
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Embedding and generation backend
    #[arg(long, value_enum, default_value_t = Backend::Mock, global = true)]
    pub backend: Backend,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chunk, embed and index the document collection
    BuildIndex {
        /// Document file (.json or .jsonl); defaults to data.raw_data_path
        #[arg(long)]
        input: Option<PathBuf>,

        /// Override rag.metric (l2 or cosine)
        #[arg(long)]
        metric: Option<Metric>,
    },
    /// Ask a question against the persisted index
    Ask {
        /// The question
        question: String,

        /// Number of chunks to retrieve; defaults to rag.top_k
        #[arg(long)]
        top_k: Option<usize>,

        /// Answer without retrieval
        #[arg(long)]
        no_rag: bool,

        /// Print the result and safety report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run data-quality checks on the document collection
    ValidateData {
        /// Document file (.json or .jsonl); defaults to data.raw_data_path
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Measure retrieval and answer quality on the built-in questions
    Evaluate {
        /// Retrieval cut-off for recall and MRR
        #[arg(long, default_value_t = 5)]
        k: usize,

        /// Where to write the JSON report
        #[arg(long, default_value = "reports/evaluation_results.json")]
        output: PathBuf,
    },
}

pub async fn handle_build_index(
    mut config: RagConfig,
    backend: Backend,
    input: Option<PathBuf>,
    metric: Option<Metric>,
) -> Result<()> {
    if let Some(metric) = metric {
        config.rag.metric = metric;
    }
    let raw_path = input.unwrap_or_else(|| config.data.raw_data_path.clone());
    let documents = DocumentLoader::load(&raw_path)?;

    for check in DataValidator::validate_all(&documents) {
        info!(check = %check.check, passed = check.passed, "{}", check.details);
    }

    let embedder = providers::embedding_provider(backend, &config.model)?;
    let index = IndexBuilder::new(embedder, config.rag.metric)
        .build_index(&documents, config.rag.chunk_size, config.rag.chunk_overlap)
        .await?;
    save_chunks_jsonl(index.chunks(), &config.data.processed_data_path)?;
    index.save(&config.data.index_path)?;

    println!("Index built successfully");
    println!("  Documents:  {}", documents.len());
    println!("  Chunks:     {}", index.len());
    println!("  Metric:     {}", index.metric());
    println!("  Index path: {}", config.data.index_path.display());
    Ok(())
}

pub async fn handle_ask(
    config: RagConfig,
    backend: Backend,
    question: &str,
    top_k: Option<usize>,
    use_rag: bool,
    json: bool,
) -> Result<()> {
    let top_k = top_k.unwrap_or(config.rag.top_k);
    let orchestrator = load_orchestrator(config, backend)?;
    let answer = orchestrator.query_validated(question, top_k, use_rag).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }
    Ok(())
}

pub fn handle_validate_data(config: &RagConfig, input: Option<PathBuf>) -> Result<()> {
    let raw_path = input.unwrap_or_else(|| config.data.raw_data_path.clone());
    let documents = DocumentLoader::load(&raw_path)?;
    let checks = DataValidator::validate_all(&documents);

    println!("{} documents in {}", documents.len(), raw_path.display());
    for check in &checks {
        print_check(check);
    }
    Ok(())
}

pub async fn handle_evaluate(config: RagConfig, backend: Backend, k: usize, output: PathBuf) -> Result<()> {
    let top_k = config.rag.top_k;
    let orchestrator = load_orchestrator(config, backend)?;
    let report = evaluation::evaluate(&orchestrator, &evaluation::default_queries(), k, top_k).await?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&output, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("writing {}", output.display()))?;

    print_report(&report);
    println!("\nResults saved to {}", output.display());
    Ok(())
}

fn load_orchestrator(config: RagConfig, backend: Backend) -> Result<Orchestrator> {
    let index = VectorIndex::load(&config.data.index_path).with_context(|| {
        format!("loading index from {} (run `legalrag build-index` first)", config.data.index_path.display())
    })?;
    let embedder = providers::embedding_provider(backend, &config.model)?;
    if embedder.dimensions() != index.embedding_dim() {
        bail!(
            "index has dimension {} but the {} embedder produces {}",
            index.embedding_dim(),
            embedder.name(),
            embedder.dimensions()
        );
    }
    let generator = providers::generation_provider(backend, &config.model)?;

    Ok(Orchestrator::builder()
        .config(config)
        .embedding_provider(embedder)
        .index(index)
        .generation_provider(generator)
        .build()?)
}

fn print_answer(answer: &ValidatedAnswer) {
    let result = &answer.result;
    println!("Answer:\n{}\n", result.answer);

    if !result.sources.is_empty() {
        println!("Sources:");
        for (i, source) in result.sources.iter().enumerate() {
            println!("  {}. {} ({}) similarity {:.3}", i + 1, source.document, source.chunk_id, source.similarity);
        }
        println!();
    }
    println!("Confidence: {:.2} | Latency: {:.0} ms", result.confidence_score, result.latency_ms);

    if let Some(safety) = &answer.safety {
        println!("Safety:");
        for (name, check) in safety.iter() {
            let status = if check.passed { "ok" } else { "flagged" };
            println!("  {name}: {status} - {}", check.message);
        }
    }
}

fn print_check(check: &ValidationCheck) {
    let status = if check.passed { "PASS" } else { "WARN" };
    println!("  [{status}] {}: {}", check.check, check.details);
}

fn print_report(report: &EvaluationReport) {
    println!("=== EVALUATION RESULTS ===");
    println!("Retrieval Recall@{}: {:.2}", report.retrieval.k, report.retrieval.recall_at_k);
    println!("Retrieval MRR: {:.2}", report.retrieval.mrr);
    println!("Avg Answer Length: {:.0} words", report.generation.avg_answer_words);
    println!("Has Sources: {:.0}%", report.generation.has_sources_ratio * 100.0);
    println!(
        "Avg Latency: {:.0} ms (min {:.0}, max {:.0}, std {:.1})",
        report.generation.avg_latency_ms, report.latency.min, report.latency.max, report.latency.std
    );
}
