//! Configuration for indexing and querying.
//!
//! A [`RagConfig`] can be built in code with [`RagConfig::builder`], read
//! from a YAML file, and overlaid with `LEGALRAG_<SECTION>_<FIELD>`
//! environment variables. Every constructor path ends in
//! [`RagConfig::validate`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::index::Metric;

/// Prefix of environment variables recognised by [`RagConfig::apply_env`].
pub const ENV_PREFIX: &str = "LEGALRAG_";

/// Embedding and generation model settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Embedding model identifier passed to the embedding backend.
    pub embedding_model_name: String,
    /// Dimension of the embedding vectors.
    pub embedding_dim: usize,
    /// Chat model identifier passed to the generation backend.
    pub llm_model_name: String,
    /// Maximum tokens generated per answer.
    pub llm_max_tokens: u32,
    /// Sampling temperature.
    pub llm_temperature: f32,
    /// Nucleus sampling cutoff.
    pub llm_top_p: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_model_name: "text-embedding-3-small".to_string(),
            embedding_dim: 384,
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_max_tokens: 512,
            llm_temperature: 0.3,
            llm_top_p: 0.9,
        }
    }
}

/// Chunking, retrieval and answering settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Words per chunk.
    pub chunk_size: usize,
    /// Words shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Index metric.
    pub metric: Metric,
    /// Name of the instruction template used for grounded prompts.
    pub system_prompt_template: String,
    /// Run the safety validator on every answer.
    pub enable_safety_checks: bool,
    /// Deadline for one query, in milliseconds.
    pub query_timeout_ms: Option<u64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 100,
            top_k: 3,
            metric: Metric::L2,
            system_prompt_template: "legal".to_string(),
            enable_safety_checks: true,
            query_timeout_ms: Some(30_000),
        }
    }
}

/// Locations of input documents and build artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// JSON or JSONL document collection.
    pub raw_data_path: PathBuf,
    /// Where processed chunks are exported as JSONL.
    pub processed_data_path: PathBuf,
    /// Base path of the persisted index.
    pub index_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_data_path: PathBuf::from("data/raw/sample_legal_docs.json"),
            processed_data_path: PathBuf::from("data/processed/chunks.jsonl"),
            index_path: PathBuf::from("data/indices/faiss_index.bin"),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Model settings.
    pub model: ModelConfig,
    /// Chunking and retrieval settings.
    pub rag: RetrievalConfig,
    /// File locations.
    pub data: DataConfig,
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: RagConfig = serde_yaml::from_str(yaml)
            .map_err(|e| RagError::ConfigError(format!("invalid YAML configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        debug!(path = %path.display(), "loaded configuration file");
        Self::from_yaml_str(&yaml)
    }

    /// Load from `path` if given (defaults otherwise), then overlay the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(unicode_vars(std::env::vars_os()))?;
        Ok(config)
    }

    /// Overlay `LEGALRAG_<SECTION>_<FIELD>` variables, e.g.
    /// `LEGALRAG_RAG_TOP_K=5` or `LEGALRAG_DATA_INDEX_PATH=/tmp/index.bin`.
    ///
    /// Unknown keys are logged and ignored; unparseable values are errors.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(rest) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let rest = rest.to_ascii_lowercase();
            let Some((section, field)) = rest.split_once('_') else {
                warn!(var = key.as_ref(), "expected {ENV_PREFIX}<SECTION>_<FIELD>, ignoring");
                continue;
            };
            let value = value.as_ref();
            let applied = match section {
                "model" => self.apply_model_var(field, value)?,
                "rag" => self.apply_rag_var(field, value)?,
                "data" => self.apply_data_var(field, value),
                _ => false,
            };
            if applied {
                debug!(var = key.as_ref(), "applied environment override");
            } else {
                warn!(var = key.as_ref(), "unknown configuration variable, ignoring");
            }
        }
        self.validate()
    }

    fn apply_model_var(&mut self, field: &str, value: &str) -> Result<bool> {
        let model = &mut self.model;
        match field {
            "embedding_model_name" => model.embedding_model_name = value.to_string(),
            "embedding_dim" => model.embedding_dim = parse_env(field, value)?,
            "llm_model_name" => model.llm_model_name = value.to_string(),
            "llm_max_tokens" => model.llm_max_tokens = parse_env(field, value)?,
            "llm_temperature" => model.llm_temperature = parse_env(field, value)?,
            "llm_top_p" => model.llm_top_p = parse_env(field, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn apply_rag_var(&mut self, field: &str, value: &str) -> Result<bool> {
        let rag = &mut self.rag;
        match field {
            "chunk_size" => rag.chunk_size = parse_env(field, value)?,
            "chunk_overlap" => rag.chunk_overlap = parse_env(field, value)?,
            "top_k" => rag.top_k = parse_env(field, value)?,
            "metric" | "metric_type" => rag.metric = value.parse()?,
            "system_prompt_template" => rag.system_prompt_template = value.to_string(),
            "enable_safety_checks" => rag.enable_safety_checks = parse_env(field, value)?,
            "query_timeout_ms" => rag.query_timeout_ms = Some(parse_env(field, value)?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn apply_data_var(&mut self, field: &str, value: &str) -> bool {
        let data = &mut self.data;
        match field {
            "raw_data_path" => data.raw_data_path = PathBuf::from(value),
            "processed_data_path" => data.processed_data_path = PathBuf::from(value),
            "index_path" => data.index_path = PathBuf::from(value),
            _ => return false,
        }
        true
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embedding_dim == 0`
    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.model.embedding_dim == 0 {
            return Err(RagError::ConfigError("embedding_dim must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Keep variables whose name and value are valid UTF-8. Skipped entries are
/// logged only when they look like one of ours.
fn unicode_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter().filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
        (Ok(key), Ok(value)) => Some((key, value)),
        (Ok(key), Err(_)) => {
            if key.starts_with(ENV_PREFIX) {
                warn!(var = %key, "value is not valid UTF-8, ignoring");
            }
            None
        }
        (Err(key), _) => {
            if key.to_string_lossy().starts_with(ENV_PREFIX) {
                warn!(var = %key.to_string_lossy(), "name is not valid UTF-8, ignoring");
            }
            None
        }
    })
}

fn parse_env<T>(field: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| RagError::ConfigError(format!("invalid value '{value}' for {field}: {e}")))
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the chunk size in words.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.rag.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in words.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.rag.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.rag.top_k = k;
        self
    }

    /// Set the index metric.
    pub fn metric(mut self, metric: Metric) -> Self {
        self.config.rag.metric = metric;
        self
    }

    /// Set the embedding dimension.
    pub fn embedding_dim(mut self, dim: usize) -> Self {
        self.config.model.embedding_dim = dim;
        self
    }

    /// Set the grounded prompt template name.
    pub fn prompt_template(mut self, name: impl Into<String>) -> Self {
        self.config.rag.system_prompt_template = name.into();
        self
    }

    /// Enable or disable post-generation safety checks.
    pub fn enable_safety_checks(mut self, enabled: bool) -> Self {
        self.config.rag.enable_safety_checks = enabled;
        self
    }

    /// Set the per-query deadline.
    pub fn query_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.config.rag.query_timeout_ms = timeout_ms;
        self
    }

    /// Set the base path of the persisted index.
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data.index_path = path.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
