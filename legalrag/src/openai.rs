//! OpenAI-backed embedding and generation providers.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! providers call the REST API directly with `reqwest` and share request
//! plumbing and error decoding.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::ModelConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;

const PROVIDER: &str = "OpenAI";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Which error variant a failure maps to.
#[derive(Clone, Copy)]
enum Capability {
    Embedding,
    Generation,
}

impl Capability {
    fn error(self, message: impl Into<String>) -> RagError {
        let provider = PROVIDER.to_string();
        let message = message.into();
        match self {
            Capability::Embedding => RagError::EmbeddingError { provider, message },
            Capability::Generation => RagError::GenerationError { provider, message },
        }
    }
}

/// Authenticated JSON client shared by both providers.
#[derive(Clone)]
struct ApiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ApiClient {
    fn new(api_key: String, capability: Capability) -> Result<Self> {
        if api_key.is_empty() {
            return Err(capability.error("API key must not be empty"));
        }
        Ok(Self { http: reqwest::Client::new(), api_key, base_url: DEFAULT_BASE_URL.to_string() })
    }

    fn from_env(capability: Capability) -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .map_err(|_| capability.error(format!("{API_KEY_VAR} environment variable not set")))?;
        Self::new(api_key, capability)
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
        capability: Capability,
    ) -> Result<Resp> {
        let url = format!("{}/{endpoint}", self.base_url.trim_end_matches('/'));
        let response =
            self.http.post(&url).bearer_auth(&self.api_key).json(body).send().await.map_err(|e| {
                error!(provider = PROVIDER, endpoint, error = %e, "request failed");
                capability.error(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, endpoint, %status, "API error");
            return Err(capability.error(format!("API returned {status}: {}", error_detail(&body))));
        }

        response.json().await.map_err(|e| {
            error!(provider = PROVIDER, endpoint, error = %e, "failed to parse response");
            capability.error(format!("failed to parse response: {e}"))
        })
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// The API's own error message if the body carries one, else the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body).map(|e| e.error.message).unwrap_or_else(|_| body.to_string())
}

// Embeddings

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// An [`EmbeddingProvider`] backed by the `/embeddings` endpoint.
///
/// The requested dimensionality is always sent, so the vectors match the
/// index dimension configured in [`ModelConfig::embedding_dim`].
///
/// # Example
///
/// ```rust,ignore
/// use legalrag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?.with_dimensions(384);
/// let embedding = provider.embed("termination clause").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: ApiClient,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider with the given API key and default model settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let defaults = ModelConfig::default();
        Ok(Self {
            client: ApiClient::new(api_key.into(), Capability::Embedding)?,
            model: defaults.embedding_model_name,
            dimensions: defaults.embedding_dim,
        })
    }

    /// Create a provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let defaults = ModelConfig::default();
        Ok(Self {
            client: ApiClient::from_env(Capability::Embedding)?,
            model: defaults.embedding_model_name,
            dimensions: defaults.embedding_dim,
        })
    }

    /// Take model name and dimension from `config`.
    pub fn with_config(self, config: &ModelConfig) -> Self {
        self.with_model(&config.embedding_model_name).with_dimensions(config.embedding_dim)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// Point at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| Capability::Embedding.error("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request = EmbeddingRequest { model: &self.model, input: texts, dimensions: self.dimensions };
        let response: EmbeddingResponse =
            self.client.post("embeddings", &request, Capability::Embedding).await?;
        ordered_embeddings(response, texts.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// Restore input order and check that every input got exactly one vector.
fn ordered_embeddings(mut response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(Capability::Embedding.error(format!(
            "API returned {} embeddings for {expected} inputs",
            response.data.len()
        )));
    }
    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

// Chat completions

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// A [`GenerationProvider`] backed by the `/chat/completions` endpoint.
///
/// The instruction is sent as the system message and the context message as
/// the user message. Sampling settings come from [`ModelConfig`].
pub struct OpenAIGenerationProvider {
    client: ApiClient,
    settings: ModelConfig,
}

impl OpenAIGenerationProvider {
    /// Create a provider with the given API key and default model settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(api_key.into(), Capability::Generation)?,
            settings: ModelConfig::default(),
        })
    }

    /// Create a provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Ok(Self { client: ApiClient::from_env(Capability::Generation)?, settings: ModelConfig::default() })
    }

    /// Take the chat model and sampling settings from `config`.
    pub fn with_config(mut self, config: &ModelConfig) -> Self {
        self.settings = config.clone();
        self
    }

    /// Point at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }

    fn request<'a>(&'a self, instruction: &'a str, context: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.settings.llm_model_name,
            messages: [
                ChatMessage { role: "system", content: instruction },
                ChatMessage { role: "user", content: context },
            ],
            max_tokens: self.settings.llm_max_tokens,
            temperature: self.settings.llm_temperature,
            top_p: self.settings.llm_top_p,
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAIGenerationProvider {
    async fn generate(&self, instruction: &str, context: &str) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.settings.llm_model_name,
            context_len = context.len(),
            "requesting chat completion"
        );
        let response: ChatResponse = self
            .client
            .post("chat/completions", &self.request(instruction, context), Capability::Generation)
            .await?;
        first_reply(response)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

fn first_reply(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| Capability::Generation.error("API returned no completion"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(OpenAIEmbeddingProvider::new(""), Err(RagError::EmbeddingError { .. })));
        assert!(matches!(OpenAIGenerationProvider::new(""), Err(RagError::GenerationError { .. })));
    }

    #[test]
    fn chat_request_carries_model_settings() {
        let config = ModelConfig { llm_model_name: "gpt-test".into(), llm_max_tokens: 64, ..Default::default() };
        let provider = OpenAIGenerationProvider::new("sk-test").unwrap().with_config(&config);
        let json = serde_json::to_value(provider.request("be precise", "QUESTION: x")).unwrap();

        assert_eq!(json["model"], "gpt-test");
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be precise");
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [{"index": 1, "embedding": [0.0, 1.0]}, {"index": 0, "embedding": [1.0, 0.0]}]}"#,
        )
        .unwrap();
        assert_eq!(ordered_embeddings(response, 2).unwrap(), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

        let short: EmbeddingResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(ordered_embeddings(short, 1).is_err());
    }

    #[test]
    fn missing_completion_is_a_generation_error() {
        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(first_reply(empty), Err(RagError::GenerationError { .. })));

        let reply: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "  The fee is $10,000. "}}]}"#).unwrap();
        assert_eq!(first_reply(reply).unwrap(), "The fee is $10,000.");
    }

    #[test]
    fn api_error_message_is_extracted() {
        assert_eq!(error_detail(r#"{"error": {"message": "bad key"}}"#), "bad key");
        assert_eq!(error_detail("gateway timeout"), "gateway timeout");
    }
}
