//! Generation provider trait and a deterministic offline implementation.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// An opaque text-generation capability.
///
/// The orchestrator calls [`generate`](GenerationProvider::generate) exactly
/// once per answered query and never retries: a second call could produce a
/// different answer.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Produce an answer for the given instruction and context message.
    async fn generate(&self, instruction: &str, context: &str) -> Result<String>;

    /// A short provider name used in logs and errors.
    fn name(&self) -> &str;
}

const WHAT_ANSWER: &str = "Based on the provided documents, this question pertains to key information \
that is outlined in the source materials. The documents indicate that proper understanding requires \
careful review of the excerpts provided above.";

const HOW_ANSWER: &str = "According to the documents, the process involves several important steps \
and considerations as detailed in the relevant sections of the source material.";

const DEFAULT_ANSWER: &str = "The provided documents contain relevant information on this topic. \
Please refer to the specific excerpts highlighted in the sources above for detailed information.";

/// A fully deterministic generator that needs no network or model.
///
/// The answer depends only on the context message: one canned answer for
/// "what" questions, one for "how" questions, and a default otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockGenerationProvider;

impl MockGenerationProvider {
    /// Create a new mock generator.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn generate(&self, _instruction: &str, context: &str) -> Result<String> {
        let lowered = context.to_lowercase();
        let answer = if lowered.contains("what") {
            WHAT_ANSWER
        } else if lowered.contains("how") {
            HOW_ANSWER
        } else {
            DEFAULT_ANSWER
        };
        debug!(provider = "Mock", context_len = context.len(), "generated canned answer");
        Ok(answer.to_string())
    }

    fn name(&self) -> &str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_are_deterministic_per_question_kind() {
        let provider = MockGenerationProvider::new();
        let what = provider.generate("", "QUESTION: What is an NDA?").await.unwrap();
        let how = provider.generate("", "QUESTION: How are fees paid?").await.unwrap();
        let other = provider.generate("", "QUESTION: Explain clause 4.").await.unwrap();

        assert_eq!(what, WHAT_ANSWER);
        assert_eq!(how, HOW_ANSWER);
        assert_eq!(other, DEFAULT_ANSWER);
        assert_eq!(provider.generate("", "QUESTION: What is an NDA?").await.unwrap(), what);
    }
}
