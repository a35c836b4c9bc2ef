//! Instruction templates and prompt assembly.
//!
//! A prompt is a provider-agnostic `(instruction, context_message)` pair. The
//! instruction is selected from a fixed set of [`PromptTemplate`]s; the
//! context message carries the retrieved excerpts and the question.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::RetrievedChunk;

/// Separator placed between excerpts in the context message.
pub const EXCERPT_DELIMITER: &str = "\n\n---\n\n";

const LEGAL_INSTRUCTION: &str = "You are an expert legal document analysis assistant. Your role is to help users understand and analyze legal documents.

IMPORTANT RULES:
1. Base your answers ONLY on the provided document excerpts. Do not use external knowledge about laws or regulations.
2. If the answer is not found in the provided context, respond clearly: \"The provided documents do not contain information about this topic.\"
3. Always cite the source document when providing information.
4. Be precise and avoid speculation.
5. If there are conflicting statements in different documents, note this explicitly.
6. Structure your response clearly with:
   - Direct answer to the question
   - Supporting details from the documents
   - Source references (document name and excerpt location)

Remember: It's better to say \"I don't know\" than to provide incorrect legal information.";

const QA_INSTRUCTION: &str = "You are a helpful document analysis assistant. Answer questions based on the provided document excerpts.

INSTRUCTIONS:
1. Answer only based on the provided context.
2. If information is not available, say so clearly.
3. Cite sources for all claims.
4. Be concise but complete.
5. Organize your answer logically.";

const SUMMARIZATION_INSTRUCTION: &str = "You are a document summarization expert. Summarize the provided document excerpts.

INSTRUCTIONS:
1. Capture the main points.
2. Maintain accuracy.
3. Keep summary concise but informative.
4. Use clear structure.";

/// The named instruction personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTemplate {
    /// Strict-grounding legal analysis. Default for grounded prompts.
    #[default]
    Legal,
    /// Generic question answering. Default for zero-shot prompts.
    Qa,
    /// Summarization of the excerpts.
    Summarization,
}

impl PromptTemplate {
    /// The instruction text for this template.
    pub fn instruction(self) -> &'static str {
        match self {
            PromptTemplate::Legal => LEGAL_INSTRUCTION,
            PromptTemplate::Qa => QA_INSTRUCTION,
            PromptTemplate::Summarization => SUMMARIZATION_INSTRUCTION,
        }
    }

    /// Resolve a template name, falling back to `default` for unknown names.
    pub fn resolve(name: &str, default: PromptTemplate) -> PromptTemplate {
        name.parse().unwrap_or_else(|_| {
            warn!(template = name, fallback = %default, "unknown prompt template, using fallback");
            default
        })
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PromptTemplate::Legal => "legal",
            PromptTemplate::Qa => "qa",
            PromptTemplate::Summarization => "summarization",
        })
    }
}

impl FromStr for PromptTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legal" => Ok(PromptTemplate::Legal),
            "qa" => Ok(PromptTemplate::Qa),
            "summarization" => Ok(PromptTemplate::Summarization),
            other => Err(format!("unknown prompt template '{other}'")),
        }
    }
}

/// An instruction plus the user-facing context message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// System-level instruction selected from a template.
    pub instruction: String,
    /// Excerpts, question and answer cue.
    pub context_message: String,
}

/// Build a grounded prompt from a question and its retrieved chunks.
///
/// Unknown template names fall back to [`PromptTemplate::Legal`].
pub fn build(question: &str, retrieved_chunks: &[RetrievedChunk], template_name: &str) -> Prompt {
    let template = PromptTemplate::resolve(template_name, PromptTemplate::Legal);

    let excerpts = retrieved_chunks
        .iter()
        .map(|r| {
            format!(
                "**Document: {}** (Chunk {})\n\n{}",
                r.chunk.source_title, r.chunk.chunk_index, r.chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join(EXCERPT_DELIMITER);

    let context_message = format!(
        "Based on the following document excerpts, answer the question:\n\n\
         QUESTION: {question}\n\n\
         DOCUMENT EXCERPTS:\n{excerpts}\n\n\
         ANSWER:"
    );

    Prompt { instruction: template.instruction().to_string(), context_message }
}

/// Build a context-free prompt, used only when retrieval is bypassed.
///
/// Unknown template names fall back to [`PromptTemplate::Qa`].
pub fn build_zero_shot(question: &str, template_name: &str) -> Prompt {
    let template = PromptTemplate::resolve(template_name, PromptTemplate::Qa);
    Prompt {
        instruction: template.instruction().to_string(),
        context_message: format!("Question: {question}\n\nAnswer:"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn retrieved(title: &str, index: usize, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                chunk_id: format!("{title}_chunk_{index}"),
                content: content.to_string(),
                source_doc_id: title.to_lowercase(),
                source_title: title.to_string(),
                chunk_index: index,
                start_char: 0,
                end_char: content.len(),
                metadata: Default::default(),
            },
            similarity_score: 0.5,
        }
    }

    #[test]
    fn grounded_prompt_lists_excerpts_and_question() {
        let chunks =
            vec![retrieved("NDA", 0, "The Recipient shall..."), retrieved("Lease", 3, "Rent is due...")];
        let prompt = build("Who pays rent?", &chunks, "qa");

        assert_eq!(prompt.instruction, QA_INSTRUCTION);
        assert_eq!(
            prompt.context_message,
            "Based on the following document excerpts, answer the question:\n\n\
             QUESTION: Who pays rent?\n\n\
             DOCUMENT EXCERPTS:\n\
             **Document: NDA** (Chunk 0)\n\nThe Recipient shall...\n\n---\n\n\
             **Document: Lease** (Chunk 3)\n\nRent is due...\n\n\
             ANSWER:"
        );
    }

    #[test]
    fn unknown_template_falls_back_to_legal() {
        let prompt = build("q", &[], "pirate");
        assert_eq!(prompt.instruction, LEGAL_INSTRUCTION);
        assert_eq!(PromptTemplate::resolve("SUMMARIZATION", PromptTemplate::Legal), PromptTemplate::Summarization);
    }

    #[test]
    fn zero_shot_prompt_has_no_excerpts() {
        let prompt = build_zero_shot("What is consideration?", "nope");
        assert_eq!(prompt.instruction, QA_INSTRUCTION);
        assert_eq!(prompt.context_message, "Question: What is consideration?\n\nAnswer:");
        assert!(!prompt.context_message.contains("DOCUMENT EXCERPTS"));
    }
}
