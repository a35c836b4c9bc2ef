//! Rule-based grounding, length and refusal checks over generated answers.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::RetrievedChunk;

/// Report key of the source grounding check.
pub const SOURCE_GROUNDING: &str = "source_grounding";
/// Report key of the answer length check.
pub const LENGTH: &str = "length";
/// Report key of the refusal detection check.
pub const REFUSAL: &str = "refusal";

/// Phrases that mark an answer as a refusal or an admission of uncertainty.
pub const REFUSAL_PHRASES: &[&str] = &[
    "i don't know",
    "i cannot",
    "not found",
    "not mentioned",
    "no information",
    "not available",
    "not specified",
    "not stated",
    "documents do not contain",
];

const MIN_ANSWER_WORDS: usize = 10;
const MAX_REPETITION_RATIO: f64 = 2.0;

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the check passed.
    pub passed: bool,
    /// Human-readable explanation.
    pub message: String,
}

impl CheckResult {
    fn pass(message: impl Into<String>) -> Self {
        Self { passed: true, message: message.into() }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self { passed: false, message: message.into() }
    }
}

/// Results of every check, keyed by check name.
///
/// The `refusal` entry has `passed == false` when a refusal phrase was found.
/// That outcome is informational: a refusal is a legitimate answer when the
/// documents lack the information, so callers should surface it rather than
/// reject the answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafetyReport {
    checks: BTreeMap<String, CheckResult>,
}

impl SafetyReport {
    /// Look up a check by name.
    pub fn get(&self, check: &str) -> Option<&CheckResult> {
        self.checks.get(check)
    }

    /// Iterate over `(name, result)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CheckResult)> {
        self.checks.iter().map(|(name, result)| (name.as_str(), result))
    }

    /// Whether the refusal check detected a refusal phrase.
    pub fn is_refusal(&self) -> bool {
        self.get(REFUSAL).is_some_and(|r| !r.passed)
    }

    /// Whether the grounding and length checks both passed.
    pub fn is_grounded(&self) -> bool {
        [SOURCE_GROUNDING, LENGTH].iter().all(|name| self.get(name).is_some_and(|r| r.passed))
    }

    fn insert(&mut self, name: &str, result: CheckResult) {
        self.checks.insert(name.to_string(), result);
    }
}

/// Runs the three post-generation checks.
///
/// Every check always runs; none short-circuits another.
#[derive(Debug, Clone)]
pub struct SafetyValidator {
    min_answer_words: usize,
    max_repetition_ratio: f64,
}

impl Default for SafetyValidator {
    fn default() -> Self {
        Self { min_answer_words: MIN_ANSWER_WORDS, max_repetition_ratio: MAX_REPETITION_RATIO }
    }
}

impl SafetyValidator {
    /// Create a validator with the standard thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `answer` against the chunks it was generated from.
    pub fn validate(&self, answer: &str, retrieved_chunks: &[RetrievedChunk]) -> SafetyReport {
        let mut report = SafetyReport::default();
        report.insert(SOURCE_GROUNDING, self.check_source_grounding(answer, retrieved_chunks));

        let context_words: usize = retrieved_chunks.iter().map(|r| r.chunk.word_count()).sum();
        report.insert(LENGTH, self.check_length(answer, context_words));
        report.insert(REFUSAL, detect_refusal(answer));

        for (name, result) in report.iter().filter(|(_, r)| !r.passed) {
            warn!(check = name, message = %result.message, "safety check flagged answer");
        }
        debug!(grounded = report.is_grounded(), refusal = report.is_refusal(), "safety validation done");
        report
    }

    /// Fails without supporting chunks, or when the answer repeats itself
    /// more than the allowed `word_count / distinct_word_count` ratio.
    pub fn check_source_grounding(&self, answer: &str, retrieved_chunks: &[RetrievedChunk]) -> CheckResult {
        if retrieved_chunks.is_empty() {
            return CheckResult::fail("No source documents provided");
        }

        let words: Vec<&str> = answer.split_whitespace().collect();
        let distinct: HashSet<&str> = words.iter().copied().collect();
        if !distinct.is_empty() {
            let ratio = words.len() as f64 / distinct.len() as f64;
            if ratio > self.max_repetition_ratio {
                return CheckResult::fail(format!(
                    "Answer seems repetitive or hallucinated (repetition ratio {ratio:.2})"
                ));
            }
        }

        CheckResult::pass("Answer appears grounded")
    }

    /// Fails for answers shorter than the minimum word count or longer than
    /// `context_words`.
    pub fn check_length(&self, answer: &str, context_words: usize) -> CheckResult {
        let answer_words = answer.split_whitespace().count();
        if answer_words < self.min_answer_words {
            return CheckResult::fail(format!("Answer is too brief ({answer_words} words)"));
        }
        if answer_words > context_words {
            return CheckResult::fail(format!(
                "Answer is longer than source context ({answer_words} > {context_words} words)"
            ));
        }
        CheckResult::pass("Answer length is appropriate")
    }
}

/// Case-insensitive search for any of [`REFUSAL_PHRASES`].
pub fn detect_refusal(answer: &str) -> CheckResult {
    let lowered = answer.to_lowercase();
    match REFUSAL_PHRASES.iter().find(|phrase| lowered.contains(*phrase)) {
        Some(phrase) => CheckResult::fail(format!("Detected refusal pattern: '{phrase}'")),
        None => CheckResult::pass("No refusal detected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn context(words: usize) -> Vec<RetrievedChunk> {
        let content = (0..words).map(|i| format!("term{i}")).collect::<Vec<_>>().join(" ");
        vec![RetrievedChunk {
            chunk: Chunk {
                chunk_id: "contract_chunk_0".to_string(),
                end_char: content.len(),
                content,
                source_doc_id: "contract".to_string(),
                source_title: "Contract".to_string(),
                chunk_index: 0,
                start_char: 0,
                metadata: Default::default(),
            },
            similarity_score: 0.8,
        }]
    }

    const GOOD_ANSWER: &str =
        "Based on the documents, the clause states that all parties must comply with regulations.";

    #[test]
    fn five_word_answer_is_too_brief() {
        let report = SafetyValidator::new().validate("The fee is ten dollars.", &context(500));
        let length = report.get(LENGTH).unwrap();
        assert!(!length.passed);
        assert!(length.message.contains("too brief"));
    }

    #[test]
    fn answer_longer_than_context_fails_length() {
        let result = SafetyValidator::new().check_length(GOOD_ANSWER, 8);
        assert!(!result.passed);
        assert!(result.message.contains("longer than source context"));
    }

    #[test]
    fn well_formed_answer_passes_everything() {
        let report = SafetyValidator::new().validate(GOOD_ANSWER, &context(500));
        assert!(report.is_grounded());
        assert!(!report.is_refusal());
        assert_eq!(report.iter().count(), 3);
    }

    #[test]
    fn no_chunks_fails_grounding_but_other_checks_still_run() {
        let report = SafetyValidator::new().validate(GOOD_ANSWER, &[]);
        assert!(!report.get(SOURCE_GROUNDING).unwrap().passed);
        assert!(!report.get(LENGTH).unwrap().passed);
        assert!(report.get(REFUSAL).unwrap().passed);
    }

    #[test]
    fn repetitive_answer_fails_grounding() {
        let answer = "shall shall shall pay pay pay rent rent rent";
        let result = SafetyValidator::new().check_source_grounding(answer, &context(50));
        assert!(!result.passed);
    }

    #[test]
    fn repetition_ratio_of_exactly_two_passes() {
        let answer = "pay rent pay rent";
        assert!(SafetyValidator::new().check_source_grounding(answer, &context(50)).passed);
    }

    #[test]
    fn refusal_is_detected_case_insensitively() {
        assert!(!detect_refusal("I DON'T KNOW about this topic.").passed);
        assert!(!detect_refusal("The provided documents do not contain information about this topic.").passed);
        assert!(detect_refusal("Based on the documents, the answer is clause 4.").passed);
    }

    #[test]
    fn refusal_is_informational_not_grounding_failure() {
        let answer = "The termination notice period is not specified in the excerpts provided to me here.";
        let report = SafetyValidator::new().validate(answer, &context(500));
        assert!(report.is_refusal());
        assert!(report.is_grounded());
    }

    #[test]
    fn report_serializes_as_name_keyed_map() {
        let report = SafetyValidator::new().validate(GOOD_ANSWER, &context(500));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["length"]["passed"], serde_json::Value::Bool(true));
        assert!(json["refusal"]["message"].is_string());
    }
}
