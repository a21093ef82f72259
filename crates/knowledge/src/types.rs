//! Core types for the answering pipeline.

use serde::{Deserialize, Serialize};

/// Answer text used whenever the document does not support an answer.
pub const NOT_FOUND_ANSWER: &str = "Information not found in the provided policy document.";

/// Explanation paired with [`NOT_FOUND_ANSWER`] in the fallback record.
pub const NOT_FOUND_EXPLANATION: &str = "No relevant clauses were retrieved for this query.";

/// Answer emitted for a question the understanding stage could not handle.
pub const UNPARSED_ANSWER: &str = "Could not parse query.";

/// A contiguous segment of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier derived from position and content hash
    pub id: String,

    /// Document reference the chunk came from
    pub source: String,

    /// Zero-based order within the document
    pub position: u32,

    pub text: String,

    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Byte range of `text` in the extracted document
    pub byte_range: (usize, usize),

    /// Length of `text` in characters
    pub char_count: usize,

    /// SHA-256 of `text`, hex encoded
    pub hash: String,
}

/// Structured reading of one user question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// The question text
    pub query: String,

    /// Broad field, e.g. "insurance"
    pub domain: String,

    /// Narrower field, e.g. "health", "life", "vehicle"
    pub sub_domain: String,

    /// Clause names or types the question is about
    pub key_clauses: Vec<String>,

    /// Other retrieval hints: durations, beneficiaries, related terms
    pub additional_context: Vec<String>,
}

impl StructuredQuery {
    /// Search text sent to the index: the question enriched with its hints.
    pub fn combined_query(&self) -> String {
        format!(
            "{} {} {}",
            self.query,
            self.key_clauses.join(" "),
            self.additional_context.join(" ")
        )
        .trim()
        .to_string()
    }
}

/// Documents retrieved for one descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub parsed: StructuredQuery,
    /// Deduplicated chunk texts, first-seen order
    pub docs: Vec<String>,
}

/// Structured grounded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub query: String,
    pub answer: String,
    pub supporting_clauses: Vec<String>,
    pub explanation: String,
}

impl AnswerRecord {
    /// Record returned when the model output cannot be used.
    pub fn not_found(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: NOT_FOUND_ANSWER.to_string(),
            supporting_clauses: Vec::new(),
            explanation: NOT_FOUND_EXPLANATION.to_string(),
        }
    }
}

/// One answer per input question.
///
/// Serializes as a JSON object for records and a JSON string for text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Structured(AnswerRecord),
    Text(String),
}

impl Answer {
    pub fn unparsed() -> Self {
        Answer::Text(UNPARSED_ANSWER.to_string())
    }

    /// The answer sentence regardless of shape.
    pub fn text(&self) -> &str {
        match self {
            Answer::Structured(record) => &record.answer,
            Answer::Text(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> StructuredQuery {
        StructuredQuery {
            query: "What is the grace period?".to_string(),
            domain: "insurance".to_string(),
            sub_domain: "life".to_string(),
            key_clauses: vec!["grace period clause".to_string()],
            additional_context: vec!["premium due date".to_string(), "policy lapse rules".to_string()],
        }
    }

    #[test]
    fn test_combined_query() {
        assert_eq!(
            descriptor().combined_query(),
            "What is the grace period? grace period clause premium due date policy lapse rules"
        );
    }

    #[test]
    fn test_combined_query_trims_empty_hints() {
        let mut d = descriptor();
        d.key_clauses.clear();
        d.additional_context.clear();
        assert_eq!(d.combined_query(), "What is the grace period?");
    }

    #[test]
    fn test_answer_serializes_untagged() {
        let structured = Answer::Structured(AnswerRecord::not_found("q"));
        let json = serde_json::to_value(&structured).unwrap();
        assert_eq!(json["answer"], NOT_FOUND_ANSWER);
        assert_eq!(json["supporting_clauses"], serde_json::json!([]));

        let text = serde_json::to_value(Answer::unparsed()).unwrap();
        assert_eq!(text, serde_json::json!("Could not parse query."));
    }

    #[test]
    fn test_answer_text() {
        assert_eq!(Answer::unparsed().text(), UNPARSED_ANSWER);
        assert_eq!(
            Answer::Structured(AnswerRecord::not_found("q")).text(),
            NOT_FOUND_ANSWER
        );
    }
}
