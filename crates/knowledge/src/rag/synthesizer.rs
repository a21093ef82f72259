//! Grounded answer synthesis.

use crate::rag::json::extract_json_object;
use crate::types::{Answer, AnswerRecord, StructuredQuery, NOT_FOUND_ANSWER};
use policyqa_core::config::AnswerStyle;
use policyqa_core::AppResult;
use policyqa_llm::CompletionModel;
use policyqa_prompt::{build_prompt, resolve_prompt, PromptDefinition, ANSWER_SENTENCE, ANSWER_STRUCTURED};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, instrument, warn};

const EMPTY_CONTEXT: &str = "No relevant information found.";

#[derive(Debug, Deserialize)]
struct RawAnswer {
    answer: String,
    #[serde(default)]
    supporting_clauses: Vec<String>,
    #[serde(default)]
    explanation: String,
}

/// Answers one question from retrieved documents.
#[derive(Debug, Clone)]
pub struct AnswerSynthesizer {
    model: CompletionModel,
    style: AnswerStyle,
    max_context_docs: usize,
    prompt: PromptDefinition,
}

impl AnswerSynthesizer {
    pub fn new(
        model: CompletionModel,
        style: AnswerStyle,
        max_context_docs: usize,
        prompt: PromptDefinition,
    ) -> Self {
        Self {
            model,
            style,
            max_context_docs,
            prompt,
        }
    }

    /// Use the workspace override of the style's prompt if there is one.
    pub fn from_workspace(
        model: CompletionModel,
        style: AnswerStyle,
        max_context_docs: usize,
        workspace: Option<&Path>,
    ) -> AppResult<Self> {
        let prompt_id = match style {
            AnswerStyle::Structured => ANSWER_STRUCTURED,
            AnswerStyle::Sentence => ANSWER_SENTENCE,
        };
        Ok(Self::new(
            model,
            style,
            max_context_docs,
            resolve_prompt(workspace, prompt_id)?,
        ))
    }

    pub fn style(&self) -> AnswerStyle {
        self.style
    }

    /// Answer `query` from `docs`.
    ///
    /// Malformed completions degrade to the not-found answer; only
    /// transport errors are returned as `Err`.
    #[instrument(skip(self, docs, parsed), fields(docs = docs.len(), style = self.style.as_str()))]
    pub async fn synthesize(
        &self,
        query: &str,
        docs: &[String],
        parsed: Option<&StructuredQuery>,
    ) -> AppResult<Answer> {
        let context = if docs.is_empty() {
            EMPTY_CONTEXT.to_string()
        } else {
            docs.iter()
                .take(self.max_context_docs)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let parsed_info = match parsed {
            Some(descriptor) => serde_json::to_string(descriptor)?,
            None => "N/A".to_string(),
        };

        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("context".to_string(), context);
        variables.insert("parsed_info".to_string(), parsed_info);
        let built = build_prompt(&self.prompt, variables)?;

        let response = self.model.complete_text(&built.user).await?;

        let answer = match self.style {
            AnswerStyle::Structured => Answer::Structured(parse_record(query, &response)),
            AnswerStyle::Sentence => Answer::Text(parse_sentence(&response)),
        };

        debug!("Answered: {}", answer.text());
        Ok(answer)
    }
}

fn parse_record(query: &str, response: &str) -> AnswerRecord {
    let raw = extract_json_object(response)
        .ok_or_else(|| "no JSON object".to_string())
        .and_then(|object| {
            serde_json::from_value::<RawAnswer>(Value::Object(object)).map_err(|e| e.to_string())
        });

    match raw {
        Ok(raw) if !raw.answer.trim().is_empty() => AnswerRecord {
            query: query.to_string(),
            answer: raw.answer.trim().to_string(),
            supporting_clauses: raw.supporting_clauses,
            explanation: raw.explanation.trim().to_string(),
        },
        Ok(_) => {
            warn!("Answer record has an empty answer");
            AnswerRecord::not_found(query)
        }
        Err(e) => {
            warn!("Unusable answer record: {}", e);
            AnswerRecord::not_found(query)
        }
    }
}

fn parse_sentence(response: &str) -> String {
    let sentence = response.trim();
    if sentence.is_empty() {
        NOT_FOUND_ANSWER.to_string()
    } else {
        sentence.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NOT_FOUND_EXPLANATION;
    use policyqa_llm::ScriptedClient;
    use std::sync::Arc;

    const QUESTION: &str = "Does my policy cover artificial pregnancy?";

    fn docs() -> Vec<String> {
        vec!["Clause 5.2: This policy covers maternity expenses including artificial pregnancy procedures under medical advice.".to_string()]
    }

    fn synthesizer(client: Arc<ScriptedClient>, style: AnswerStyle) -> AnswerSynthesizer {
        AnswerSynthesizer::from_workspace(
            CompletionModel::new(client, "test-model", 0.1),
            style,
            5,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_structured_answer() {
        let client = Arc::new(ScriptedClient::with_replies([r#"```json
{
  "query": "Does my policy cover artificial pregnancy?",
  "answer": "Yes, artificial pregnancy is covered under Clause 5.2.",
  "supporting_clauses": ["Clause 5.2: maternity expenses including artificial pregnancy"],
  "explanation": "Clause 5.2 lists artificial pregnancy procedures."
}
```"#]));

        let answer = synthesizer(client.clone(), AnswerStyle::Structured)
            .synthesize(QUESTION, &docs(), None)
            .await
            .unwrap();

        let Answer::Structured(record) = answer else {
            panic!("expected structured answer");
        };
        assert!(record.answer.contains("5.2"));
        assert!(record.supporting_clauses[0].contains("5.2"));
        assert_eq!(record.query, QUESTION);

        let prompt = &client.prompts()[0];
        assert!(prompt.contains("Clause 5.2"));
        assert!(prompt.contains("Additional Parsed Info:\nN/A"));
    }

    #[tokio::test]
    async fn test_malformed_output_degrades() {
        for reply in ["I think so.", "{\"supporting_clauses\": []}", "{\"answer\": \"  \"}", ""] {
            let client = Arc::new(ScriptedClient::with_replies([reply]));
            let answer = synthesizer(client, AnswerStyle::Structured)
                .synthesize(QUESTION, &docs(), None)
                .await
                .unwrap();

            assert_eq!(answer, Answer::Structured(AnswerRecord::not_found(QUESTION)));
        }
    }

    #[tokio::test]
    async fn test_empty_docs_context() {
        let client = Arc::new(ScriptedClient::with_replies(["{}"]));
        let answer = synthesizer(client.clone(), AnswerStyle::Structured)
            .synthesize("What is covered for towing?", &[], None)
            .await
            .unwrap();

        let Answer::Structured(record) = answer else {
            panic!("expected structured answer");
        };
        assert_eq!(record.answer, NOT_FOUND_ANSWER);
        assert_eq!(record.explanation, NOT_FOUND_EXPLANATION);
        assert!(record.supporting_clauses.is_empty());
        assert!(client.prompts()[0].contains(EMPTY_CONTEXT));
    }

    #[tokio::test]
    async fn test_context_limited_and_descriptor_included() {
        let client = Arc::new(ScriptedClient::with_replies(["Covered."]));
        let docs: Vec<String> = (1..=7).map(|i| format!("Clause {}.0 text", i)).collect();
        let descriptor = StructuredQuery {
            query: QUESTION.to_string(),
            domain: "insurance".to_string(),
            sub_domain: "health".to_string(),
            key_clauses: vec!["artificial pregnancy coverage".to_string()],
            additional_context: vec![],
        };

        synthesizer(client.clone(), AnswerStyle::Sentence)
            .synthesize(QUESTION, &docs, Some(&descriptor))
            .await
            .unwrap();

        let prompt = &client.prompts()[0];
        assert!(prompt.contains("Clause 5.0 text"));
        assert!(!prompt.contains("Clause 6.0 text"));
        assert!(prompt.contains("\"sub_domain\":\"health\""));
    }

    #[tokio::test]
    async fn test_sentence_answer() {
        let client = Arc::new(ScriptedClient::with_replies([
            "  Yes, Clause 5.2 covers artificial pregnancy.\n",
            "   ",
        ]));
        let synthesizer = synthesizer(client, AnswerStyle::Sentence);

        let answer = synthesizer.synthesize(QUESTION, &docs(), None).await.unwrap();
        assert_eq!(
            answer,
            Answer::Text("Yes, Clause 5.2 covers artificial pregnancy.".to_string())
        );

        let empty = synthesizer.synthesize(QUESTION, &docs(), None).await.unwrap();
        assert_eq!(empty, Answer::Text(NOT_FOUND_ANSWER.to_string()));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let client = Arc::new(ScriptedClient::failing("timeout"));
        let result = synthesizer(client, AnswerStyle::Structured)
            .synthesize(QUESTION, &docs(), None)
            .await;
        assert!(result.is_err());
    }
}
