//! Question understanding: raw questions to structured descriptors.

use crate::rag::json::{extract_json_array, extract_json_object};
use crate::types::StructuredQuery;
use policyqa_core::AppResult;
use policyqa_llm::CompletionModel;
use policyqa_prompt::{build_prompt, resolve_prompt, PromptDefinition, QUERY_PARSE};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Descriptor as the model may return it.
///
/// Every field may be omitted or null. List fields also accept a bare string.
#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    query: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    domain: String,
    #[serde(default, deserialize_with = "nullable_string")]
    sub_domain: String,
    #[serde(default, deserialize_with = "string_list")]
    key_clauses: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    additional_context: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(item)) if item.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(item)) => vec![item],
        Some(OneOrMany::Many(items)) => items,
    })
}

/// Turns a batch of questions into [`StructuredQuery`] descriptors with one
/// completion call.
#[derive(Debug, Clone)]
pub struct QueryUnderstander {
    model: CompletionModel,
    prompt: PromptDefinition,
}

impl QueryUnderstander {
    pub fn new(model: CompletionModel, prompt: PromptDefinition) -> Self {
        Self { model, prompt }
    }

    /// Use the workspace override of `query.parse` if there is one.
    pub fn from_workspace(model: CompletionModel, workspace: Option<&Path>) -> AppResult<Self> {
        Ok(Self::new(model, resolve_prompt(workspace, QUERY_PARSE)?))
    }

    /// Parse `questions` into descriptors.
    ///
    /// An unusable completion yields an empty vector; only transport errors
    /// are returned as `Err`. Invalid entries are dropped, so the result may
    /// be shorter than `questions`.
    #[instrument(skip(self, questions), fields(questions = questions.len()))]
    pub async fn parse(&self, questions: &[String]) -> AppResult<Vec<StructuredQuery>> {
        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let mut variables = HashMap::new();
        variables.insert("questions".to_string(), serde_json::to_string(questions)?);
        let built = build_prompt(&self.prompt, variables)?;

        let response = self.model.complete_text(&built.user).await?;
        let descriptors = parse_descriptors(&response, questions);

        debug!(
            "Understood {} of {} questions",
            descriptors.len(),
            questions.len()
        );

        Ok(descriptors)
    }
}

fn parse_descriptors(response: &str, questions: &[String]) -> Vec<StructuredQuery> {
    let items = match extract_json_array(response) {
        Some(items) => items,
        // A lone object is accepted for a single question
        None => match extract_json_object(response) {
            Some(object) => vec![Value::Object(object)],
            None => {
                warn!("Query understanding returned no JSON array");
                return Vec::new();
            }
        },
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<RawDescriptor>(item) {
            Ok(raw) => {
                let query = raw
                    .query
                    .filter(|q| !q.trim().is_empty())
                    .or_else(|| questions.get(i).cloned())?;
                Some(StructuredQuery {
                    query,
                    domain: raw.domain,
                    sub_domain: raw.sub_domain,
                    key_clauses: raw.key_clauses,
                    additional_context: raw.additional_context,
                })
            }
            Err(e) => {
                warn!("Dropping invalid query descriptor {}: {}", i, e);
                None
            }
        })
        .collect()
}
