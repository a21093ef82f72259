//! Injectable completion capability.

use crate::client::{LlmClient, LlmRequest};
use policyqa_core::AppResult;
use std::sync::Arc;

/// A client bound to a model and sampling temperature.
///
/// Cheap to clone; every pipeline component holds its own handle.
#[derive(Clone)]
pub struct CompletionModel {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
}

impl CompletionModel {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    /// Send `prompt` and return the raw completion text.
    ///
    /// Transport failures propagate; the text is returned untouched.
    pub async fn complete_text(&self, prompt: &str) -> AppResult<String> {
        let request =
            LlmRequest::new(prompt, self.model.as_str()).with_temperature(self.temperature);

        let response = self.client.complete(&request).await?;
        Ok(response.content)
    }
}

impl std::fmt::Debug for CompletionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionModel")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedClient;

    #[tokio::test]
    async fn test_complete_text_uses_bound_model() {
        let client = Arc::new(ScriptedClient::with_responder(|req| {
            Ok(format!("{}@{:?}", req.model, req.temperature))
        }));
        let model = CompletionModel::new(client, "llama3-70b-8192", 0.1);

        let text = model.complete_text("anything").await.unwrap();
        assert_eq!(text, "llama3-70b-8192@Some(0.1)");
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let model = CompletionModel::new(Arc::new(ScriptedClient::failing("down")), "m", 0.0);
        assert!(model.complete_text("p").await.is_err());
    }
}
