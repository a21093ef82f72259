//! OpenAI-compatible chat completions provider.
//!
//! Speaks `POST {base_url}/chat/completions` with a bearer key, which covers
//! OpenAI itself and hosted runtimes such as Groq.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use policyqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub(crate) const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    provider: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Client for api.openai.com.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url("openai", OPENAI_BASE_URL, api_key)
    }

    /// Client for Groq's OpenAI-compatible endpoint.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::with_base_url("groq", GROQ_BASE_URL, api_key)
    }

    /// Client for a custom endpoint (proxies, self-hosted gateways).
    pub fn with_base_url(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Apply a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> AppResult<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    fn to_chat_request(&self, request: &LlmRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(request.prompt.clone()));

        ChatRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn convert_response(&self, request: &LlmRequest, response: ChatResponse) -> AppResult<LlmResponse> {
        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm(format!("{} returned no choices", self.provider)))?
            .message
            .content
            .unwrap_or_default();

        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let model = if response.model.is_empty() {
            request.model.clone()
        } else {
            response.model
        };

        Ok(LlmResponse {
            content,
            model,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            provider = %self.provider,
            model = %request.model,
            prompt_len = request.prompt.len(),
            "Sending chat completion request"
        );

        let body = self.to_chat_request(request);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::Llm(format!("Failed to send request to {}: {}", self.provider, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "{} API error ({}): {}",
                self.provider, status, error_text
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            AppError::Llm(format!("Failed to parse {} response: {}", self.provider, e))
        })?;

        let response = self.convert_response(request, chat_response)?;
        tracing::debug!(
            provider = %self.provider,
            completion_tokens = response.usage.completion_tokens,
            "Received chat completion"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groq_defaults() {
        let client = OpenAiClient::groq("gsk-test");
        assert_eq!(client.provider_name(), "groq");
        assert_eq!(client.base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn test_chat_request_includes_system_first() {
        let client = OpenAiClient::new("sk-test");
        let request = LlmRequest::new("Is flood damage covered?", "gpt-4o-mini")
            .with_system("You are an insurance assistant.")
            .with_temperature(0.1);

        let chat = client.to_chat_request(&request);
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert_eq!(chat.messages[1].role, "user");
        assert_eq!(chat.messages[1].content, "Is flood damage covered?");
        assert_eq!(chat.temperature, Some(0.1));
    }

    #[test]
    fn test_convert_response() {
        let client = OpenAiClient::new("sk-test");
        let request = LlmRequest::new("q", "llama3-70b-8192");
        let raw: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Covered."}}],
                "usage":{"prompt_tokens":40,"completion_tokens":3,"total_tokens":43}}"#,
        )
        .unwrap();

        let response = client.convert_response(&request, raw).unwrap();
        assert_eq!(response.content, "Covered.");
        assert_eq!(response.model, "llama3-70b-8192");
        assert_eq!(response.usage.total_tokens, 43);
    }

    #[test]
    fn test_convert_response_without_choices() {
        let client = OpenAiClient::new("sk-test");
        let request = LlmRequest::new("q", "m");
        let raw: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(client.convert_response(&request, raw).is_err());
    }
}
