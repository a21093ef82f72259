//! LLM provider factory.
//!
//! Turns configuration into a concrete [`LlmClient`], resolving endpoints and
//! secrets along the way.

use crate::client::LlmClient;
use crate::completion::CompletionModel;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use policyqa_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "groq")
/// * `endpoint` - Optional custom base URL
/// * `api_key` - API key, required by the hosted providers
/// * `timeout` - Optional per-request timeout
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required key is
/// missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Option<Duration>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    if provider_type.requires_api_key() && api_key.is_none() {
        return Err(AppError::Config(format!(
            "{} provider requires API key",
            provider_type.as_str()
        )));
    }
    let api_key = api_key.unwrap_or_default();

    match provider_type {
        ProviderType::Ollama => {
            let mut client = match endpoint {
                Some(url) => OllamaClient::with_base_url(url),
                None => OllamaClient::new(),
            };
            if let Some(timeout) = timeout {
                client = client.with_timeout(timeout)?;
            }
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI | ProviderType::Groq => {
            let mut client = match (provider_type, endpoint) {
                (_, Some(url)) => OpenAiClient::with_base_url(provider_type.as_str(), url, api_key),
                (ProviderType::Groq, None) => OpenAiClient::groq(api_key),
                _ => OpenAiClient::new(api_key),
            };
            if let Some(timeout) = timeout {
                client = client.with_timeout(timeout)?;
            }
            Ok(Arc::new(client))
        }
    }
}

/// Build the completion capability described by the configuration.
pub fn create_completion_model(config: &AppConfig) -> AppResult<CompletionModel> {
    let api_key = config.resolve_api_key();
    let client = create_client(
        &config.llm.provider,
        config.llm.endpoint.as_deref(),
        api_key.as_deref(),
        Some(Duration::from_secs(config.llm.timeout_secs)),
    )?;

    tracing::debug!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Created completion model"
    );

    Ok(CompletionModel::new(
        client,
        config.llm.model.clone(),
        config.llm.temperature,
    ))
}
