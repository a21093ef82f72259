//! Completion capability for PolicyQA.
//!
//! A provider-agnostic [`LlmClient`] trait with two HTTP providers and a
//! scripted double for tests. Components never reach for a global client:
//! they receive a [`CompletionModel`] that bundles the client with the model
//! name and sampling temperature.
//!
//! # Providers
//! - **Ollama**: local runtime (default)
//! - **OpenAI-compatible**: OpenAI, Groq and anything speaking `/chat/completions`
//!
//! # Example
//! ```no_run
//! use policyqa_llm::{CompletionModel, providers::OllamaClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let model = CompletionModel::new(Arc::new(OllamaClient::new()), "llama3.2", 0.1);
//! let text = model.complete_text("Hello, world!").await?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod completion;
pub mod factory;
pub mod providers;
pub mod types;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use completion::CompletionModel;
pub use factory::{create_client, create_completion_model};
pub use providers::{OllamaClient, OpenAiClient, ScriptedClient};
pub use types::ProviderType;
