//! Completion providers.

mod ollama;
mod openai;
mod scripted;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use scripted::ScriptedClient;
