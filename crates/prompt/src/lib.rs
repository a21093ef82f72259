//! Prompt system for PolicyQA.
//!
//! Every prompt the pipeline sends is a [`PromptDefinition`] rendered with
//! Handlebars. Definitions ship built in and can be replaced per workspace by
//! dropping `<id>.yml` into `.policyqa/prompts/`.

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

pub use builder::build_prompt;
pub use builtin::{builtin_prompt, ANSWER_SENTENCE, ANSWER_STRUCTURED, QUERY_PARSE};
pub use loader::{load_prompt, resolve_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptInputSpec, PromptOutputSpec};
