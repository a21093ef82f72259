//! Retrieval-augmented answering over a single policy document.
//!
//! Questions are parsed into structured descriptors, each descriptor drives an
//! enriched index search, and every question is answered from the retrieved
//! clauses only.

pub mod json;
pub mod pipeline;
pub mod query;
pub mod retriever;
pub mod synthesizer;

pub use pipeline::{Pipeline, PipelineStage};
pub use query::QueryUnderstander;
pub use retriever::MultiQueryRetriever;
pub use synthesizer::AnswerSynthesizer;
