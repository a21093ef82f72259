//! Embedding providers for the vector index.
//!
//! Embeddings must be deterministic for a given provider, model and
//! dimension: the index records all three and refuses to load under a
//! different embedder.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingIdentity, EmbeddingProvider};
