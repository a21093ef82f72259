//! Policy document question answering.
//!
//! Provides document extraction, chunking, a persisted SQLite vector index and
//! the answering pipeline built on top of them.

pub mod chunker;
pub mod embeddings;
pub mod extract;
pub mod index;
pub mod rag;
pub mod types;
pub mod vector_index;

// Re-export commonly used types
pub use chunker::Chunker;
pub use embeddings::{create_provider, EmbeddingIdentity, EmbeddingProvider};
pub use extract::{DefaultExtractor, DocumentFormat, DocumentLoader, TextExtractor};
pub use rag::{AnswerSynthesizer, MultiQueryRetriever, Pipeline, PipelineStage, QueryUnderstander};
pub use types::{
    Answer, AnswerRecord, Chunk, ChunkMetadata, RetrievalResult, StructuredQuery,
    NOT_FOUND_ANSWER, NOT_FOUND_EXPLANATION, UNPARSED_ANSWER,
};
pub use vector_index::{IndexStats, SearchIndex, VectorIndex};
