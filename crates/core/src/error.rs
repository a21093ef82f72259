//! Error types for PolicyQA.
//!
//! One enum covers every failure class of the answering pipeline. Understanding
//! and synthesis parse failures are recovered inside the pipeline and never
//! become errors; everything represented here aborts the current request.

use thiserror::Error;

/// Unified error type for PolicyQA.
///
/// All fallible functions return `Result<T, AppError>`. Nothing panics.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be fetched or turned into text
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Declared document format is not one of pdf, html, htm, txt, docx
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Embedding or persisting the vector index failed
    #[error("Index build error: {0}")]
    IndexBuild(String),

    /// No readable index at the requested location
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Completion or embedding transport errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Missing or malformed bearer credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Credentials present but not accepted
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AppError::UnsupportedFormat("xlsx".to_string());
        assert_eq!(err.to_string(), "Unsupported file format: xlsx");

        let err = AppError::IndexNotFound("/tmp/missing.sqlite".to_string());
        assert!(err.to_string().contains("missing.sqlite"));
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
