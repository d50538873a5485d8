// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Structured error type returned to the request-handling layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Document type cannot be handled (rejected before any parsing).
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Document could not be read or yielded too little text.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Required metadata fields are missing after merge.
    #[error("Missing required fields: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    /// External embedding call failed (retryable).
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// External text-generation call failed. Recovered locally, never surfaced by the pipeline.
    #[error("Generation service error: {0}")]
    GenerationService(String),

    /// Caller supplied something unusable (empty bytes, bad config, etc.).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error (temp files, child processes).
    #[error("IO error: {0}")]
    Io(String),
}

impl EngineError {
    /// Whether retrying the same request can succeed without a different file.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::EmbeddingService(_) | EngineError::Io(_))
    }

    /// Actionable message suitable for showing to the uploader.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::UnsupportedFormat(mime) => format!(
                "Unsupported file type ({}). Please upload a PDF or Word (.docx) document.",
                mime
            ),
            EngineError::Extraction(reason) => format!(
                "Could not read text from the document ({}). Please upload a text-based PDF or Word file.",
                reason
            ),
            EngineError::Validation { missing } => format!(
                "The proposal is missing required sections: {}. Please add them and upload again.",
                missing.join(", ")
            ),
            EngineError::EmbeddingService(_) => {
                "The similarity service is temporarily unavailable. Please try again shortly.".to_string()
            }
            EngineError::GenerationService(_) => {
                "Recommendations are temporarily unavailable.".to_string()
            }
            EngineError::InvalidInput(reason) => format!("Invalid request: {}", reason),
            EngineError::Io(_) => "A temporary server error occurred. Please try again.".to_string(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let err = EngineError::Validation {
            missing: vec!["title".to_string(), "objectives".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required fields: title, objectives");
        assert!(err.user_message().contains("title, objectives"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_embedding_error_is_retryable() {
        let err = EngineError::EmbeddingService("timeout".to_string());
        assert!(err.is_retryable());
        assert!(err.user_message().contains("temporarily unavailable"));
    }
}
