//! Error types for FinSight
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - Error codes for machine-readable identification
//! - Retryability classification for external-call failures
//!
//! Per-query degradations (an unresolvable company name, a sub-query that
//! times out, a figure that cannot be parsed) are NOT errors here - those are
//! recovered inside the pipeline. This module covers the failures a caller
//! can actually observe: broken configuration, collaborator outages, and
//! serialization problems.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // External service errors (8xxx)
    SearchError,
    SearchTimeout,
    EmbeddingError,
    EmbeddingTimeout,
    GenerationError,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1002,

            // External (8xxx)
            ErrorCode::SearchError => 8001,
            ErrorCode::SearchTimeout => 8002,
            ErrorCode::EmbeddingError => 8003,
            ErrorCode::EmbeddingTimeout => 8004,
            ErrorCode::GenerationError => 8005,
            ErrorCode::UpstreamError => 8006,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // External service errors
    #[error("Vector search error: {message}")]
    SearchError { message: String },

    #[error("Vector search timed out after {timeout_ms}ms")]
    SearchTimeout { timeout_ms: u64 },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Embedding timeout after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("Generation service error: {message}")]
    GenerationError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::SearchError { .. } => ErrorCode::SearchError,
            AppError::SearchTimeout { .. } => ErrorCode::SearchTimeout,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::EmbeddingTimeout { .. } => ErrorCode::EmbeddingTimeout,
            AppError::GenerationError { .. } => ErrorCode::GenerationError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether a retry against the collaborator could succeed.
    ///
    /// Timeouts and transport failures are transient; validation and
    /// configuration failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::SearchTimeout { .. }
                | AppError::EmbeddingTimeout { .. }
                | AppError::SearchError { .. }
                | AppError::EmbeddingError { .. }
                | AppError::HttpClient(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::SearchTimeout { timeout_ms: 5000 };
        assert_eq!(err.code(), ErrorCode::SearchTimeout);
        assert_eq!(err.code().as_code(), 8002);
    }

    #[test]
    fn test_retryability() {
        assert!(AppError::SearchTimeout { timeout_ms: 100 }.is_retryable());
        assert!(AppError::EmbeddingError {
            message: "connection reset".into()
        }
        .is_retryable());
        assert!(!AppError::Configuration {
            message: "bad year range".into()
        }
        .is_retryable());
        assert!(!AppError::Validation {
            message: "empty query".into()
        }
        .is_retryable());
    }
}
