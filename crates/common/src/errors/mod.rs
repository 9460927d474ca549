//! Error types for citenet
//!
//! Provides:
//! - Distinct error types for the failure modes of the data source and HTTP client
//! - Machine-readable error codes
//! - Retry classification for transient upstream failures
//!
//! Batch fetch failures are never raised through this type; they are recorded
//! on the returned items instead.

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
    InvalidIdentifier,

    // Resource errors (4xxx)
    RecordNotFound,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamStatus,
    MalformedRecord,

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
            ErrorCode::InvalidIdentifier => 1002,

            // Resources (4xxx)
            ErrorCode::RecordNotFound => 4001,

            // External (8xxx)
            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamStatus => 8002,
            ErrorCode::MalformedRecord => 8003,

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
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid identifier: {identifier}")]
    InvalidIdentifier { identifier: String },

    // Resource errors
    #[error("Record not found: {identifier}")]
    RecordNotFound { identifier: String },

    // External service errors
    #[error("Upstream returned status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Malformed record for {identifier}: {message}")]
    MalformedRecord { identifier: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Transport error: {message}")]
    Transport { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

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
            AppError::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            AppError::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            AppError::UpstreamStatus { .. } => ErrorCode::UpstreamStatus,
            AppError::MalformedRecord { .. } => ErrorCode::MalformedRecord,
            AppError::HttpClient(_) | AppError::Transport { .. } => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } | AppError::ConfigSource(_) => {
                ErrorCode::ConfigurationError
            }
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether retrying the same call later could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::HttpClient(_) | AppError::Transport { .. } => true,
            AppError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Shorthand for a configuration contract violation
    pub fn configuration(message: impl Into<String>) -> Self {
        AppError::Configuration {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
