//! Error types for flight delay prediction

use crate::validator::ValidationError;
use thiserror::Error;

/// Errors that can occur while training or predicting
#[derive(Debug, Error)]
pub enum DelayError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid {field} timestamp '{value}' at index {index}: expected YYYY-MM-DD HH:MM:SS")]
    TimestampParse {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("Missing {field} timestamp at index {index}")]
    MissingTimestamp { index: usize, field: &'static str },

    #[error("Cannot compute class weights from an empty label set")]
    EmptyLabels,

    #[error("No trained model artifact found at {0}")]
    StorageNotFound(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
