//! Error types for the query runner

use thiserror::Error;
use tokio::task::JoinError;

/// Query runner errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server returned error: {status} - {body}")]
    Backend { status: u16, body: String },

    #[error("Invalid response: {0}")]
    Response(String),

    #[error("Invalid query at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task join failed: {0}")]
    Join(#[from] JoinError),

    #[error("Run cancelled")]
    Cancelled,
}

/// Result type for query runner operations
pub type Result<T> = std::result::Result<T, QueryError>;
