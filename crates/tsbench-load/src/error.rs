//! Error types for the loader

use thiserror::Error;
use tokio::task::JoinError;

/// Loader errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Decode error at {position}: {message}")]
    Decode { position: String, message: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server returned error: {status} - {body}")]
    Backend { status: u16, body: String },

    #[error("Indexer routed point to shard {shard} but only {shards} shards exist")]
    ShardRouting { shard: usize, shards: usize },

    #[error("Payload error: {0}")]
    Core(#[from] tsbench_core::CoreError),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task join failed: {0}")]
    Join(#[from] JoinError),

    #[error("Run cancelled")]
    Cancelled,
}

impl LoadError {
    pub(crate) fn decode(position: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::Decode {
            position: position.into(),
            message: message.into(),
        }
    }
}

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoadError>;
