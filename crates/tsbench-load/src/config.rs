//! Configuration for the loader.

use crate::error::{LoadError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tsbench_core::serialize::MAX_SERIES_PER_MESSAGE;

/// Default delay between attempts under retry-until-success
pub const DEFAULT_RETRY_DELAY_MS: u64 = 50;

/// Default upper bound on a single frame's declared length (256 MiB)
pub const DEFAULT_MAX_FRAME_LEN: u64 = 256 * 1024 * 1024;

/// Main configuration for a load run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Backend base URL (e.g., "http://localhost:8428")
    pub url: String,

    /// Sub-path receiving remote-write requests
    pub write_path: String,

    /// Sub-path receiving exposition-format text imports
    pub import_path: String,

    /// Number of parallel workers, one shard each
    pub workers: usize,

    /// Items per batch before a worker flushes
    pub batch_size: usize,

    /// Bounded queue depth between the producer and each worker
    pub channel_capacity: usize,

    /// When false, batches are counted but never sent
    pub do_load: bool,

    /// Failure policy for transport and backend errors
    pub retry: RetryPolicy,

    /// Wire format of the input stream
    pub input: InputFormat,

    /// How points are assigned to workers
    pub indexer: IndexerKind,

    /// Wire format sent to the backend
    pub target: TargetFormat,

    /// Maximum number of series per remote-write request
    pub max_series_per_request: usize,

    /// Frames declaring a larger payload are treated as corrupt
    pub max_frame_len: u64,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8428".to_string(),
            write_path: "/api/v1/write".to_string(),
            import_path: "/api/v1/import/prometheus".to_string(),
            workers: 1,
            batch_size: MAX_SERIES_PER_MESSAGE,
            channel_capacity: 1000,
            do_load: true,
            retry: RetryPolicy::default(),
            input: InputFormat::Framed,
            indexer: IndexerKind::Constant,
            target: TargetFormat::RemoteWrite,
            max_series_per_request: MAX_SERIES_PER_MESSAGE,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            timeout_secs: 60,
        }
    }
}

impl LoadConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| LoadError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Reject settings the runner cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(LoadError::Config("workers must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(LoadError::Config("batch_size must be at least 1".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(LoadError::Config("channel_capacity must be at least 1".to_string()));
        }
        if self.max_series_per_request == 0 {
            return Err(LoadError::Config(
                "max_series_per_request must be at least 1".to_string(),
            ));
        }
        if self.target == TargetFormat::TextImport && self.input != InputFormat::Text {
            return Err(LoadError::Config(
                "text-import target requires text input".to_string(),
            ));
        }
        Ok(())
    }

    pub fn write_url(&self) -> String {
        join_url(&self.url, &self.write_path)
    }

    pub fn import_url(&self) -> String {
        join_url(&self.url, &self.import_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Failure policy for a processor's requests.
///
/// Under `RetryUntilSuccess` a failed request is resent unchanged after a
/// fixed delay until it succeeds or the run is cancelled, which makes
/// delivery at-least-once. `FailFast` aborts the run on the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryPolicy {
    FailFast,
    RetryUntilSuccess { delay_ms: u64 },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::RetryUntilSuccess {
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or None when failures are fatal
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            RetryPolicy::FailFast => None,
            RetryPolicy::RetryUntilSuccess { delay_ms } => Some(Duration::from_millis(*delay_ms)),
        }
    }
}

impl std::fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryPolicy::FailFast => write!(f, "fail-fast"),
            RetryPolicy::RetryUntilSuccess { delay_ms } => {
                write!(f, "retry-until-success ({}ms)", delay_ms)
            }
        }
    }
}

/// Wire format of the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InputFormat {
    /// Newline-delimited exposition lines
    Text,
    /// u64 big-endian length prefix + snappy-compressed remote-write payload
    Framed,
}

/// Point-to-shard assignment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IndexerKind {
    /// Every point goes to shard 0
    Constant,
    /// Hash of the metric name (text) or payload (framed)
    Hash,
}

/// Wire format sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TargetFormat {
    /// Snappy-compressed protobuf remote write
    RemoteWrite,
    /// Plain-text exposition import
    TextImport,
}
