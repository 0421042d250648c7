//! Configuration for the query runner.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Backend base URL; query paths are appended to it
    pub url: String,

    /// Number of concurrent query workers
    pub workers: usize,

    /// Leading queries executed but left out of the statistics
    pub burn_in: u64,

    /// Stop after this many queries (0 = run them all)
    pub limit: u64,

    /// Stop the run on the first failed query
    pub abort_on_error: bool,

    /// Parse and validate the JSON response envelope
    pub parse_json: bool,

    /// Log every response body at debug level
    pub print_responses: bool,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8428".to_string(),
            workers: 1,
            burn_in: 0,
            limit: 0,
            abort_on_error: false,
            parse_json: false,
            print_responses: false,
            timeout_secs: 60,
        }
    }
}

impl QueryConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| QueryError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(QueryError::Config("workers must be at least 1".to_string()));
        }
        if self.url.is_empty() {
            return Err(QueryError::Config("url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn limit(&self) -> Option<u64> {
        (self.limit > 0).then_some(self.limit)
    }
}
