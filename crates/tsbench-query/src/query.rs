//! Query descriptors and the shared cursor workers pull them from.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// One read request to replay, as produced by the query generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default = "default_method")]
    pub method: String,
    /// Path and query string, appended to the backend base URL
    pub path: String,
    #[serde(default)]
    pub body: Option<String>,
    /// Statistics are grouped by this label
    pub human_label: String,
    #[serde(default)]
    pub human_description: String,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Query {
    pub fn get(path: impl Into<String>, human_label: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            path: path.into(),
            body: None,
            human_label: human_label.into(),
            human_description: String::new(),
        }
    }
}

/// Parse newline-delimited JSON queries, skipping blank lines
pub fn read_queries<R: BufRead>(reader: R) -> Result<Vec<Query>> {
    let mut queries = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let query = serde_json::from_str(&line).map_err(|e| QueryError::Parse {
            line: i + 1,
            message: e.to_string(),
        })?;
        queries.push(query);
    }
    Ok(queries)
}

/// Lock-free cursor over a fixed list of queries.
///
/// Every query is handed out exactly once across all workers, up to the
/// optional limit.
#[derive(Debug)]
pub struct QuerySource {
    queries: Vec<Query>,
    cursor: AtomicU64,
    limit: u64,
}

impl QuerySource {
    pub fn new(queries: Vec<Query>, limit: Option<u64>) -> Self {
        let available = queries.len() as u64;
        Self {
            queries,
            cursor: AtomicU64::new(0),
            limit: limit.map_or(available, |l| l.min(available)),
        }
    }

    pub fn from_path(path: impl AsRef<Path>, limit: Option<u64>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let queries = read_queries(std::io::BufReader::new(file))?;
        Ok(Self::new(queries, limit))
    }

    /// Next query and its position in the run, or None once exhausted
    pub fn next_query(&self) -> Option<(u64, &Query)> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        if index >= self.limit {
            return None;
        }
        self.queries.get(index as usize).map(|q| (index, q))
    }

    /// Number of queries this source will hand out
    pub fn len(&self) -> u64 {
        self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.limit == 0
    }
}
