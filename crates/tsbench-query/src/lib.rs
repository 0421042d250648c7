//! Query replay for time series benchmarks.
//!
//! Loads a file of pre-generated queries (one JSON object per line), runs
//! them against a backend from a fixed pool of workers, and reports latency
//! per query label.
//!
//! # Usage
//! ```bash
//! tsbench-run-queries --file queries.jsonl --workers 8 --url http://localhost:8428
//! ```

pub mod config;
pub mod error;
pub mod processor;
pub mod query;
pub mod runner;
pub mod stat;

pub use config::QueryConfig;
pub use error::{QueryError, Result};
pub use processor::{HttpQueryProcessor, QueryProcessor, QueryResponse};
pub use query::{Query, QuerySource};
pub use runner::{QueryReport, QueryRunner};
pub use stat::{PooledStat, Stat, StatPool, StatsAggregator};
