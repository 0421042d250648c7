//! Streaming loader for time series benchmarks.
//!
//! Reads a pre-generated stream of telemetry, either newline-delimited
//! exposition text or length-prefixed snappy-compressed remote-write frames,
//! and pushes it into a backend through a fixed pool of batching workers.
//!
//! # Pipeline
//! - `decoder`: pulls one undecoded point at a time off the input
//! - `indexer`: routes each point to a worker shard
//! - `runner`: bounded per-shard queues, batching workers, cancellation
//! - `batch` / `processor`: accumulate points and ship them over HTTP
//! - `transport`: retry-until-success or fail-fast delivery
//!
//! # Usage
//! ```bash
//! # Load framed remote-write data with 8 workers
//! tsbench-load --file data.bin --workers 8 --url http://localhost:8428
//!
//! # Import exposition text, routing by metric name
//! tsbench-load --file data.txt --input text --target text-import --indexer hash
//! ```

pub mod batch;
pub mod config;
pub mod decoder;
pub mod error;
pub mod indexer;
pub mod metrics;
pub mod processor;
pub mod runner;
pub mod transport;

pub use batch::{Batch, BatchFactory, RemoteWriteBatch, TextBatch};
pub use config::{IndexerKind, InputFormat, LoadConfig, RetryPolicy, TargetFormat};
pub use decoder::{DecodedPoint, FramedDecoder, PointDecoder, TextDecoder};
pub use error::{LoadError, Result};
pub use indexer::{ConstantIndexer, HashIndexer, PointIndexer};
pub use metrics::{RunMetrics, WorkerMetrics};
pub use processor::{ProcessOutcome, Processor, RemoteWriteProcessor, TextImportProcessor};
pub use runner::LoadRunner;
