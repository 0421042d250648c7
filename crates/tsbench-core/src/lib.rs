//! tsbench Core - Shared data model and wire codecs
//!
//! This crate provides the pieces shared by the loader and the query runner:
//! - `Point`: A telemetry record with measurement, tags, fields and timestamp
//! - `FieldValue`: Tagged numeric field values (Float, Float32, Integer)
//! - `PrometheusSerializer`: Exposition-format text serializer
//! - `exposition`: Parser for exposition-format lines
//! - `prompb`: Remote-write protobuf messages
//! - `wire`: Length-prefixed framing for the binary protocol
//! - `Pool`: Shared `opool` handle for scratch buffers and stat samples
//! - `report`: Latency histograms and number formatting for run summaries

pub mod error;
pub mod exposition;
pub mod pool;
pub mod prompb;
pub mod report;
pub mod serialize;
pub mod types;
pub mod wire;

pub use error::{CoreError, Result};
pub use pool::{scratch_pool, Pool, Pooled, ScratchPool};
pub use report::LatencyStats;
pub use serialize::{PrometheusSerializer, RemoteWriteSerializer};
pub use types::*;
