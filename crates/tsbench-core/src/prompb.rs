//! Prometheus remote-write protobuf messages.
//!
//! Hand-derived with `prost` so no build script is needed. Field numbers
//! follow `prompb/remote.proto` and `prompb/types.proto`.

use crate::error::Result;
use prost::Message;

/// Reserved label holding the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Top-level remote-write payload
#[derive(Clone, PartialEq, Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

/// One labelled series with its samples
#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Sample value with a millisecond timestamp
#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl TimeSeries {
    /// Value of the `__name__` label, if present
    pub fn metric_name(&self) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name == METRIC_NAME_LABEL)
            .map(|l| l.value.as_str())
    }
}

impl WriteRequest {
    /// Total number of samples across all series
    pub fn sample_count(&self) -> usize {
        self.timeseries.iter().map(|ts| ts.samples.len()).sum()
    }

    /// Encode into `buf` and snappy-compress the result.
    ///
    /// `buf` is a scratch buffer; it is cleared first and left holding the
    /// uncompressed protobuf bytes.
    pub fn encode_snappy(&self, buf: &mut Vec<u8>) -> Result<Vec<u8>> {
        buf.clear();
        buf.reserve(self.encoded_len());
        self.encode(buf)?;
        Ok(snap::raw::Encoder::new().compress_vec(buf)?)
    }

    /// Decompress a snappy block and decode the protobuf payload
    pub fn decode_snappy(payload: &[u8]) -> Result<Self> {
        let raw = snap::raw::Decoder::new().decompress_vec(payload)?;
        Ok(WriteRequest::decode(raw.as_slice())?)
    }
}
