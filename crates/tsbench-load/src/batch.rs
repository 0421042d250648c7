//! Per-worker batch accumulators.

use crate::decoder::{frame_position, line_position, DecodedPoint};
use crate::error::{LoadError, Result};
use std::collections::VecDeque;
use tsbench_core::exposition::ExpositionParser;
use tsbench_core::prompb::{TimeSeries, WriteRequest};

/// Accumulates decoded points for one worker until it is flushed.
///
/// `len` counts the items ready to flush and drives the flush threshold.
/// `values` counts the samples those items carry. A batch never reports
/// more than its capacity; items past it are carried over and become the
/// next batch on `reset`, so the worker keeps flushing while `len` is at
/// capacity.
pub trait Batch: Send + 'static {
    fn append(&mut self, point: DecodedPoint) -> Result<()>;
    fn len(&self) -> usize;
    fn values(&self) -> usize;
    fn reset(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds empty batches for workers.
pub trait BatchFactory: Send + Sync {
    type Batch: Batch;

    fn new_batch(&self, capacity: usize) -> Self::Batch;
}

/// Decoded remote-write series ready to be re-encoded into requests.
///
/// Each series is one item: an exposition line yields one, a frame yields
/// as many as it holds.
#[derive(Debug)]
pub struct RemoteWriteBatch {
    series: Vec<TimeSeries>,
    carried: VecDeque<TimeSeries>,
    capacity: usize,
    samples: usize,
}

impl RemoteWriteBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            series: Vec::with_capacity(capacity.min(10_000)),
            carried: VecDeque::new(),
            capacity,
            samples: 0,
        }
    }

    pub fn series(&self) -> &[TimeSeries] {
        &self.series
    }

    /// Series waiting for the next batch
    pub fn carried(&self) -> usize {
        self.carried.len()
    }

    /// Move the series out for encoding; counts stay until `reset`
    pub fn take_series(&mut self) -> Vec<TimeSeries> {
        std::mem::take(&mut self.series)
    }

    fn push(&mut self, ts: TimeSeries) {
        if self.carried.is_empty() && self.series.len() < self.capacity {
            self.samples += ts.samples.len();
            self.series.push(ts);
        } else {
            self.carried.push_back(ts);
        }
    }
}

impl Batch for RemoteWriteBatch {
    fn append(&mut self, point: DecodedPoint) -> Result<()> {
        match point {
            DecodedPoint::Line { text, line_no } => {
                let ts = std::str::from_utf8(&text)
                    .map_err(|e| format!("invalid UTF-8: {}", e))
                    .and_then(|line| ExpositionParser::parse_line(line).map_err(|e| e.to_string()))
                    .map_err(|message| LoadError::decode(line_position(line_no), message))?;
                self.push(ts);
            }
            DecodedPoint::Frame { payload, index, offset } => {
                let req = WriteRequest::decode_snappy(&payload).map_err(|e| {
                    LoadError::decode(
                        frame_position(index, offset),
                        format!("corrupt {}-byte payload: {}", payload.len(), e),
                    )
                })?;
                for ts in req.timeseries {
                    self.push(ts);
                }
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.series.len()
    }

    fn values(&self) -> usize {
        self.samples
    }

    fn reset(&mut self) {
        self.series.clear();
        self.samples = 0;
        while self.series.len() < self.capacity {
            let Some(ts) = self.carried.pop_front() else { break };
            self.samples += ts.samples.len();
            self.series.push(ts);
        }
    }
}

/// Raw exposition lines joined with newlines.
#[derive(Debug, Default)]
pub struct TextBatch {
    body: Vec<u8>,
    lines: usize,
}

impl TextBatch {
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Batch for TextBatch {
    fn append(&mut self, point: DecodedPoint) -> Result<()> {
        match point {
            DecodedPoint::Line { text, .. } => {
                self.body.extend_from_slice(&text);
                self.body.push(b'\n');
                self.lines += 1;
                Ok(())
            }
            DecodedPoint::Frame { .. } => Err(LoadError::Config(
                "text batches cannot hold framed payloads".to_string(),
            )),
        }
    }

    fn len(&self) -> usize {
        self.lines
    }

    fn values(&self) -> usize {
        self.lines
    }

    fn reset(&mut self) {
        self.body.clear();
        self.lines = 0;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteWriteBatchFactory;

impl BatchFactory for RemoteWriteBatchFactory {
    type Batch = RemoteWriteBatch;

    fn new_batch(&self, capacity: usize) -> RemoteWriteBatch {
        RemoteWriteBatch::with_capacity(capacity)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextBatchFactory;

impl BatchFactory for TextBatchFactory {
    type Batch = TextBatch;

    /// Every line is one item, so the worker's threshold alone bounds it
    fn new_batch(&self, _capacity: usize) -> TextBatch {
        TextBatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tsbench_core::prompb::{Label, Sample, METRIC_NAME_LABEL};

    fn line(s: &str) -> DecodedPoint {
        DecodedPoint::Line {
            text: Bytes::copy_from_slice(s.as_bytes()),
            line_no: 7,
        }
    }

    fn frame(series: usize) -> DecodedPoint {
        let req = WriteRequest {
            timeseries: (0..series)
                .map(|i| TimeSeries {
                    labels: vec![Label::new(METRIC_NAME_LABEL, format!("m_{}", i))],
                    samples: vec![Sample {
                        value: i as f64,
                        timestamp: 1_451_606_400_000,
                    }],
                })
                .collect(),
        };
        let payload = req.encode_snappy(&mut Vec::new()).unwrap();
        DecodedPoint::Frame {
            payload: Bytes::from(payload),
            index: 0,
            offset: 0,
        }
    }

    #[test]
    fn test_remote_write_batch_counts_series() {
        let mut batch = RemoteWriteBatchFactory.new_batch(100);
        batch.append(frame(3)).unwrap();
        batch.append(frame(2)).unwrap();

        assert_eq!(batch.len(), 5);
        assert_eq!(batch.values(), 5);
        assert_eq!(batch.series().len(), 5);
    }

    #[test]
    fn test_remote_write_batch_lines() {
        let mut batch = RemoteWriteBatch::with_capacity(10);
        batch.append(line("cpu_usage_user{hostname=\"host_0\"} 58 1451606400000")).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.series()[0].metric_name(), Some("cpu_usage_user"));

        match batch.append(line("cpu_usage_user{hostname=")) {
            Err(LoadError::Decode { position, .. }) => assert_eq!(position, "line 7"),
            other => panic!("expected decode error, got {:?}", other),
        }
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_oversized_frame_is_carried_over() {
        let mut batch = RemoteWriteBatch::with_capacity(4);
        batch.append(frame(10)).unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.carried(), 6);

        let mut flushed = Vec::new();
        while !batch.is_empty() {
            assert!(batch.len() <= 4);
            flushed.push(batch.take_series().len());
            batch.reset();
        }
        assert_eq!(flushed, vec![4, 4, 2]);
        assert_eq!(batch.carried(), 0);
    }

    #[test]
    fn test_remote_write_batch_rejects_corrupt_frame() {
        let mut batch = RemoteWriteBatch::with_capacity(10);
        let corrupt = DecodedPoint::Frame {
            payload: Bytes::from_static(b"\xff\xff\xff\xff"),
            index: 3,
            offset: 120,
        };
        match batch.append(corrupt) {
            Err(LoadError::Decode { position, message }) => {
                assert_eq!(position, "frame 3 (byte offset 120)");
                assert!(message.contains("4-byte payload"));
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_reset_empties_batch() {
        let mut batch = RemoteWriteBatch::with_capacity(10);
        batch.append(frame(4)).unwrap();
        batch.reset();
        assert!(batch.is_empty());
        assert_eq!(batch.values(), 0);
        assert!(batch.series().is_empty());
    }

    #[test]
    fn test_text_batch() {
        let mut batch = TextBatchFactory.new_batch(10);
        batch.append(line("a 1 2")).unwrap();
        batch.append(line("b 3 4")).unwrap();
        assert_eq!(batch.body(), b"a 1 2\nb 3 4\n");
        assert_eq!(batch.len(), 2);

        assert!(batch.append(frame(1)).is_err());

        batch.reset();
        assert!(batch.is_empty());
        assert!(batch.body().is_empty());
    }
}
