//! Point serializers for the two producer wire formats.

use crate::error::Result;
use crate::prompb::{Label, Sample, TimeSeries, WriteRequest, METRIC_NAME_LABEL};
use crate::types::Point;
use crate::wire::write_frame;
use std::io::Write;

/// Maximum number of series carried by one remote-write message
pub const MAX_SERIES_PER_MESSAGE: usize = 10_000;

/// Writes points as exposition-format text, one line per field:
///
/// `<measurement>_<field>{k="v",...} <value> <timestamp_ms>`
///
/// The label block is omitted entirely when the point has no tags.
#[derive(Debug, Default)]
pub struct PrometheusSerializer {
    labels: Vec<u8>,
    scratch: Vec<u8>,
}

impl PrometheusSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize one point to `w` with a single write call
    pub fn serialize<W: Write>(&mut self, p: &Point, w: &mut W) -> std::io::Result<()> {
        self.labels.clear();
        if !p.tags.is_empty() {
            self.labels.push(b'{');
            for (i, tag) in p.tags.iter().enumerate() {
                if i > 0 {
                    self.labels.push(b',');
                }
                self.labels.extend_from_slice(tag.key.as_bytes());
                self.labels.extend_from_slice(b"=\"");
                self.labels.extend_from_slice(tag.value.as_bytes());
                self.labels.push(b'"');
            }
            self.labels.push(b'}');
        }

        self.scratch.clear();
        let ts = p.timestamp_millis();
        for field in &p.fields {
            self.scratch.extend_from_slice(p.measurement.as_bytes());
            self.scratch.push(b'_');
            self.scratch.extend_from_slice(field.key.as_bytes());
            self.scratch.extend_from_slice(&self.labels);
            writeln!(self.scratch, " {} {}", field.value, ts)?;
        }

        w.write_all(&self.scratch)
    }
}

/// Accumulates points as remote-write series and writes them out as
/// length-prefixed frames of snappy-compressed `WriteRequest`s.
///
/// Each field of a point becomes its own series with a `__name__` label of
/// `<measurement>_<field>` followed by the point's tags, carrying exactly
/// one sample.
#[derive(Debug)]
pub struct RemoteWriteSerializer {
    pending: Vec<TimeSeries>,
    max_series: usize,
    scratch: Vec<u8>,
    frames_written: u64,
}

impl Default for RemoteWriteSerializer {
    fn default() -> Self {
        Self::new(MAX_SERIES_PER_MESSAGE)
    }
}

impl RemoteWriteSerializer {
    pub fn new(max_series: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_series: max_series.max(1),
            scratch: Vec::new(),
            frames_written: 0,
        }
    }

    /// Add a point, writing a frame whenever `max_series` series are pending
    pub fn serialize<W: Write>(&mut self, p: &Point, w: &mut W) -> Result<()> {
        let ts = p.timestamp_millis();
        for field in &p.fields {
            let mut labels = Vec::with_capacity(p.tags.len() + 1);
            labels.push(Label::new(METRIC_NAME_LABEL, p.metric_name(field)));
            labels.extend(p.tags.iter().map(|t| Label::new(t.key.clone(), t.value.clone())));

            self.pending.push(TimeSeries {
                labels,
                samples: vec![Sample {
                    value: field.value.as_f64(),
                    timestamp: ts,
                }],
            });

            if self.pending.len() >= self.max_series {
                self.flush(w)?;
            }
        }
        Ok(())
    }

    /// Write any pending series as a final (possibly short) frame
    pub fn flush<W: Write>(&mut self, w: &mut W) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let req = WriteRequest {
            timeseries: std::mem::take(&mut self.pending),
        };
        let payload = req.encode_snappy(&mut self.scratch)?;
        write_frame(w, &payload)?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}
