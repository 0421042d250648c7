//! Per-worker counters and the merged run summary.

use crate::processor::ProcessOutcome;
use hdrhistogram::Histogram;
use serde::Serialize;
use std::time::Duration;
use tsbench_core::report::{
    format_bytes, format_number, latency_histogram, merge_latency, per_second, record_latency,
    LatencyStats,
};

/// Counters owned by a single worker; never shared while the run is live.
#[derive(Debug, Clone)]
pub struct WorkerMetrics {
    pub items: u64,
    pub values: u64,
    pub batches: u64,
    pub requests: u64,
    pub retries: u64,
    pub bytes: u64,
    pub latency: Histogram<u64>,
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self {
            items: 0,
            values: 0,
            batches: 0,
            requests: 0,
            retries: 0,
            bytes: 0,
            latency: latency_histogram(),
        }
    }
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one flushed batch
    pub fn record(&mut self, outcome: &ProcessOutcome) {
        self.items += outcome.items;
        self.values += outcome.values;
        self.batches += 1;
        self.requests += outcome.requests;
        self.retries += outcome.retries;
        self.bytes += outcome.bytes;
        if outcome.requests > 0 {
            record_latency(&mut self.latency, outcome.latency);
        }
    }

    pub fn merge(&mut self, other: &WorkerMetrics) {
        self.items += other.items;
        self.values += other.values;
        self.batches += other.batches;
        self.requests += other.requests;
        self.retries += other.retries;
        self.bytes += other.bytes;
        merge_latency(&mut self.latency, &other.latency);
    }
}

/// Totals for a finished load run.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub workers: usize,
    pub items: u64,
    pub values: u64,
    pub batches: u64,
    pub requests: u64,
    pub retries: u64,
    pub bytes: u64,
    pub elapsed: Duration,
    pub batch_latency: LatencyStats,
}

impl RunMetrics {
    /// Merge joined worker metrics into the run summary
    pub fn from_workers(workers: &[WorkerMetrics], elapsed: Duration) -> Self {
        let mut total = WorkerMetrics::new();
        for w in workers {
            total.merge(w);
        }

        Self {
            workers: workers.len(),
            items: total.items,
            values: total.values,
            batches: total.batches,
            requests: total.requests,
            retries: total.retries,
            bytes: total.bytes,
            elapsed,
            batch_latency: LatencyStats::from_histogram(&total.latency),
        }
    }

    pub fn items_per_second(&self) -> f64 {
        per_second(self.items, self.elapsed)
    }

    pub fn values_per_second(&self) -> f64 {
        per_second(self.values, self.elapsed)
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "loaded {} items ({} values) in {:.3}s with {} workers\n",
            format_number(self.items),
            format_number(self.values),
            self.elapsed.as_secs_f64(),
            self.workers
        ));
        out.push_str(&format!(
            "mean rate: {:.2} items/sec, {:.2} values/sec\n",
            self.items_per_second(),
            self.values_per_second()
        ));
        out.push_str(&format!(
            "batches: {}, requests: {}, retries: {}, bytes: {}\n",
            format_number(self.batches),
            format_number(self.requests),
            format_number(self.retries),
            format_bytes(self.bytes)
        ));
        out.push_str(&format!("batch latency: {}\n", self.batch_latency.format_ms()));
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
