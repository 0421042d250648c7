//! Latency samples and their per-label aggregation.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tsbench_core::report::{latency_histogram, merge_latency, record_latency, LatencyStats};
use opool::PoolAllocator;
use tsbench_core::{Pool, Pooled};

/// Label of the aggregate covering every recorded query
pub const ALL_QUERIES_LABEL: &str = "all queries";

/// One latency sample produced by a processed query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stat {
    pub label: String,
    pub value_ms: f64,
    /// Partial stats describe one step of a multi-request query and stay
    /// out of the all-queries aggregate
    pub is_partial: bool,
}

impl Stat {
    pub fn init(&mut self, label: &str, value_ms: f64) -> &mut Self {
        self.label.clear();
        self.label.push_str(label);
        self.value_ms = value_ms;
        self.is_partial = false;
        self
    }

    pub fn init_partial(&mut self, label: &str, value_ms: f64) -> &mut Self {
        self.init(label, value_ms);
        self.is_partial = true;
        self
    }
}

/// Allocator handing out cleared stats
#[derive(Debug, Clone, Copy, Default)]
pub struct StatAllocator;

impl PoolAllocator<Stat> for StatAllocator {
    #[inline]
    fn allocate(&self) -> Stat {
        Stat::default()
    }

    #[inline]
    fn reset(&self, obj: &mut Stat) {
        obj.label.clear();
        obj.value_ms = 0.0;
        obj.is_partial = false;
    }

    #[inline]
    fn is_valid(&self, _obj: &Stat) -> bool {
        true
    }
}

/// Pool stats are drawn from; shared by all workers
pub type StatPool = Pool<StatAllocator, Stat>;

/// A stat on loan from the `StatPool`
pub type PooledStat = Pooled<StatAllocator, Stat>;

pub fn stat_pool(capacity: usize) -> StatPool {
    Pool::new(capacity, StatAllocator)
}

#[derive(Debug, Clone)]
struct StatGroup {
    histogram: Histogram<u64>,
    sum_ms: f64,
}

impl Default for StatGroup {
    fn default() -> Self {
        Self {
            histogram: latency_histogram(),
            sum_ms: 0.0,
        }
    }
}

impl StatGroup {
    fn push(&mut self, value_ms: f64) {
        record_latency(&mut self.histogram, Duration::from_secs_f64(value_ms.max(0.0) / 1000.0));
        self.sum_ms += value_ms;
    }

    fn merge(&mut self, other: &StatGroup) {
        merge_latency(&mut self.histogram, &other.histogram);
        self.sum_ms += other.sum_ms;
    }
}

/// Summary of one label's latencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatSummary {
    pub label: String,
    pub count: u64,
    pub mean_ms: f64,
    pub latency: LatencyStats,
}

impl StatSummary {
    pub fn format_line(&self) -> String {
        let us = |v: u64| v as f64 / 1000.0;
        format!(
            "{}: count={} min={:.2}ms mean={:.2}ms p50={:.2}ms p95={:.2}ms p99={:.2}ms max={:.2}ms",
            self.label,
            self.count,
            us(self.latency.min_us),
            self.mean_ms,
            us(self.latency.p50_us),
            us(self.latency.p95_us),
            us(self.latency.p99_us),
            us(self.latency.max_us),
        )
    }
}

/// Per-worker aggregation; merged across workers once the run is over.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    groups: BTreeMap<String, StatGroup>,
    all: StatGroup,
    recorded: u64,
    burned_in: u64,
    errors: u64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stat: &Stat) {
        match self.groups.get_mut(&stat.label) {
            Some(group) => group.push(stat.value_ms),
            None => {
                let mut group = StatGroup::default();
                group.push(stat.value_ms);
                self.groups.insert(stat.label.clone(), group);
            }
        }
        if !stat.is_partial {
            self.all.push(stat.value_ms);
            self.recorded += 1;
        }
    }

    pub fn record_burn_in(&mut self) {
        self.burned_in += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn merge(&mut self, other: &StatsAggregator) {
        for (label, group) in &other.groups {
            self.groups.entry(label.clone()).or_default().merge(group);
        }
        self.all.merge(&other.all);
        self.recorded += other.recorded;
        self.burned_in += other.burned_in;
        self.errors += other.errors;
    }

    /// Queries recorded, excluding burn-in and partial stats
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn burned_in(&self) -> u64 {
        self.burned_in
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// One summary per label in label order, followed by the all-queries group
    pub fn summaries(&self) -> Vec<StatSummary> {
        self.groups
            .iter()
            .map(|(label, group)| summarize(label, group))
            .chain(std::iter::once(summarize(ALL_QUERIES_LABEL, &self.all)))
            .collect()
    }
}

fn summarize(label: &str, group: &StatGroup) -> StatSummary {
    let count = group.histogram.len();
    StatSummary {
        label: label.to_string(),
        count,
        mean_ms: if count > 0 { group.sum_ms / count as f64 } else { 0.0 },
        latency: LatencyStats::from_histogram(&group.histogram),
    }
}
