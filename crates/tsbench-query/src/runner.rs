//! Query runner: a fixed pool of workers draining a shared query source.

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::processor::QueryProcessor;
use crate::query::QuerySource;
use crate::stat::{StatSummary, StatsAggregator};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tsbench_core::report::{format_number, per_second};

/// Outcome of a finished query run.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub workers: usize,
    pub elapsed: Duration,
    pub recorded: u64,
    pub burned_in: u64,
    pub errors: u64,
    pub summaries: Vec<StatSummary>,
}

impl QueryReport {
    fn new(workers: usize, elapsed: Duration, stats: &StatsAggregator) -> Self {
        Self {
            workers,
            elapsed,
            recorded: stats.recorded(),
            burned_in: stats.burned_in(),
            errors: stats.errors(),
            summaries: stats.summaries(),
        }
    }

    pub fn queries_per_second(&self) -> f64 {
        per_second(self.recorded + self.burned_in + self.errors, self.elapsed)
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        for s in &self.summaries {
            out.push_str(&s.format_line());
            out.push('\n');
        }
        out.push_str(&format!(
            "run {} queries ({} burn-in, {} errors) with {} workers in {:.3}s: {:.2} queries/sec\n",
            format_number(self.recorded),
            format_number(self.burned_in),
            format_number(self.errors),
            self.workers,
            self.elapsed.as_secs_f64(),
            self.queries_per_second()
        ));
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct QueryRunner {
    config: QueryConfig,
    cancel: CancellationToken,
}

impl QueryRunner {
    pub fn new(config: QueryConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub async fn run<P: QueryProcessor>(&self, source: Arc<QuerySource>, processor: P) -> Result<QueryReport> {
        self.config.validate()?;

        let workers = self.config.workers;
        info!(
            "Running {} queries with {} workers (burn-in {})",
            source.len(),
            workers,
            self.config.burn_in
        );

        let start = Instant::now();
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let worker = QueryWorker {
                    source: Arc::clone(&source),
                    processor: processor.clone(),
                    burn_in: self.config.burn_in,
                    abort_on_error: self.config.abort_on_error,
                    cancel: self.cancel.clone(),
                    stats: StatsAggregator::new(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        let mut merged = StatsAggregator::new();
        let mut first_error: Option<QueryError> = None;
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(QueryError::Join(e)),
            };
            match result {
                Ok(stats) => merged.merge(&stats),
                Err(e) => match &first_error {
                    None | Some(QueryError::Cancelled) => first_error = Some(e),
                    Some(_) => {}
                },
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let report = QueryReport::new(workers, start.elapsed(), &merged);
        info!(
            "Query run complete: {} recorded, {} errors in {:.3}s",
            report.recorded,
            report.errors,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }
}

struct QueryWorker<P> {
    source: Arc<QuerySource>,
    processor: P,
    burn_in: u64,
    abort_on_error: bool,
    cancel: CancellationToken,
    stats: StatsAggregator,
}

impl<P: QueryProcessor> QueryWorker<P> {
    async fn run(mut self) -> Result<StatsAggregator> {
        while let Some((index, query)) = self.source.next_query() {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(QueryError::Cancelled),
                result = self.processor.process_query(query) => result,
            };

            match result {
                Ok(stats) if index < self.burn_in => {
                    drop(stats);
                    self.stats.record_burn_in();
                }
                Ok(stats) => {
                    for stat in &stats {
                        self.stats.record(stat);
                    }
                }
                Err(e) if self.abort_on_error => {
                    self.cancel.cancel();
                    return Err(e);
                }
                Err(e) => {
                    warn!("Query {} ({}) failed: {}", index, query.human_label, e);
                    self.stats.record_error();
                }
            }
        }
        Ok(self.stats)
    }
}
