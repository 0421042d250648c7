//! Query processors: execute one query and report its latency.

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query::Query;
use crate::stat::{PooledStat, StatPool};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

/// Executes queries; one instance per worker.
#[async_trait]
pub trait QueryProcessor: Clone + Send + Sync + 'static {
    async fn process_query(&mut self, query: &Query) -> Result<Vec<PooledStat>>;
}

/// Response envelope of the Prometheus-style HTTP query API.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub metric: serde_json::Map<String, serde_json::Value>,
    /// Range vectors carry `values`
    #[serde(default)]
    pub values: Vec<(f64, String)>,
    /// Instant vectors carry a single `value`
    #[serde(default)]
    pub value: Option<(f64, String)>,
}

impl QueryResponse {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let response: QueryResponse = serde_json::from_slice(body)
            .map_err(|e| QueryError::Response(format!("malformed JSON: {}", e)))?;
        if response.status != "success" {
            return Err(QueryError::Response(format!(
                "status {:?}: {}",
                response.status,
                response.error.as_deref().unwrap_or("no error message")
            )));
        }
        Ok(response)
    }

    /// Number of samples across all returned series
    pub fn sample_count(&self) -> usize {
        self.data.as_ref().map_or(0, |d| {
            d.result
                .iter()
                .map(|r| r.values.len() + usize::from(r.value.is_some()))
                .sum()
        })
    }
}

/// Issues queries over HTTP and times them until the body is read.
#[derive(Clone)]
pub struct HttpQueryProcessor {
    client: reqwest::Client,
    base_url: String,
    stats: StatPool,
    parse_json: bool,
    print_responses: bool,
}

impl HttpQueryProcessor {
    pub fn new(config: &QueryConfig, stats: StatPool) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            stats,
            parse_json: config.parse_json,
            print_responses: config.print_responses,
        })
    }
}

#[async_trait]
impl QueryProcessor for HttpQueryProcessor {
    async fn process_query(&mut self, query: &Query) -> Result<Vec<PooledStat>> {
        let method = Method::from_bytes(query.method.as_bytes())
            .map_err(|e| QueryError::Config(format!("invalid method {:?}: {}", query.method, e)))?;
        let url = format!("{}{}", self.base_url, query.path);

        let mut request = self.client.request(method, &url);
        if let Some(body) = &query.body {
            request = request.body(body.clone());
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(QueryError::Backend {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let samples = if self.parse_json {
            Some(QueryResponse::parse(&body)?.sample_count())
        } else {
            None
        };
        // Body read and, when enabled, parsed
        let lag_ms = start.elapsed().as_secs_f64() * 1000.0;

        if self.print_responses {
            debug!(
                "{} {} -> {}",
                query.human_label,
                url,
                String::from_utf8_lossy(&body)
            );
        }
        if let Some(samples) = samples {
            debug!("{} returned {} samples", query.human_label, samples);
        }

        let mut stat = self.stats.acquire();
        stat.init(&query.human_label, lag_ms);
        Ok(vec![stat])
    }
}
