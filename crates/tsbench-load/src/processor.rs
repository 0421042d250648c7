//! Batch processors: turn a full batch into backend requests.

use crate::batch::{Batch, RemoteWriteBatch, TextBatch};
use crate::config::LoadConfig;
use crate::error::Result;
use crate::transport::HttpSender;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tsbench_core::prompb::WriteRequest;
use tsbench_core::ScratchPool;

/// Header announcing the remote-write protocol version
pub const REMOTE_WRITE_VERSION_HEADER: &str = "X-Prometheus-Remote-Write-Version";

pub const REMOTE_WRITE_VERSION: &str = "0.1.0";

/// What a processed batch amounted to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Items flushed: lines for text imports, series for remote writes
    pub items: u64,
    /// Samples carried by those items
    pub values: u64,
    /// Requests delivered
    pub requests: u64,
    /// Failed attempts that were retried
    pub retries: u64,
    /// Request body bytes delivered
    pub bytes: u64,
    /// Summed latency of the delivered requests
    pub latency: Duration,
}

impl ProcessOutcome {
    fn dry_run<B: Batch>(batch: &B) -> Self {
        Self {
            items: batch.len() as u64,
            values: batch.values() as u64,
            ..Default::default()
        }
    }
}

/// Ships one batch to the backend.
///
/// The caller resets the batch afterwards whatever the outcome.
#[async_trait]
pub trait Processor: Clone + Send + Sync + 'static {
    type Batch: Batch;

    async fn process_batch(&mut self, batch: &mut Self::Batch, do_load: bool) -> Result<ProcessOutcome>;
}

/// Sends series as snappy-compressed protobuf remote-write requests.
#[derive(Clone)]
pub struct RemoteWriteProcessor {
    sender: HttpSender,
    scratch: ScratchPool,
    max_series_per_request: usize,
}

impl RemoteWriteProcessor {
    pub fn new(config: &LoadConfig, scratch: ScratchPool, cancel: CancellationToken) -> Result<Self> {
        let sender = HttpSender::new(
            config.write_url(),
            Self::headers(),
            config.timeout(),
            config.retry,
            cancel,
        )?;
        Ok(Self {
            sender,
            scratch,
            max_series_per_request: config.max_series_per_request.max(1),
        })
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("snappy"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-protobuf"));
        headers.insert(
            REMOTE_WRITE_VERSION_HEADER,
            HeaderValue::from_static(REMOTE_WRITE_VERSION),
        );
        headers
    }
}

#[async_trait]
impl Processor for RemoteWriteProcessor {
    type Batch = RemoteWriteBatch;

    async fn process_batch(&mut self, batch: &mut RemoteWriteBatch, do_load: bool) -> Result<ProcessOutcome> {
        let mut outcome = ProcessOutcome::dry_run(batch);
        if !do_load {
            return Ok(outcome);
        }

        let mut series = batch.take_series();
        while !series.is_empty() {
            let rest = if series.len() > self.max_series_per_request {
                series.split_off(self.max_series_per_request)
            } else {
                Vec::new()
            };

            let req = WriteRequest { timeseries: series };
            let body = {
                let mut scratch = self.scratch.acquire();
                Bytes::from(req.encode_snappy(&mut scratch)?)
            };
            let len = body.len() as u64;

            let delivery = self.sender.post(body).await?;
            debug!(
                "Delivered {} series ({} bytes) to {} in {:?}",
                req.timeseries.len(),
                len,
                self.sender.url(),
                delivery.latency
            );

            outcome.requests += 1;
            outcome.retries += delivery.retries();
            outcome.bytes += len;
            outcome.latency += delivery.latency;
            series = rest;
        }

        Ok(outcome)
    }
}

/// Sends exposition lines as a plain-text import.
#[derive(Clone)]
pub struct TextImportProcessor {
    sender: HttpSender,
}

impl TextImportProcessor {
    pub fn new(config: &LoadConfig, cancel: CancellationToken) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let sender = HttpSender::new(
            config.import_url(),
            headers,
            config.timeout(),
            config.retry,
            cancel,
        )?;
        Ok(Self { sender })
    }
}

#[async_trait]
impl Processor for TextImportProcessor {
    type Batch = TextBatch;

    async fn process_batch(&mut self, batch: &mut TextBatch, do_load: bool) -> Result<ProcessOutcome> {
        let mut outcome = ProcessOutcome::dry_run(batch);
        if !do_load || batch.is_empty() {
            return Ok(outcome);
        }

        let body = Bytes::copy_from_slice(batch.body());
        let len = body.len() as u64;
        let delivery = self.sender.post(body).await?;
        debug!("Imported {} lines ({} bytes) in {:?}", batch.len(), len, delivery.latency);

        outcome.requests = 1;
        outcome.retries = delivery.retries();
        outcome.bytes = len;
        outcome.latency = delivery.latency;
        Ok(outcome)
    }
}
