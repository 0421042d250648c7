//! Load runner: one blocking producer feeding a fixed pool of batching
//! workers over bounded per-shard queues.
//!
//! The producer decodes and routes points, blocking when a shard's queue is
//! full. Each worker owns its batch and processor, flushes whenever the
//! batch reaches `batch_size` items, and flushes the remainder once its
//! queue closes. The first fatal error anywhere cancels the shared token,
//! which stops the producer and interrupts workers, including retry sleeps.

use crate::batch::{Batch, BatchFactory};
use crate::config::LoadConfig;
use crate::decoder::{DecodedPoint, PointDecoder};
use crate::error::{LoadError, Result};
use crate::indexer::PointIndexer;
use crate::metrics::{RunMetrics, WorkerMetrics};
use crate::processor::Processor;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct LoadRunner {
    config: LoadConfig,
    cancel: CancellationToken,
}

impl LoadRunner {
    pub fn new(config: LoadConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive `decoder` to the end of its stream through `config.workers`
    /// workers and return the merged metrics.
    pub async fn run<D, I, F, P>(
        &self,
        decoder: D,
        indexer: I,
        factory: F,
        processor: P,
    ) -> Result<RunMetrics>
    where
        D: PointDecoder + 'static,
        I: PointIndexer + 'static,
        F: BatchFactory<Batch = P::Batch>,
        P: Processor,
    {
        self.config.validate()?;

        let shards = self.config.workers;
        info!(
            "Starting load: {} workers, batch size {}, do_load={}, retry={}",
            shards, self.config.batch_size, self.config.do_load, self.config.retry
        );

        let start = Instant::now();

        let mut senders = Vec::with_capacity(shards);
        let mut workers = Vec::with_capacity(shards);
        for worker_id in 0..shards {
            let (tx, rx) = mpsc::channel(self.config.channel_capacity);
            senders.push(tx);

            let worker = Worker {
                id: worker_id,
                rx,
                batch: factory.new_batch(self.config.batch_size),
                processor: processor.clone(),
                batch_size: self.config.batch_size,
                do_load: self.config.do_load,
                cancel: self.cancel.clone(),
                metrics: WorkerMetrics::new(),
            };
            workers.push(tokio::spawn(worker.run()));
        }

        let cancel = self.cancel.clone();
        let producer = tokio::task::spawn_blocking(move || {
            let result = produce(decoder, indexer, senders, &cancel);
            if result.is_err() {
                cancel.cancel();
            }
            result
        });

        let mut worker_metrics = Vec::with_capacity(shards);
        let mut worker_error = None;
        for handle in workers {
            match handle.await {
                Ok(Ok(metrics)) => worker_metrics.push(metrics),
                Ok(Err(e)) => keep_first(&mut worker_error, e),
                Err(e) => keep_first(&mut worker_error, LoadError::Join(e)),
            }
        }

        let producer_result = match producer.await {
            Ok(result) => result,
            Err(e) => Err(LoadError::Join(e)),
        };

        // A worker's own failure explains the producer's closed queue
        match (worker_error, producer_result) {
            (Some(e), _) if !matches!(e, LoadError::Cancelled) => return Err(e),
            (_, Err(e)) => return Err(e),
            (Some(e), Ok(_)) => return Err(e),
            (None, Ok(read)) => debug!("Producer finished after {} points", read),
        }

        let metrics = RunMetrics::from_workers(&worker_metrics, start.elapsed());
        info!(
            "Load complete: {} items, {} values in {:.3}s",
            metrics.items,
            metrics.values,
            metrics.elapsed.as_secs_f64()
        );
        Ok(metrics)
    }
}

/// Prefer a real failure over the cancellation it caused elsewhere
fn keep_first(slot: &mut Option<LoadError>, err: LoadError) {
    match slot {
        None => *slot = Some(err),
        Some(LoadError::Cancelled) if !matches!(err, LoadError::Cancelled) => *slot = Some(err),
        Some(_) => {}
    }
}

fn produce<D, I>(
    mut decoder: D,
    indexer: I,
    senders: Vec<mpsc::Sender<DecodedPoint>>,
    cancel: &CancellationToken,
) -> Result<u64>
where
    D: PointDecoder,
    I: PointIndexer,
{
    let shards = senders.len();
    let mut read = 0u64;

    while let Some(point) = decoder.decode()? {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }

        let shard = indexer.index(&point, shards);
        if shard >= shards {
            return Err(LoadError::ShardRouting { shard, shards });
        }

        // A closed queue means its worker has already stopped
        senders[shard]
            .blocking_send(point)
            .map_err(|_| LoadError::Cancelled)?;
        read += 1;
    }

    Ok(read)
}

struct Worker<P: Processor> {
    id: usize,
    rx: mpsc::Receiver<DecodedPoint>,
    batch: P::Batch,
    processor: P,
    batch_size: usize,
    do_load: bool,
    cancel: CancellationToken,
    metrics: WorkerMetrics,
}

impl<P: Processor> Worker<P> {
    async fn run(mut self) -> Result<WorkerMetrics> {
        let result = self.consume().await;
        if let Err(e) = &result {
            if !matches!(e, LoadError::Cancelled) {
                debug!("Worker {} failed: {}", self.id, e);
            }
            self.cancel.cancel();
        }
        result.map(|_| self.metrics)
    }

    async fn consume(&mut self) -> Result<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(LoadError::Cancelled),
                next = self.rx.recv() => next,
            };

            let Some(point) = next else { break };
            self.batch.append(point)?;
            // One point can fill more than a batch; the rest carries over
            while self.batch.len() >= self.batch_size {
                self.flush().await?;
            }
        }

        while !self.batch.is_empty() {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let result = self.processor.process_batch(&mut self.batch, self.do_load).await;
        self.batch.reset();
        let outcome = result?;
        debug!("Worker {} flushed {} items", self.id, outcome.items);
        self.metrics.record(&outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{RemoteWriteBatch, RemoteWriteBatchFactory, TextBatch, TextBatchFactory};
    use crate::decoder::{FramedDecoder, TextDecoder};
    use crate::indexer::{ConstantIndexer, HashIndexer};
    use crate::processor::ProcessOutcome;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use tsbench_core::wire::encode_frame;
    use tsbench_core::{Point, RemoteWriteSerializer};

    /// Records flushed batch sizes per processor instance
    #[derive(Clone, Default)]
    struct RecordingProcessor {
        flushed: Arc<Mutex<Vec<usize>>>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl Processor for RecordingProcessor {
        type Batch = TextBatch;

        async fn process_batch(&mut self, batch: &mut TextBatch, _do_load: bool) -> Result<ProcessOutcome> {
            let mut flushed = self.flushed.lock().unwrap();
            if let Some(limit) = self.fail_after {
                if flushed.len() >= limit {
                    return Err(LoadError::Backend {
                        status: 500,
                        body: "boom".to_string(),
                    });
                }
            }
            flushed.push(batch.len());
            Ok(ProcessOutcome {
                items: batch.len() as u64,
                values: batch.values() as u64,
                requests: 1,
                ..Default::default()
            })
        }
    }

    struct OutOfRangeIndexer;

    impl PointIndexer for OutOfRangeIndexer {
        fn index(&self, _point: &DecodedPoint, shards: usize) -> usize {
            shards
        }
    }

    fn lines(n: usize) -> Cursor<Vec<u8>> {
        let mut input = String::new();
        for i in 0..n {
            input.push_str(&format!("metric_{}{{hostname=\"host_{}\"}} {} 1451606400000\n", i % 13, i, i));
        }
        Cursor::new(input.into_bytes())
    }

    fn config(workers: usize, batch_size: usize) -> LoadConfig {
        LoadConfig {
            workers,
            batch_size,
            channel_capacity: 4,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_batch_boundaries() {
        let processor = RecordingProcessor::default();
        let runner = LoadRunner::new(config(1, 10), CancellationToken::new());

        let metrics = runner
            .run(TextDecoder::new(lines(25)), ConstantIndexer, TextBatchFactory, processor.clone())
            .await
            .unwrap();

        assert_eq!(*processor.flushed.lock().unwrap(), vec![10, 10, 5]);
        assert_eq!(metrics.items, 25);
        assert_eq!(metrics.batches, 3);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_empty_flush() {
        let processor = RecordingProcessor::default();
        let runner = LoadRunner::new(config(1, 5), CancellationToken::new());

        runner
            .run(TextDecoder::new(lines(20)), ConstantIndexer, TextBatchFactory, processor.clone())
            .await
            .unwrap();

        assert_eq!(*processor.flushed.lock().unwrap(), vec![5, 5, 5, 5]);
    }

    #[tokio::test]
    async fn test_conservation_across_workers() {
        let processor = RecordingProcessor::default();
        let runner = LoadRunner::new(config(4, 7), CancellationToken::new());

        let metrics = runner
            .run(TextDecoder::new(lines(1_000)), HashIndexer, TextBatchFactory, processor.clone())
            .await
            .unwrap();

        let flushed: usize = processor.flushed.lock().unwrap().iter().sum();
        assert_eq!(flushed, 1_000);
        assert_eq!(metrics.items, 1_000);
        assert_eq!(metrics.workers, 4);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let processor = RecordingProcessor::default();
        let runner = LoadRunner::new(config(2, 10), CancellationToken::new());

        let metrics = runner
            .run(TextDecoder::new(lines(0)), ConstantIndexer, TextBatchFactory, processor.clone())
            .await
            .unwrap();

        assert!(processor.flushed.lock().unwrap().is_empty());
        assert_eq!(metrics.items, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_shard_is_fatal() {
        let runner = LoadRunner::new(config(2, 10), CancellationToken::new());
        let err = runner
            .run(
                TextDecoder::new(lines(5)),
                OutOfRangeIndexer,
                TextBatchFactory,
                RecordingProcessor::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::ShardRouting { shard: 2, shards: 2 }));
    }

    #[tokio::test]
    async fn test_processor_error_wins_over_closed_queue() {
        let processor = RecordingProcessor {
            fail_after: Some(1),
            ..Default::default()
        };
        let runner = LoadRunner::new(config(1, 2), CancellationToken::new());

        let err = runner
            .run(TextDecoder::new(lines(500)), ConstantIndexer, TextBatchFactory, processor.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Backend { status: 500, .. }));
        assert_eq!(*processor.flushed.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_decode_error_aborts_run() {
        let runner = LoadRunner::new(config(1, 10), CancellationToken::new());
        let input = FramedDecoder::new(Cursor::new(vec![0u8, 0, 0]), 1024);

        let err = runner
            .run(input, ConstantIndexer, RemoteWriteBatchFactory, SeriesRecorder::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Decode { .. }));
    }

    /// Records the series count of every remote-write flush
    #[derive(Clone, Default)]
    struct SeriesRecorder {
        flushed: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl Processor for SeriesRecorder {
        type Batch = RemoteWriteBatch;

        async fn process_batch(&mut self, batch: &mut RemoteWriteBatch, _do_load: bool) -> Result<ProcessOutcome> {
            let items = batch.len() as u64;
            let series = batch.take_series();
            self.flushed.lock().unwrap().push(series.len());
            Ok(ProcessOutcome {
                items,
                ..Default::default()
            })
        }
    }

    /// Frames of `per_frame` single-field series, `points` series in total
    fn frames(points: usize, per_frame: usize) -> Cursor<Vec<u8>> {
        let mut serializer = RemoteWriteSerializer::new(per_frame);
        let mut out = Vec::new();
        for i in 0..points {
            let p = Point::builder("cpu")
                .tag("hostname", format!("host_{}", i))
                .timestamp(1_451_606_400_000_000_000)
                .field("usage_user", i as f64)
                .build()
                .unwrap();
            serializer.serialize(&p, &mut out).unwrap();
        }
        serializer.flush(&mut out).unwrap();
        Cursor::new(out)
    }

    #[tokio::test]
    async fn test_framed_flushes_stay_within_batch_size() {
        let config = LoadConfig::default();
        let batch_size = config.batch_size;
        let processor = SeriesRecorder::default();
        let decoder = FramedDecoder::new(frames(30_000, 10_000), config.max_frame_len);

        let metrics = LoadRunner::new(config, CancellationToken::new())
            .run(decoder, ConstantIndexer, RemoteWriteBatchFactory, processor.clone())
            .await
            .unwrap();

        let flushed = processor.flushed.lock().unwrap().clone();
        assert!(flushed.iter().all(|&n| n <= batch_size), "flushes {:?}", flushed);
        assert_eq!(flushed, vec![10_000, 10_000, 10_000]);
        assert_eq!(metrics.items, 30_000);
    }

    #[tokio::test]
    async fn test_frames_larger_than_batch_are_split() {
        let processor = SeriesRecorder::default();
        let decoder = FramedDecoder::new(frames(21, 7), 1 << 20);

        LoadRunner::new(config(1, 5), CancellationToken::new())
            .run(decoder, ConstantIndexer, RemoteWriteBatchFactory, processor.clone())
            .await
            .unwrap();

        assert_eq!(*processor.flushed.lock().unwrap(), vec![5, 5, 5, 5, 1]);
    }

    #[tokio::test]
    async fn test_corrupt_frame_payload_reports_position() {
        let mut input = frames(3, 3).into_inner();
        let first_len = input.len() as u64;
        input.extend_from_slice(&encode_frame(b"not snappy at all"));

        let err = LoadRunner::new(config(1, 10), CancellationToken::new())
            .run(
                FramedDecoder::new(Cursor::new(input), 1024),
                ConstantIndexer,
                RemoteWriteBatchFactory,
                SeriesRecorder::default(),
            )
            .await
            .unwrap_err();

        match err {
            LoadError::Decode { position, message } => {
                assert_eq!(position, format!("frame 1 (byte offset {})", first_len));
                assert!(message.contains("17-byte payload"), "{}", message);
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let runner = LoadRunner::new(config(2, 10), cancel);

        let err = runner
            .run(
                TextDecoder::new(lines(100)),
                ConstantIndexer,
                TextBatchFactory,
                RecordingProcessor::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Cancelled));
    }
}
