//! CLI entry point for the loader.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tsbench_core::scratch_pool;
use tsbench_load::batch::{RemoteWriteBatchFactory, TextBatchFactory};
use tsbench_load::{
    ConstantIndexer, FramedDecoder, HashIndexer, IndexerKind, InputFormat, LoadConfig,
    LoadRunner, PointDecoder, PointIndexer, RemoteWriteProcessor, RetryPolicy, TargetFormat,
    TextDecoder, TextImportProcessor,
};

/// Size of the read buffer wrapped around the input
const READ_BUFFER_SIZE: usize = 4 << 20;

#[derive(Parser)]
#[command(name = "tsbench-load")]
#[command(about = "Load pre-generated telemetry into a time series backend")]
#[command(version)]
struct Cli {
    /// YAML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input file (reads stdin when omitted)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Backend base URL
    #[arg(short, long)]
    url: Option<String>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Items per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Input wire format
    #[arg(long, value_enum)]
    input: Option<InputFormat>,

    /// Shard assignment policy
    #[arg(long, value_enum)]
    indexer: Option<IndexerKind>,

    /// Format sent to the backend
    #[arg(long, value_enum)]
    target: Option<TargetFormat>,

    /// Decode and batch without sending anything
    #[arg(long)]
    dry_run: bool,

    /// Abort on the first failed request instead of retrying
    #[arg(long)]
    fail_fast: bool,

    /// Delay between retries in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    json_output: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> Result<LoadConfig> {
        let mut config = match &self.config {
            Some(path) => LoadConfig::from_yaml_file(path)?,
            None => LoadConfig::default(),
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(indexer) = self.indexer {
            config.indexer = indexer;
        }
        if let Some(target) = self.target {
            config.target = target;
        }
        if self.dry_run {
            config.do_load = false;
        }
        if self.fail_fast {
            config.retry = RetryPolicy::FailFast;
        } else if let Some(delay_ms) = self.retry_delay_ms {
            config.retry = RetryPolicy::RetryUntilSuccess { delay_ms };
        }

        config.validate()?;
        Ok(config)
    }

    fn open_input(&self) -> Result<Box<dyn BufRead + Send>> {
        Ok(match &self.file {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("failed to open input {}", path.display()))?;
                Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))
            }
            None => Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, std::io::stdin())),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = cli.load_config().context("invalid configuration")?;
    let input = cli.open_input()?;

    let decoder: Box<dyn PointDecoder> = match config.input {
        InputFormat::Text => Box::new(TextDecoder::new(input)),
        InputFormat::Framed => Box::new(FramedDecoder::new(input, config.max_frame_len)),
    };
    let indexer: Box<dyn PointIndexer> = match config.indexer {
        IndexerKind::Constant => Box::new(ConstantIndexer),
        IndexerKind::Hash => Box::new(HashIndexer),
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            signal_cancel.cancel();
        }
    });

    let runner = LoadRunner::new(config.clone(), cancel.clone());
    let metrics = match config.target {
        TargetFormat::RemoteWrite => {
            let scratch = scratch_pool(config.workers * 2, 64 * 1024);
            let processor = RemoteWriteProcessor::new(&config, scratch, cancel)?;
            runner.run(decoder, indexer, RemoteWriteBatchFactory, processor).await
        }
        TargetFormat::TextImport => {
            let processor = TextImportProcessor::new(&config, cancel)?;
            runner.run(decoder, indexer, TextBatchFactory, processor).await
        }
    }
    .context("load run failed")?;

    print!("{}", metrics.summary());

    if let Some(path) = &cli.json_output {
        std::fs::write(path, metrics.to_json()?)?;
        info!("JSON summary saved to: {}", path.display());
    }

    Ok(())
}
