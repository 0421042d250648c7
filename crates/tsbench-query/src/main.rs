//! CLI entry point for the query runner.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tsbench_query::stat::stat_pool;
use tsbench_query::{HttpQueryProcessor, QueryConfig, QueryRunner, QuerySource};

#[derive(Parser)]
#[command(name = "tsbench-run-queries")]
#[command(about = "Replay pre-generated queries against a time series backend")]
#[command(version)]
struct Cli {
    /// Query file, one JSON object per line
    #[arg(short, long)]
    file: PathBuf,

    /// YAML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(short, long)]
    url: Option<String>,

    /// Number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Leading queries to run without recording
    #[arg(long)]
    burn_in: Option<u64>,

    /// Maximum number of queries to run (0 = all)
    #[arg(short, long)]
    limit: Option<u64>,

    /// Stop on the first failed query
    #[arg(long)]
    abort_on_error: bool,

    /// Validate JSON response envelopes
    #[arg(long)]
    parse_json: bool,

    /// Log response bodies (visible with RUST_LOG=debug)
    #[arg(long)]
    print_responses: bool,

    /// Write the report as JSON to this path
    #[arg(long)]
    json_output: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> Result<QueryConfig> {
        let mut config = match &self.config {
            Some(path) => QueryConfig::from_yaml_file(path)?,
            None => QueryConfig::default(),
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(burn_in) = self.burn_in {
            config.burn_in = burn_in;
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        config.abort_on_error |= self.abort_on_error;
        config.parse_json |= self.parse_json;
        config.print_responses |= self.print_responses;

        config.validate()?;
        Ok(config)
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

    let source = QuerySource::from_path(&cli.file, config.limit())
        .with_context(|| format!("failed to read queries from {}", cli.file.display()))?;
    info!("Loaded {} queries from {}", source.len(), cli.file.display());

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            signal_cancel.cancel();
        }
    });

    let processor = HttpQueryProcessor::new(&config, stat_pool(config.workers * 4))?;
    let report = QueryRunner::new(config, cancel)
        .run(Arc::new(source), processor)
        .await
        .context("query run failed")?;

    print!("{}", report.summary());

    if let Some(path) = &cli.json_output {
        std::fs::write(path, report.to_json()?)?;
        info!("JSON report saved to: {}", path.display());
    }

    Ok(())
}
