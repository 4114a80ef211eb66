//! # anomaly_batch
//!
//! Batch runner for usage deviation scoring.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usage_forecast::cache::{DirectoryBlobStore, ModelCache};
use usage_forecast::config::PipelineConfig;
use usage_forecast::pipeline::{JobSummary, Pipeline};
use usage_forecast::utils::parse_date;
use usage_forecast::ForecastError;

#[derive(Parser)]
#[command(name = "anomaly_batch")]
#[command(about = "Fit usage forecasts and score deviations", long_about = None)]
struct Cli {
    /// Pipeline configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the configured model cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refit every model on the training window and score the days after it
    Retrain,

    /// Score one day against the cached models
    Daily {
        /// Date to score (YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_date_arg)]
        date: NaiveDate,
    },

    /// Publish forecasts fitted on the actuals up to a date
    Forecast {
        /// Last date of actuals used (YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_date_arg)]
        asofdate: NaiveDate,
    },
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn run(cli: Cli) -> Result<Vec<JobSummary>, ForecastError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(output) = cli.output {
        config.output_dir = output;
    }
    if let Some(cache_dir) = cli.cache_dir {
        config.cache_dir = cache_dir;
    }

    if let Some(threads) = config.worker_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| ForecastError::ConfigError(e.to_string()))?;
    }

    let cache = ModelCache::new(DirectoryBlobStore::new(&config.cache_dir));
    let pipeline = Pipeline::new(&config, &cache);

    match cli.command {
        Commands::Retrain => pipeline.run_retrain(),
        Commands::Daily { date } => pipeline.run_daily(date),
        Commands::Forecast { asofdate } => pipeline.run_forecast(asofdate),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "usage_forecast=info,anomaly_batch=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(summaries) => {
            let mut clean = true;
            for s in &summaries {
                info!(
                    metric = %s.source,
                    output = %s.output.display(),
                    records = s.records,
                    failures = s.failures,
                    skipped = s.skipped,
                    "job finished"
                );
                clean &= s.failures == 0;
            }
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(err) => {
            error!(error = %err, "run aborted");
            ExitCode::FAILURE
        }
    }
}
