//! # Usage Forecast
//!
//! Per-series seasonal forecasting and deviation scoring for daily product
//! usage metrics.
//!
//! ## Features
//!
//! - Partitioning of raw usage tables into per-key daily series, with a
//!   minimum support floor and a minimum history
//! - Holiday calendars (Easter, Chinese New Year, Holi, Nowruz and more)
//! - A registry of per-series model configurations and a persistent model cache
//! - A piecewise-linear trend model with Fourier seasonality and holiday
//!   effects, fitted additively or multiplicatively, with sampled intervals
//! - Relative and interval-scaled deviation scores of actuals against forecasts
//!
//! ## Quick Start
//!
//! ```no_run
//! use usage_forecast::cache::{MemoryBlobStore, ModelCache};
//! use usage_forecast::data::{DataLoader, PartitionPolicy, Partitioner, TableColumns, TrainingWindow};
//! use usage_forecast::engine::{EngineSettings, ForecastEngine, Metric};
//! use usage_forecast::registry::geography_registry;
//! use usage_forecast::utils::parse_date;
//!
//! # fn main() -> usage_forecast::error::Result<()> {
//! let rows = DataLoader::from_csv("dau.csv", &TableColumns::default())?;
//! let window = TrainingWindow::new(parse_date("2016-04-08")?, parse_date("2020-01-30")?)?;
//! let data = Partitioner::new(PartitionPolicy::default()).partition(&rows, &window);
//!
//! let cache = ModelCache::new(MemoryBlobStore::new());
//! let engine = ForecastEngine::new(geography_registry(), &cache, EngineSettings::default());
//! let report = engine.retrain(&Metric::new("dau_country", "desktop_dau"), data)?;
//! println!("{} deviations, {} failures", report.records.len(), report.failures.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod holidays;
pub mod metrics;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod scoring;
pub mod utils;

// Re-export commonly used types
pub use crate::cache::{BlobStore, DirectoryBlobStore, MemoryBlobStore, ModelCache};
pub use crate::data::{DataLoader, PartitionedData, Partitioner, Series};
pub use crate::engine::{EngineSettings, ForecastEngine, Metric, RunReport};
pub use crate::error::ForecastError;
pub use crate::models::seasonal_trend::{FittedSeasonalTrend, SeasonalTrendModel};
pub use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
pub use crate::registry::{ModelConfig, ModelRegistry};
pub use crate::scoring::DeviationRecord;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
