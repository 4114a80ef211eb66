//! Pipeline configuration
//!
//! Read from TOML. Every field has a default; dates must be written as quoted
//! ISO strings (`training_start = "2016-04-08"`).

use crate::data::{PartitionPolicy, TableColumns, TrainingWindow, DEFAULT_MIN_HISTORY, DEFAULT_MIN_SUPPORT};
use crate::engine::{EngineSettings, Metric, DEFAULT_MIN_HORIZON_DAYS};
use crate::error::{ForecastError, Result};
use crate::models::seasonal_trend::{DEFAULT_INTERVAL_WIDTH, DEFAULT_UNCERTAINTY_SAMPLES};
use crate::registry::{geography_registry, product_registry, ModelRegistry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Product KPI tables are complete counts: no support floor, and any series
/// with enough rows to fit a line is modeled
pub const PRODUCT_PARTITION_POLICY: PartitionPolicy = PartitionPolicy {
    min_support: 0,
    min_history: 2,
};

/// Which built-in registry configures a metric's series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    #[default]
    Geography,
    Product,
}

impl RegistryKind {
    pub fn registry(&self) -> &'static ModelRegistry {
        match self {
            RegistryKind::Geography => geography_registry(),
            RegistryKind::Product => product_registry(),
        }
    }
}

/// One input table and where its results are published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricJob {
    pub source: String,
    pub output_name: String,
    pub input: PathBuf,
    #[serde(default)]
    pub registry: RegistryKind,
    #[serde(default)]
    pub columns: TableColumns,
    /// Overrides the volume floors for this job only
    #[serde(default)]
    pub partition: Option<PartitionPolicy>,
}

impl MetricJob {
    pub fn metric(&self) -> Metric {
        Metric::new(&self.source, &self.output_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_support: u64,
    pub min_history: usize,
    pub min_horizon_days: usize,
    pub interval_width: f64,
    pub uncertainty_samples: usize,
    pub seed: u64,
    pub calendar_lookahead_years: i32,
    pub training_start: NaiveDate,
    pub training_end: NaiveDate,
    /// Last date of published forecasts
    pub forecast_horizon_end: NaiveDate,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Size of the worker pool; the rayon default when unset
    pub worker_threads: Option<usize>,
    pub metrics: Vec<MetricJob>,
}

fn ymd(field: &str, year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| panic!("invalid default {}: {}-{}-{}", field, year, month, day))
}

fn geo_job(source: &str, output_name: &str) -> MetricJob {
    MetricJob {
        source: source.to_string(),
        output_name: output_name.to_string(),
        input: PathBuf::from(format!("data/{}.csv", source)),
        registry: RegistryKind::Geography,
        columns: TableColumns {
            series_key: "geography".to_string(),
            ..TableColumns::default()
        },
        partition: None,
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_support: DEFAULT_MIN_SUPPORT,
            min_history: DEFAULT_MIN_HISTORY,
            min_horizon_days: DEFAULT_MIN_HORIZON_DAYS,
            interval_width: DEFAULT_INTERVAL_WIDTH,
            uncertainty_samples: DEFAULT_UNCERTAINTY_SAMPLES,
            seed: 0,
            calendar_lookahead_years: 1,
            training_start: ymd("training_start", 2016, 4, 8),
            training_end: ymd("training_end", 2020, 1, 30),
            forecast_horizon_end: ymd("forecast_horizon_end", 2020, 12, 31),
            cache_dir: PathBuf::from("models"),
            output_dir: PathBuf::from("output"),
            worker_threads: None,
            metrics: vec![
                geo_job("light_funnel_dau_city", "desktop_dau"),
                geo_job("light_funnel_dau_country", "desktop_dau"),
                geo_job(
                    "light_funnel_mean_active_hours_per_profile_city",
                    "mean_active_hours_per_client",
                ),
                geo_job(
                    "light_funnel_mean_active_hours_per_profile_country",
                    "mean_active_hours_per_client",
                ),
            ],
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            ForecastError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.training_start > self.training_end {
            return Err(ForecastError::ConfigError(format!(
                "training_start {} is after training_end {}",
                self.training_start, self.training_end
            )));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "interval_width must be between 0 and 1, got {}",
                self.interval_width
            )));
        }
        if self.worker_threads == Some(0) {
            return Err(ForecastError::ConfigError(
                "worker_threads must be positive".to_string(),
            ));
        }
        for job in &self.metrics {
            if self.metrics.iter().filter(|j| j.source == job.source).count() > 1 {
                return Err(ForecastError::ConfigError(format!(
                    "metric '{}' is configured more than once",
                    job.source
                )));
            }
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            min_horizon_days: self.min_horizon_days,
            interval_width: self.interval_width,
            uncertainty_samples: self.uncertainty_samples,
            seed: self.seed,
            calendar_lookahead_years: self.calendar_lookahead_years,
        }
    }

    pub fn partition_policy(&self) -> PartitionPolicy {
        PartitionPolicy {
            min_support: self.min_support,
            min_history: self.min_history,
        }
    }

    /// Floors for `job`: its own override, else no aggregation floors for
    /// product series (published from their launch date), else the global ones
    pub fn partition_policy_for(&self, job: &MetricJob) -> PartitionPolicy {
        match (job.partition, job.registry) {
            (Some(policy), _) => policy,
            (None, RegistryKind::Product) => PRODUCT_PARTITION_POLICY,
            (None, RegistryKind::Geography) => self.partition_policy(),
        }
    }

    pub fn training_window(&self) -> Result<TrainingWindow> {
        TrainingWindow::new(self.training_start, self.training_end)
    }
}
