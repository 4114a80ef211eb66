//! Forecast engine
//!
//! Drives the per-series workflow for one metric: look up the model
//! configuration, fit or load a model, forecast, join with actuals and score.
//! Series are processed in parallel; each task returns its own outcome and the
//! outcomes are merged into a [`RunReport`] once the parallel section ends.

use crate::cache::{BlobStore, ModelCache};
use crate::data::{PartitionedData, Rejection, Series};
use crate::error::{ForecastError, Result};
use crate::holidays::holiday_table;
use crate::models::seasonal_trend::{
    FittedSeasonalTrend, SeasonalTrendModel, DEFAULT_INTERVAL_WIDTH, DEFAULT_UNCERTAINTY_SAMPLES,
};
use crate::models::{ForecastModel, ForecastResult};
use crate::registry::ModelRegistry;
use crate::scoring::{score_series, DeviationRecord, ScoredSeries};
use chrono::{Datelike, Days, NaiveDate};
use rayon::prelude::*;
use tracing::{info, warn};

/// Forecast horizons shorter than this many days are not scored after a retrain
pub const DEFAULT_MIN_HORIZON_DAYS: usize = 10;

/// Engine-wide policy
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub min_horizon_days: usize,
    pub interval_width: f64,
    pub uncertainty_samples: usize,
    pub seed: u64,
    /// Extra years of holidays generated past the horizon end, so cached
    /// models keep their holiday effects when predicting later dates
    pub calendar_lookahead_years: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_horizon_days: DEFAULT_MIN_HORIZON_DAYS,
            interval_width: DEFAULT_INTERVAL_WIDTH,
            uncertainty_samples: DEFAULT_UNCERTAINTY_SAMPLES,
            seed: 0,
            calendar_lookahead_years: 1,
        }
    }
}

/// A source metric and the name its deviations are published under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    /// Identifies the input table and the cache namespace
    pub source: String,
    pub published: String,
}

impl Metric {
    pub fn new(source: &str, published: &str) -> Self {
        Self {
            source: source.to_string(),
            published: published.to_string(),
        }
    }
}

/// A series, or one date of it, that failed
#[derive(Debug)]
pub struct SeriesFailure {
    pub series_key: String,
    pub date: Option<NaiveDate>,
    pub error: ForecastError,
}

/// A series deliberately left out
#[derive(Debug)]
pub struct SeriesSkip {
    pub series_key: String,
    pub reason: ForecastError,
}

/// Everything one run produced
#[derive(Debug, Default)]
pub struct RunReport {
    pub records: Vec<DeviationRecord>,
    pub failures: Vec<SeriesFailure>,
    pub skipped: Vec<SeriesSkip>,
}

impl RunReport {
    /// Start a report with the partitioner's rejections and skips
    pub fn from_partition(rejected: Vec<Rejection>, skipped: Vec<Rejection>) -> Self {
        Self {
            records: Vec::new(),
            failures: rejected
                .into_iter()
                .map(|r| SeriesFailure {
                    series_key: r.series_key,
                    date: None,
                    error: r.error,
                })
                .collect(),
            skipped: skipped
                .into_iter()
                .map(|r| SeriesSkip {
                    series_key: r.series_key,
                    reason: r.error,
                })
                .collect(),
        }
    }

    pub fn merge(&mut self, other: RunReport) {
        self.records.extend(other.records);
        self.failures.extend(other.failures);
        self.skipped.extend(other.skipped);
    }

    fn add_scored(&mut self, series_key: &str, scored: ScoredSeries) {
        self.records.extend(scored.records);
        self.failures
            .extend(scored.failures.into_iter().map(|(date, error)| SeriesFailure {
                series_key: series_key.to_string(),
                date: Some(date),
                error,
            }));
    }

    fn fail(&mut self, series_key: &str, error: ForecastError) {
        self.failures.push(SeriesFailure {
            series_key: series_key.to_string(),
            date: None,
            error,
        });
    }

    /// Sort records and failures by series key, then date
    pub fn sort(&mut self) {
        self.records
            .sort_by(|a, b| (&a.series_key, a.date).cmp(&(&b.series_key, b.date)));
        self.failures
            .sort_by(|a, b| (&a.series_key, a.date).cmp(&(&b.series_key, b.date)));
        self.skipped.sort_by(|a, b| a.series_key.cmp(&b.series_key));
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of retraining one series
struct Retrained {
    model: FittedSeasonalTrend,
    scored: std::result::Result<ScoredSeries, ForecastError>,
}

/// Per-series forecasting and scoring for one registry and cache
#[derive(Debug)]
pub struct ForecastEngine<'a, S: BlobStore> {
    registry: &'a ModelRegistry,
    cache: &'a ModelCache<S>,
    settings: EngineSettings,
}

impl<'a, S: BlobStore> ForecastEngine<'a, S> {
    pub fn new(registry: &'a ModelRegistry, cache: &'a ModelCache<S>, settings: EngineSettings) -> Self {
        Self {
            registry,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Model for `key` with holidays for the years `[first_year, last_year]`
    /// plus the lookahead
    pub fn build_model(&self, key: &str, first_year: i32, last_year: i32) -> Result<SeasonalTrendModel> {
        let config = self.registry.get(key)?;
        let years = first_year..=last_year + self.settings.calendar_lookahead_years;
        let holidays = holiday_table(&config.holidays, years)?;

        Ok(SeasonalTrendModel::new(config.clone())?
            .with_holidays(holidays)
            .with_interval_width(self.settings.interval_width)?
            .with_uncertainty_samples(self.settings.uncertainty_samples)
            .with_seed(self.settings.seed))
    }

    /// Observations of `training` the model for `key` is fitted on
    pub fn fit_input(&self, key: &str, training: &Series) -> Result<Series> {
        Ok(self.registry.get(key)?.training_input(training))
    }

    /// Fit the model for `key` on `training`, with holidays through `horizon_end`
    pub fn fit_series(
        &self,
        key: &str,
        training: &Series,
        horizon_end: NaiveDate,
    ) -> Result<FittedSeasonalTrend> {
        let input = self.fit_input(key, training)?;
        let first_year = input
            .first_date()
            .ok_or(ForecastError::InsufficientData { needed: 2, got: 0 })?
            .year();
        let model = self.build_model(key, first_year, horizon_end.year())?;
        model.train(&input)
    }

    /// Fit every training series, score its horizon and replace the metric's
    /// cached models.
    ///
    /// Per-series problems land in the report. Only infrastructure errors,
    /// such as a failing cache store, abort the run.
    pub fn retrain(&self, metric: &Metric, data: PartitionedData) -> Result<RunReport> {
        let PartitionedData {
            full,
            training,
            rejected,
            skipped,
        } = data;
        let mut report = RunReport::from_partition(rejected, skipped);

        let missing = self
            .registry
            .validate_keys(training.keys().map(String::as_str));
        for key in &missing {
            warn!(metric = %metric.source, series_key = key, "no model configuration");
            report.fail(key, ForecastError::Configuration(key.to_string()));
        }

        let eligible: Vec<(&String, &Series)> = training
            .iter()
            .filter(|(key, _)| !missing.contains(&key.as_str()))
            .collect();

        let outcomes: Vec<(String, Result<Retrained>)> = eligible
            .par_iter()
            .map(|(key, training)| {
                let outcome = self.retrain_one(metric, key, training, full.get(*key));
                ((*key).clone(), outcome)
            })
            .collect();

        let mut models = Vec::with_capacity(outcomes.len());
        for (key, outcome) in outcomes {
            match outcome {
                Ok(Retrained { model, scored }) => {
                    models.push((key.clone(), model));
                    match scored {
                        Ok(scored) => report.add_scored(&key, scored),
                        Err(reason) => report.skipped.push(SeriesSkip {
                            series_key: key,
                            reason,
                        }),
                    }
                }
                Err(err) if err.is_infrastructure() => return Err(err),
                Err(err) if err.is_skip() => report.skipped.push(SeriesSkip {
                    series_key: key,
                    reason: err,
                }),
                Err(err) => {
                    warn!(metric = %metric.source, series_key = %key, error = %err, "series failed");
                    report.fail(&key, err);
                }
            }
        }

        self.cache.put_batch(&metric.source, &models)?;
        report.sort();
        info!(
            metric = %metric.source,
            models = models.len(),
            records = report.records.len(),
            failures = report.failures.len(),
            skipped = report.skipped.len(),
            "retrain finished"
        );
        Ok(report)
    }

    fn retrain_one(
        &self,
        metric: &Metric,
        key: &str,
        training: &Series,
        full: Option<&Series>,
    ) -> Result<Retrained> {
        info!(metric = %metric.source, series_key = key, rows = training.len(), "starting series");
        let full = full.unwrap_or(training);
        let (training_end, full_end) = match (training.last_date(), full.last_date()) {
            (Some(t), Some(f)) => (t, f),
            _ => return Err(ForecastError::InsufficientData { needed: 2, got: 0 }),
        };

        let model = self.fit_series(key, training, full_end)?;

        let horizon = (full_end - training_end).num_days().max(0) as usize;
        if horizon < self.settings.min_horizon_days {
            info!(series_key = key, horizon, "horizon too short to score");
            return Ok(Retrained {
                model,
                scored: Err(ForecastError::InsufficientData {
                    needed: self.settings.min_horizon_days,
                    got: horizon,
                }),
            });
        }

        let horizon_start = training_end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ForecastError::ForecastingError("Horizon start overflow".to_string()))?;
        let forecast = model.forecast_range(horizon_start, full_end)?;
        let scored = score_series(&metric.published, key, &forecast.join_actuals(full));
        info!(series_key = key, records = scored.records.len(), "done with series");

        Ok(Retrained {
            model,
            scored: Ok(scored),
        })
    }

    /// Score `[start, end]` of every full series with its cached model
    pub fn predict(
        &self,
        metric: &Metric,
        data: PartitionedData,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RunReport> {
        let PartitionedData {
            full,
            rejected,
            skipped,
            ..
        } = data;
        let mut report = RunReport::from_partition(rejected, skipped);

        let outcomes: Vec<(String, Result<ScoredSeries>)> = full
            .par_iter()
            .map(|(key, series)| (key.clone(), self.predict_one(metric, key, series, start, end)))
            .collect();

        for (key, outcome) in outcomes {
            match outcome {
                Ok(scored) => report.add_scored(&key, scored),
                Err(err) if err.is_infrastructure() => return Err(err),
                Err(err) => {
                    warn!(metric = %metric.source, series_key = %key, error = %err, "series failed");
                    report.fail(&key, err);
                }
            }
        }

        report.sort();
        info!(
            metric = %metric.source,
            %start,
            %end,
            records = report.records.len(),
            failures = report.failures.len(),
            "prediction finished"
        );
        Ok(report)
    }

    /// Score a single day
    pub fn predict_daily(
        &self,
        metric: &Metric,
        data: PartitionedData,
        date: NaiveDate,
    ) -> Result<RunReport> {
        self.predict(metric, data, date, date)
    }

    fn predict_one(
        &self,
        metric: &Metric,
        key: &str,
        series: &Series,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ScoredSeries> {
        let model = self
            .cache
            .get(&metric.source, key)?
            .ok_or_else(|| ForecastError::ModelNotFound {
                metric: metric.source.clone(),
                series_key: key.to_string(),
            })?;
        let forecast = model.forecast_range(start, end)?;
        Ok(score_series(&metric.published, key, &forecast.join_actuals(series)))
    }

    /// Fit on the observations up to `asofdate` and forecast the days after
    /// it through `horizon_end`
    pub fn forecast_as_of(
        &self,
        key: &str,
        series: &Series,
        asofdate: NaiveDate,
        horizon_end: NaiveDate,
    ) -> Result<ForecastResult> {
        let history = series.filter(|o| o.date <= asofdate);
        let model = self.fit_series(key, &history, horizon_end)?;
        let first = asofdate
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ForecastError::ForecastingError("Forecast start overflow".to_string()))?;
        model.forecast_range(first, horizon_end)
    }
}
