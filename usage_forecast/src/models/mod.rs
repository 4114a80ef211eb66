//! Forecasting models for usage series

use crate::data::Series;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use forecast_math::stats::DECILES;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Number of posterior predictive quantiles carried by a forecast row
pub const QUANTILE_COUNT: usize = DECILES.len();

/// Forecast for a single date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    /// p10 .. p90 of the predictive samples, when sampling was enabled
    pub quantiles: Option<[f64; QUANTILE_COUNT]>,
}

impl ForecastRow {
    /// Width of the interval above the point forecast
    pub fn upper_width(&self) -> f64 {
        self.yhat_upper - self.yhat
    }

    /// Width of the interval below the point forecast
    pub fn lower_width(&self) -> f64 {
        self.yhat - self.yhat_lower
    }
}

/// Forecast result containing one row per requested date
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastResult {
    rows: Vec<ForecastRow>,
}

impl ForecastResult {
    /// Create a forecast result from rows in strictly ascending date order
    pub fn new(rows: Vec<ForecastRow>) -> Result<Self> {
        if let Some(pair) = rows.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(ForecastError::ForecastingError(format!(
                "Forecast dates must be strictly ascending, got {} before {}",
                pair[0].date, pair[1].date
            )));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ForecastRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    /// Get the point forecasts
    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.yhat).collect()
    }

    /// Get the `(lower, upper)` interval bounds
    pub fn intervals(&self) -> Vec<(f64, f64)> {
        self.rows
            .iter()
            .map(|r| (r.yhat_lower, r.yhat_upper))
            .collect()
    }

    pub fn row_on(&self, date: NaiveDate) -> Option<&ForecastRow> {
        self.rows
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Inner join with the actuals of `series` on date
    pub fn join_actuals(&self, series: &Series) -> Vec<(ForecastRow, f64)> {
        self.rows
            .iter()
            .filter_map(|row| series.value_on(row.date).map(|actual| (*row, actual)))
            .collect()
    }

    /// Calculate mean absolute error against the overlapping actuals
    pub fn mean_absolute_error(&self, series: &Series) -> Result<f64> {
        let joined = self.join_actuals(series);
        if joined.is_empty() {
            return Err(ForecastError::ForecastingError(
                "Forecast and actuals share no dates".to_string(),
            ));
        }

        let sum: f64 = joined.iter().map(|(f, a)| (f.yhat - a).abs()).sum();
        Ok(sum / joined.len() as f64)
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Forecast exactly the given dates, which must be strictly ascending
    fn forecast_dates(&self, dates: &[NaiveDate]) -> Result<ForecastResult>;

    /// Generate forecast for the `horizon` days after the training data
    fn forecast(&self, horizon: usize) -> Result<ForecastResult>;

    /// Predict values on the dates of `data`
    fn predict(&self, data: &Series) -> Result<ForecastResult> {
        self.forecast_dates(&data.dates())
    }

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a series
    fn train(&self, data: &Series) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod seasonal_trend;
pub mod trend;
