//! Metrics for evaluating forecast performance

use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use crate::utils::SeriesSplit;
use forecast_math::stats::root_mean_square;
use std::fmt;

fn check_lengths(actual: &[f64], forecast: &[f64]) -> Result<()> {
    if actual.len() != forecast.len() || actual.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

/// Mean of `f(actual, forecast)` over the pairs with a non-zero actual
fn masked_mean<F: Fn(f64, f64) -> f64>(actual: &[f64], forecast: &[f64], f: F) -> Result<f64> {
    check_lengths(actual, forecast)?;
    let terms: Vec<f64> = actual
        .iter()
        .zip(forecast)
        .filter(|(a, _)| **a != 0.0)
        .map(|(&a, &p)| f(a, p))
        .collect();
    if terms.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    Ok(terms.iter().sum::<f64>() / terms.len() as f64)
}

/// Mean absolute percentage error, ignoring zero actuals
pub fn calc_mape(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    masked_mean(actual, forecast, |a, p| ((a - p) / a).abs() * 100.0)
}

/// Mean relative error in percent, ignoring zero actuals. Positive when the
/// forecast is too low.
pub fn calc_mre(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    masked_mean(actual, forecast, |a, p| (a - p) / a * 100.0)
}

/// Mean of `ln(forecast) - ln(actual)`. All values must be positive.
pub fn calc_log_ratio(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    check_lengths(actual, forecast)?;
    if actual.iter().chain(forecast).any(|v| *v <= 0.0) {
        return Err(ForecastError::InvalidParameter(
            "Log ratio needs strictly positive values".to_string(),
        ));
    }
    let sum: f64 = actual
        .iter()
        .zip(forecast)
        .map(|(a, p)| p.ln() - a.ln())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Accuracy of a forecast over the dates it shares with the actuals
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastMetrics {
    pub observations: usize,
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub mre: f64,
    /// Undefined when a value is not positive
    pub log_ratio: Option<f64>,
    /// Share of actuals inside the forecast interval
    pub coverage: f64,
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} MAE={:.2} RMSE={:.2} MAPE={:.2}% MRE={:.2}% coverage={:.1}%",
            self.observations,
            self.mae,
            self.rmse,
            self.mape,
            self.mre,
            self.coverage * 100.0
        )?;
        if let Some(lr) = self.log_ratio {
            write!(f, " log-ratio={:.4}", lr)?;
        }
        Ok(())
    }
}

/// Evaluate forecast accuracy against actual values
pub fn evaluate_forecast(forecast: &ForecastResult, actual: &Series) -> Result<ForecastMetrics> {
    let joined = forecast.join_actuals(actual);
    if joined.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }

    let actuals: Vec<f64> = joined.iter().map(|(_, a)| *a).collect();
    let predicted: Vec<f64> = joined.iter().map(|(r, _)| r.yhat).collect();
    let errors: Vec<f64> = actuals.iter().zip(&predicted).map(|(a, p)| a - p).collect();
    let inside = joined
        .iter()
        .filter(|(r, a)| *a >= r.yhat_lower && *a <= r.yhat_upper)
        .count();

    Ok(ForecastMetrics {
        observations: joined.len(),
        mae: errors.iter().map(|e| e.abs()).sum::<f64>() / errors.len() as f64,
        rmse: root_mean_square(&errors),
        mape: calc_mape(&actuals, &predicted)?,
        mre: calc_mre(&actuals, &predicted)?,
        log_ratio: calc_log_ratio(&actuals, &predicted).ok(),
        coverage: inside as f64 / joined.len() as f64,
    })
}

/// Train on the training part of `split` and evaluate on its holdout
pub fn evaluate_holdout<M: ForecastModel>(model: &M, split: &SeriesSplit) -> Result<ForecastMetrics> {
    let trained = model.train(&split.training)?;
    let forecast = trained.predict(&split.holdout)?;
    evaluate_forecast(&forecast, &split.holdout)
}
