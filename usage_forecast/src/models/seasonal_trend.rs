//! Seasonal trend model
//!
//! A decomposable model with a piecewise-linear trend `g(t)`, Fourier yearly
//! and weekly seasonality and one indicator per (holiday, day offset):
//!
//! - additive: `y = g(t) + s(t)`
//! - multiplicative: `y = g(t) · (1 + s(t))`
//!
//! Parameters are the maximum a posteriori estimate under Gaussian priors on
//! the seasonal and holiday coefficients and a Laplace prior on the trend
//! changes. Uncertainty comes from simulating future trend changes and adding
//! Gaussian observation noise.

use super::trend::{
    changepoint_positions, piecewise_linear, sample_trend, trend_design_row, trend_penalties,
};
use super::{ForecastModel, ForecastResult, ForecastRow, TrainedForecastModel, QUANTILE_COUNT};
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::holidays::HolidayEntry;
use crate::registry::{ModelConfig, SeasonalityMode};
use crate::utils::{date_range, future_dates};
use chrono::{Days, NaiveDate};
use forecast_math::fourier::{epoch_days, fourier_terms, WEEKLY_PERIOD, YEARLY_PERIOD};
use forecast_math::linalg::{design_matrix, penalized_least_squares, scale_rows};
use forecast_math::stats::{quantiles, root_mean_square, DECILES};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

pub const DEFAULT_INTERVAL_WIDTH: f64 = 0.8;
pub const DEFAULT_UNCERTAINTY_SAMPLES: usize = 1000;

const DEFAULT_YEARLY_ORDER: usize = 10;
const DEFAULT_WEEKLY_ORDER: usize = 3;
const YEARLY_MIN_SPAN_DAYS: i64 = 730;
const WEEKLY_MIN_SPAN_DAYS: i64 = 14;

const INITIAL_SIGMA: f64 = 0.05;
const MIN_SIGMA: f64 = 1e-4;
const MAX_ITERATIONS: usize = 40;
const TOLERANCE: f64 = 1e-7;
const MIN_TRAINING_ROWS: usize = 2;

/// One holiday regressor: the effect of `name` at `offset` days from its date
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HolidayColumn {
    pub name: String,
    pub offset: i64,
}

/// Distinct (name, offset) pairs of a holiday table, in sorted order
pub fn holiday_columns(holidays: &[HolidayEntry]) -> Vec<HolidayColumn> {
    let columns: BTreeSet<HolidayColumn> = holidays
        .iter()
        .flat_map(|entry| {
            entry.offsets().map(move |offset| HolidayColumn {
                name: entry.name.clone(),
                offset,
            })
        })
        .collect();
    columns.into_iter().collect()
}

/// Seasonal and holiday feature rows for arbitrary dates
struct FeatureLayout {
    yearly_order: usize,
    weekly_order: usize,
    holiday_width: usize,
    active: HashMap<NaiveDate, Vec<usize>>,
}

impl FeatureLayout {
    fn new(
        yearly_order: usize,
        weekly_order: usize,
        columns: &[HolidayColumn],
        holidays: &[HolidayEntry],
    ) -> Self {
        let index: HashMap<(&str, i64), usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| ((c.name.as_str(), c.offset), i))
            .collect();

        let mut active: HashMap<NaiveDate, Vec<usize>> = HashMap::new();
        for entry in holidays {
            for offset in entry.offsets() {
                let column = index.get(&(entry.name.as_str(), offset));
                if let (Some(&column), Some(day)) = (column, entry.day_at(offset)) {
                    active.entry(day).or_default().push(column);
                }
            }
        }

        Self {
            yearly_order,
            weekly_order,
            holiday_width: columns.len(),
            active,
        }
    }

    fn fourier_width(&self) -> usize {
        2 * (self.yearly_order + self.weekly_order)
    }

    fn width(&self) -> usize {
        self.fourier_width() + self.holiday_width
    }

    fn row(&self, date: NaiveDate) -> Vec<f64> {
        let t = epoch_days(date);
        let mut row = fourier_terms(t, YEARLY_PERIOD, self.yearly_order);
        row.extend(fourier_terms(t, WEEKLY_PERIOD, self.weekly_order));

        let offset = row.len();
        row.resize(offset + self.holiday_width, 0.0);
        if let Some(columns) = self.active.get(&date) {
            for &column in columns {
                row[offset + column] = 1.0;
            }
        }
        row
    }

    /// Prior standard deviation of each feature coefficient
    fn prior_scales(&self, seasonality: f64, holidays: f64) -> Vec<f64> {
        let mut scales = vec![seasonality; self.fourier_width()];
        scales.extend(std::iter::repeat(holidays).take(self.holiday_width));
        scales
    }
}

/// Coefficients in scaled units
struct Coefficients {
    /// `(k, m, δ..)`
    theta: DVector<f64>,
    beta: DVector<f64>,
    sigma: f64,
    iterations: usize,
}

fn max_abs_diff(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .fold(0.0, |acc, (x, y)| acc.max((x - y).abs()))
}

fn gaussian_penalties(sigma: f64, scales: &[f64]) -> Vec<f64> {
    scales.iter().map(|s| (sigma * sigma) / (s * s)).collect()
}

fn fit_additive(
    trend_x: &DMatrix<f64>,
    seasonal_x: &DMatrix<f64>,
    y: &DVector<f64>,
    scales: &[f64],
    tau: f64,
) -> Result<Coefficients> {
    let n = trend_x.nrows();
    let n_trend = trend_x.ncols();
    let n_seasonal = seasonal_x.ncols();
    let x = DMatrix::from_fn(n, n_trend + n_seasonal, |i, j| {
        if j < n_trend {
            trend_x[(i, j)]
        } else {
            seasonal_x[(i, j - n_trend)]
        }
    });

    let mut sigma = INITIAL_SIGMA;
    let mut deltas = vec![tau; n_trend - 2];
    let mut coef = DVector::zeros(n_trend + n_seasonal);
    let mut iterations = 0;

    for iteration in 0..MAX_ITERATIONS {
        iterations = iteration + 1;
        let mut penalties = trend_penalties(sigma, tau, &deltas);
        penalties.extend(gaussian_penalties(sigma, scales));

        let next = penalized_least_squares(&x, y, &penalties)?;
        let residuals = y - &x * &next;
        sigma = root_mean_square(residuals.as_slice()).max(MIN_SIGMA);

        let change = max_abs_diff(&next, &coef);
        coef = next;
        deltas = coef.iter().skip(2).take(n_trend - 2).copied().collect();
        if iteration > 0 && change < TOLERANCE {
            break;
        }
    }

    Ok(Coefficients {
        theta: coef.rows(0, n_trend).into_owned(),
        beta: coef.rows(n_trend, n_seasonal).into_owned(),
        sigma,
        iterations,
    })
}

/// Alternate between the seasonal coefficients for a fixed trend and the
/// trend parameters for a fixed seasonal factor.
fn fit_multiplicative(
    trend_x: &DMatrix<f64>,
    seasonal_x: &DMatrix<f64>,
    y: &DVector<f64>,
    scales: &[f64],
    tau: f64,
) -> Result<Coefficients> {
    let n = trend_x.nrows();
    let n_deltas = trend_x.ncols() - 2;
    let n_seasonal = seasonal_x.ncols();

    let mut sigma = INITIAL_SIGMA;
    let mut deltas = vec![tau; n_deltas];
    let mut theta = penalized_least_squares(trend_x, y, &trend_penalties(sigma, tau, &deltas))?;
    let mut beta = DVector::zeros(n_seasonal);
    let mut iterations = 0;

    for iteration in 0..MAX_ITERATIONS {
        iterations = iteration + 1;
        let trend = trend_x * &theta;

        let next_beta = if n_seasonal == 0 {
            beta.clone()
        } else {
            let weighted = scale_rows(seasonal_x, trend.as_slice())?;
            let target = y - &trend;
            penalized_least_squares(&weighted, &target, &gaussian_penalties(sigma, scales))?
        };

        let factor = if n_seasonal == 0 {
            DVector::from_element(n, 1.0)
        } else {
            (seasonal_x * &next_beta).add_scalar(1.0)
        };
        let weighted_trend = scale_rows(trend_x, factor.as_slice())?;
        let next_theta = penalized_least_squares(
            &weighted_trend,
            y,
            &trend_penalties(sigma, tau, &deltas),
        )?;

        let fitted = (trend_x * &next_theta).component_mul(&factor);
        sigma = root_mean_square((y - fitted).as_slice()).max(MIN_SIGMA);

        let change = max_abs_diff(&next_theta, &theta).max(max_abs_diff(&next_beta, &beta));
        theta = next_theta;
        beta = next_beta;
        deltas = theta.iter().skip(2).copied().collect();
        if iteration > 0 && change < TOLERANCE {
            break;
        }
    }

    Ok(Coefficients {
        theta,
        beta,
        sigma,
        iterations,
    })
}

/// Untrained seasonal trend model
#[derive(Debug, Clone)]
pub struct SeasonalTrendModel {
    config: ModelConfig,
    holidays: Vec<HolidayEntry>,
    interval_width: f64,
    uncertainty_samples: usize,
    seed: u64,
}

impl SeasonalTrendModel {
    /// Create a model from a validated configuration, without holidays
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            holidays: Vec::new(),
            interval_width: DEFAULT_INTERVAL_WIDTH,
            uncertainty_samples: DEFAULT_UNCERTAINTY_SAMPLES,
            seed: 0,
        })
    }

    /// Holiday table whose entries become indicator regressors
    pub fn with_holidays(mut self, holidays: Vec<HolidayEntry>) -> Self {
        self.holidays = holidays;
        self
    }

    pub fn with_interval_width(mut self, width: f64) -> Result<Self> {
        if !(width > 0.0 && width < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Interval width must be between 0 and 1, got {}",
                width
            )));
        }
        self.interval_width = width;
        Ok(self)
    }

    /// Number of predictive draws. Zero disables interval estimation.
    pub fn with_uncertainty_samples(mut self, samples: usize) -> Self {
        self.uncertainty_samples = samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn holidays(&self) -> &[HolidayEntry] {
        &self.holidays
    }
}

impl ForecastModel for SeasonalTrendModel {
    type Trained = FittedSeasonalTrend;

    fn train(&self, data: &Series) -> Result<Self::Trained> {
        if data.len() < MIN_TRAINING_ROWS {
            return Err(ForecastError::InsufficientData {
                needed: MIN_TRAINING_ROWS,
                got: data.len(),
            });
        }
        let (start, last) = match (data.first_date(), data.last_date()) {
            (Some(start), Some(last)) => (start, last),
            _ => {
                return Err(ForecastError::InsufficientData {
                    needed: MIN_TRAINING_ROWS,
                    got: 0,
                })
            }
        };

        let config = &self.config;
        let span_days = (last - start).num_days();
        let t_span_days = span_days as f64;
        let dates = data.dates();
        let values = data.values();

        let max_abs = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let y_scale = if max_abs > 0.0 { max_abs } else { 1.0 };
        let ts: Vec<f64> = dates
            .iter()
            .map(|d| (*d - start).num_days() as f64 / t_span_days)
            .collect();
        let y = DVector::from_iterator(values.len(), values.iter().map(|v| v / y_scale));

        let changepoints =
            changepoint_positions(&ts, config.n_changepoints, config.changepoint_range);
        let yearly_order = config.yearly_seasonality.resolve(
            DEFAULT_YEARLY_ORDER,
            span_days,
            YEARLY_MIN_SPAN_DAYS,
        );
        let weekly_order = config.weekly_seasonality.resolve(
            DEFAULT_WEEKLY_ORDER,
            span_days,
            WEEKLY_MIN_SPAN_DAYS,
        );
        let columns = holiday_columns(&self.holidays);
        let layout = FeatureLayout::new(yearly_order, weekly_order, &columns, &self.holidays);

        let trend_rows: Vec<Vec<f64>> = ts
            .iter()
            .map(|&t| trend_design_row(t, &changepoints))
            .collect();
        let trend_x = design_matrix(&trend_rows, 2 + changepoints.len())?;
        let seasonal_rows: Vec<Vec<f64>> = dates.iter().map(|&d| layout.row(d)).collect();
        let seasonal_x = design_matrix(&seasonal_rows, layout.width())?;
        let scales = layout.prior_scales(config.seasonality_prior_scale, config.holidays_prior_scale);

        let tau = config.changepoint_prior_scale;
        let fit = match config.seasonality_mode {
            SeasonalityMode::Additive => fit_additive(&trend_x, &seasonal_x, &y, &scales, tau)?,
            SeasonalityMode::Multiplicative => {
                fit_multiplicative(&trend_x, &seasonal_x, &y, &scales, tau)?
            }
        };

        if fit.theta.iter().chain(fit.beta.iter()).any(|v| !v.is_finite()) {
            return Err(ForecastError::ForecastingError(
                "Fit produced non-finite coefficients".to_string(),
            ));
        }

        debug!(
            rows = data.len(),
            changepoints = changepoints.len(),
            yearly_order,
            weekly_order,
            holiday_columns = columns.len(),
            iterations = fit.iterations,
            sigma = fit.sigma,
            "fitted seasonal trend model"
        );

        Ok(FittedSeasonalTrend {
            mode: config.seasonality_mode,
            start,
            last_training_date: last,
            t_span_days,
            y_scale,
            changepoints,
            k: fit.theta[0],
            m: fit.theta[1],
            deltas: fit.theta.iter().skip(2).copied().collect(),
            yearly_order,
            weekly_order,
            holiday_columns: columns,
            holidays: self.holidays.clone(),
            beta: fit.beta.iter().copied().collect(),
            sigma_obs: fit.sigma,
            interval_width: self.interval_width,
            uncertainty_samples: self.uncertainty_samples,
            seed: self.seed,
            training_rows: data.len(),
        })
    }

    fn name(&self) -> &str {
        "SeasonalTrend"
    }
}

/// Trained seasonal trend model with everything needed to forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSeasonalTrend {
    mode: SeasonalityMode,
    start: NaiveDate,
    last_training_date: NaiveDate,
    t_span_days: f64,
    y_scale: f64,
    /// Changepoints in scaled time
    changepoints: Vec<f64>,
    k: f64,
    m: f64,
    deltas: Vec<f64>,
    yearly_order: usize,
    weekly_order: usize,
    holiday_columns: Vec<HolidayColumn>,
    holidays: Vec<HolidayEntry>,
    beta: Vec<f64>,
    sigma_obs: f64,
    interval_width: f64,
    uncertainty_samples: usize,
    seed: u64,
    training_rows: usize,
}

impl FittedSeasonalTrend {
    pub fn mode(&self) -> SeasonalityMode {
        self.mode
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    pub fn last_training_date(&self) -> NaiveDate {
        self.last_training_date
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Changepoint locations as calendar dates
    pub fn changepoint_dates(&self) -> Vec<NaiveDate> {
        self.changepoints
            .iter()
            .filter_map(|t| {
                let days = (t * self.t_span_days).round() as u64;
                self.start.checked_add_days(Days::new(days))
            })
            .collect()
    }

    /// Fitted trend changes in scaled units
    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    /// Observation noise in scaled units
    pub fn sigma(&self) -> f64 {
        self.sigma_obs
    }

    pub fn y_scale(&self) -> f64 {
        self.y_scale
    }

    /// Fourier orders `(yearly, weekly)` actually fitted
    pub fn seasonal_orders(&self) -> (usize, usize) {
        (self.yearly_order, self.weekly_order)
    }

    pub fn holiday_columns(&self) -> &[HolidayColumn] {
        &self.holiday_columns
    }

    pub fn interval_width(&self) -> f64 {
        self.interval_width
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.t_span_days
    }

    fn combine(&self, trend: f64, seasonal: f64, noise: f64) -> f64 {
        match self.mode {
            SeasonalityMode::Additive => self.y_scale * (trend + seasonal + noise),
            SeasonalityMode::Multiplicative => self.y_scale * (trend * (1.0 + seasonal) + noise),
        }
    }

    /// Seasonal plus holiday component for each date, in scaled units
    fn seasonal_component(&self, dates: &[NaiveDate]) -> Vec<f64> {
        let layout = FeatureLayout::new(
            self.yearly_order,
            self.weekly_order,
            &self.holiday_columns,
            &self.holidays,
        );
        dates
            .iter()
            .map(|&d| {
                layout
                    .row(d)
                    .iter()
                    .zip(&self.beta)
                    .map(|(x, b)| x * b)
                    .sum()
            })
            .collect()
    }

    /// Forecast every date of the inclusive range `[start, end]`
    pub fn forecast_range(&self, start: NaiveDate, end: NaiveDate) -> Result<ForecastResult> {
        if start > end {
            return Err(ForecastError::InvalidParameter(format!(
                "Forecast range start {} is after end {}",
                start, end
            )));
        }
        self.forecast_dates(&date_range(start, end))
    }

    /// Serialize to bytes for the model cache
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl TrainedForecastModel for FittedSeasonalTrend {
    fn forecast_dates(&self, dates: &[NaiveDate]) -> Result<ForecastResult> {
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ForecastError::InvalidParameter(format!(
                "Forecast dates must be strictly ascending, got {} before {}",
                pair[0], pair[1]
            )));
        }
        if dates.is_empty() {
            return Ok(ForecastResult::default());
        }

        let ts: Vec<f64> = dates.iter().map(|&d| self.scaled_time(d)).collect();
        let seasonal = self.seasonal_component(dates);
        let yhat: Vec<f64> = ts
            .iter()
            .zip(&seasonal)
            .map(|(&t, &s)| {
                let trend = piecewise_linear(t, self.k, self.m, &self.deltas, &self.changepoints);
                self.combine(trend, s, 0.0)
            })
            .collect();

        if self.uncertainty_samples == 0 {
            let rows = dates
                .iter()
                .zip(yhat)
                .map(|(&date, yhat)| ForecastRow {
                    date,
                    yhat,
                    yhat_lower: yhat,
                    yhat_upper: yhat,
                    quantiles: None,
                })
                .collect();
            return ForecastResult::new(rows);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let noise = Normal::new(0.0, self.sigma_obs)
            .map_err(|e| ForecastError::ForecastingError(format!("Observation noise: {}", e)))?;
        let mut draws: Vec<Vec<f64>> = vec![Vec::with_capacity(self.uncertainty_samples); dates.len()];
        for _ in 0..self.uncertainty_samples {
            let trend = sample_trend(
                &mut rng,
                &ts,
                self.k,
                self.m,
                &self.deltas,
                &self.changepoints,
            )?;
            for (i, g) in trend.iter().enumerate() {
                let eps = noise.sample(&mut rng);
                draws[i].push(self.combine(*g, seasonal[i], eps));
            }
        }

        let mut levels = vec![
            (1.0 - self.interval_width) / 2.0,
            (1.0 + self.interval_width) / 2.0,
        ];
        levels.extend_from_slice(&DECILES);

        let rows = dates
            .iter()
            .zip(yhat)
            .zip(&draws)
            .map(|((&date, yhat), samples)| {
                let q = quantiles(samples, &levels)?;
                let mut deciles = [0.0; QUANTILE_COUNT];
                deciles.copy_from_slice(&q[2..]);
                Ok(ForecastRow {
                    date,
                    yhat,
                    yhat_lower: q[0],
                    yhat_upper: q[1],
                    quantiles: Some(deciles),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        ForecastResult::new(rows)
    }

    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        self.forecast_dates(&future_dates(self.last_training_date, horizon))
    }

    fn name(&self) -> &str {
        "SeasonalTrend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SeasonalityStrength;
    use std::f64::consts::PI;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn synthetic<F: Fn(usize, NaiveDate) -> f64>(start: &str, days: usize, f: F) -> Series {
        let dates: Vec<NaiveDate> = d(start).iter_days().take(days).collect();
        let values = dates.iter().enumerate().map(|(i, &dt)| f(i, dt)).collect();
        Series::new("synthetic", dates, values).unwrap()
    }

    fn weekly(date: NaiveDate) -> f64 {
        (2.0 * PI * epoch_days(date) / 7.0).sin()
    }

    fn small_config() -> ModelConfig {
        ModelConfig {
            n_changepoints: 5,
            yearly_seasonality: SeasonalityStrength::Disabled,
            weekly_seasonality: SeasonalityStrength::Fourier(1),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn additive_fit_extrapolates_trend_and_week() {
        let truth = |i: usize, dt: NaiveDate| 100.0 + 0.05 * i as f64 + 10.0 * weekly(dt);
        let series = synthetic("2018-01-01", 400, truth);
        let model = SeasonalTrendModel::new(small_config())
            .unwrap()
            .with_uncertainty_samples(100);

        let fitted = model.train(&series).unwrap();
        let forecast = fitted.forecast(14).unwrap();
        assert_eq!(forecast.len(), 14);

        for (i, row) in forecast.rows().iter().enumerate() {
            let expected = truth(400 + i, row.date);
            assert!(
                (row.yhat - expected).abs() / expected < 0.02,
                "{} vs {}",
                row.yhat,
                expected
            );
        }
    }

    #[test]
    fn multiplicative_fit_scales_seasonality_with_trend() {
        let truth = |i: usize, dt: NaiveDate| (50.0 + 0.2 * i as f64) * (1.0 + 0.1 * weekly(dt));
        let series = synthetic("2018-01-01", 400, truth);
        let config = ModelConfig {
            seasonality_mode: SeasonalityMode::Multiplicative,
            ..small_config()
        };
        let fitted = SeasonalTrendModel::new(config)
            .unwrap()
            .with_uncertainty_samples(0)
            .train(&series)
            .unwrap();

        let forecast = fitted.forecast(7).unwrap();
        for (i, row) in forecast.rows().iter().enumerate() {
            let expected = truth(400 + i, row.date);
            assert!((row.yhat - expected).abs() / expected < 0.03);
        }
    }

    #[test]
    fn intervals_bracket_the_point_forecast() {
        let series = synthetic("2018-01-01", 200, |i, dt| {
            20.0 + 0.1 * i as f64 + 2.0 * weekly(dt) + if i % 3 == 0 { 0.5 } else { -0.25 }
        });
        let fitted = SeasonalTrendModel::new(small_config())
            .unwrap()
            .with_uncertainty_samples(300)
            .with_seed(11)
            .train(&series)
            .unwrap();

        for row in fitted.forecast(30).unwrap().rows() {
            assert!(row.yhat_lower < row.yhat && row.yhat < row.yhat_upper);
            let q = row.quantiles.unwrap();
            assert!(q.windows(2).all(|w| w[0] <= w[1]));
            // p10 and p90 coincide with the 80% interval bounds
            assert!((q[0] - row.yhat_lower).abs() < 1e-6);
            assert!((q[8] - row.yhat_upper).abs() < 1e-6);
        }
    }

    #[test]
    fn holiday_effect_is_learned() {
        let spikes: Vec<HolidayEntry> = ["2018-03-01", "2018-06-01", "2018-09-01", "2019-01-15"]
            .iter()
            .map(|s| HolidayEntry::new("promo", d(s), 0, 1))
            .collect();
        let series = synthetic("2018-01-01", 365, |_, dt| {
            let boost = if spikes[..3].iter().any(|h| h.offset_of(dt).is_some()) {
                30.0
            } else {
                0.0
            };
            100.0 + boost
        });
        let config = ModelConfig {
            weekly_seasonality: SeasonalityStrength::Disabled,
            ..small_config()
        };
        let fitted = SeasonalTrendModel::new(config)
            .unwrap()
            .with_holidays(spikes)
            .with_uncertainty_samples(0)
            .train(&series)
            .unwrap();

        assert_eq!(fitted.holiday_columns().len(), 2);
        let forecast = fitted.forecast_range(d("2019-01-14"), d("2019-01-17")).unwrap();
        let values = forecast.values();
        assert!(values[1] > values[0] + 20.0);
        assert!(values[2] > values[0] + 20.0);
        assert!((values[3] - values[0]).abs() < 5.0);
    }

    #[test]
    fn round_trip_through_bytes_is_exact() {
        let series = synthetic("2018-01-01", 120, |i, dt| 10.0 + (i as f64).sqrt() + weekly(dt));
        let fitted = SeasonalTrendModel::new(small_config())
            .unwrap()
            .with_uncertainty_samples(50)
            .with_seed(5)
            .train(&series)
            .unwrap();

        let restored = FittedSeasonalTrend::from_bytes(&fitted.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, fitted);
        assert_eq!(restored.forecast(10).unwrap(), fitted.forecast(10).unwrap());
    }

    #[test]
    fn disabled_sampling_gives_zero_width() {
        let series = synthetic("2018-01-01", 60, |i, _| 5.0 + i as f64);
        let fitted = SeasonalTrendModel::new(small_config())
            .unwrap()
            .with_uncertainty_samples(0)
            .train(&series)
            .unwrap();
        let row = fitted.forecast(1).unwrap().rows()[0];
        assert_eq!(row.yhat_lower, row.yhat);
        assert_eq!(row.yhat_upper, row.yhat);
        assert!(row.quantiles.is_none());
    }

    #[test]
    fn rejects_tiny_and_unordered_input() {
        let series = synthetic("2018-01-01", 1, |_, _| 1.0);
        let model = SeasonalTrendModel::new(small_config()).unwrap();
        assert!(matches!(
            model.train(&series),
            Err(ForecastError::InsufficientData { needed: 2, got: 1 })
        ));

        let series = synthetic("2018-01-01", 30, |i, _| i as f64);
        let fitted = model.train(&series).unwrap();
        assert!(fitted
            .forecast_dates(&[d("2018-03-02"), d("2018-03-01")])
            .is_err());
        assert!(SeasonalTrendModel::new(small_config())
            .unwrap()
            .with_interval_width(1.0)
            .is_err());
    }

    #[test]
    fn holiday_columns_are_distinct_pairs() {
        let table = vec![
            HolidayEntry::new("a", d("2018-01-10"), 1, 0),
            HolidayEntry::new("a", d("2019-01-10"), 1, 0),
            HolidayEntry::new("b", d("2018-05-01"), 0, 0),
        ];
        let columns = holiday_columns(&table);
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0], HolidayColumn { name: "a".into(), offset: -1 });
    }
}
