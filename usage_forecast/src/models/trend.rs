//! Piecewise-linear trend with changepoints
//!
//! Time is in scaled units: the training history maps onto `[0, 1]`. The trend
//! is `k·t + m + Σ δ_j·(t - s_j)` summed over changepoints `s_j <= t`.

use crate::error::{ForecastError, Result};
use forecast_math::stats::mean_abs;
use rand::Rng;
use rand_distr::{Distribution, Exp, Poisson};

/// Prior standard deviation of the base growth rate and offset
pub const TREND_PRIOR_SCALE: f64 = 5.0;

/// Lower bound on `|δ|` relative to the prior scale when reweighting
const DELTA_FLOOR: f64 = 1e-3;

/// Changepoint locations spread uniformly over the first `changepoint_range`
/// of the history, taken at observed times and excluding the first one.
pub fn changepoint_positions(ts: &[f64], n_changepoints: usize, changepoint_range: f64) -> Vec<f64> {
    let hist_size = (ts.len() as f64 * changepoint_range).floor() as usize;
    let n = n_changepoints.min(hist_size.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    let mut positions: Vec<f64> = (1..=n)
        .map(|i| {
            let index = (last * i as f64 / n as f64).round() as usize;
            ts[index]
        })
        .collect();
    positions.dedup();
    positions
}

/// Trend design row `[t, 1, (t - s_1)+, ..]` matching `(k, m, δ..)`
pub fn trend_design_row(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len());
    row.push(t);
    row.push(1.0);
    row.extend(changepoints.iter().map(|&s| if t >= s { t - s } else { 0.0 }));
    row
}

pub fn piecewise_linear(t: f64, k: f64, m: f64, deltas: &[f64], changepoints: &[f64]) -> f64 {
    let shift: f64 = deltas
        .iter()
        .zip(changepoints)
        .filter(|(_, s)| t >= **s)
        .map(|(d, &s)| d * (t - s))
        .sum();
    k * t + m + shift
}

/// Ridge penalties for `(k, m, δ..)` at noise level `sigma`.
///
/// The Laplace prior on each δ is approximated by a reweighted Gaussian
/// around the previous iterate `previous_deltas`.
pub fn trend_penalties(sigma: f64, prior_scale: f64, previous_deltas: &[f64]) -> Vec<f64> {
    let variance = sigma * sigma;
    let base = variance / (TREND_PRIOR_SCALE * TREND_PRIOR_SCALE);
    let floor = prior_scale * DELTA_FLOOR;

    let mut penalties = vec![base, base];
    penalties.extend(
        previous_deltas
            .iter()
            .map(|d| variance / (prior_scale * d.abs().max(floor))),
    );
    penalties
}

/// One draw of the trend at `ts` with new changepoints simulated past the
/// end of the history.
///
/// New changepoints arrive as a Poisson process with the historical rate on
/// `[1, max(ts)]`, with Laplace magnitudes scaled by the mean fitted `|δ|`.
pub fn sample_trend<R: Rng + ?Sized>(
    rng: &mut R,
    ts: &[f64],
    k: f64,
    m: f64,
    deltas: &[f64],
    changepoints: &[f64],
) -> Result<Vec<f64>> {
    let t_max = ts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut all_changepoints = changepoints.to_vec();
    let mut all_deltas = deltas.to_vec();

    if t_max > 1.0 && !changepoints.is_empty() {
        let rate = changepoints.len() as f64 * (t_max - 1.0);
        let poisson = Poisson::new(rate)
            .map_err(|e| ForecastError::ForecastingError(format!("Changepoint rate: {}", e)))?;
        let n_changes = poisson.sample(rng) as usize;

        if n_changes > 0 {
            let scale = mean_abs(deltas) + 1e-8;
            let exp = Exp::new(1.0 / scale).map_err(|e| {
                ForecastError::ForecastingError(format!("Changepoint magnitude: {}", e))
            })?;

            let mut new_ts: Vec<f64> = (0..n_changes)
                .map(|_| 1.0 + rng.gen::<f64>() * (t_max - 1.0))
                .collect();
            new_ts.sort_by(f64::total_cmp);
            for t in new_ts {
                all_changepoints.push(t);
                // Laplace(0, scale) as the difference of two exponentials
                all_deltas.push(exp.sample(rng) - exp.sample(rng));
            }
        }
    }

    Ok(ts
        .iter()
        .map(|&t| piecewise_linear(t, k, m, &all_deltas, &all_changepoints))
        .collect())
}
