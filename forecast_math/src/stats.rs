//! Sample statistics for predictive distributions

use crate::{MathError, Result};
use statrs::statistics::{Data, OrderStatistics};

/// Quantile levels published alongside forecasts (p10 .. p90)
pub const DECILES: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Sample quantile at `tau`, ignoring NaN draws.
pub fn quantile(samples: &[f64], tau: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&tau) {
        return Err(MathError::InvalidInput(format!(
            "Quantile level must be within [0, 1], got {}",
            tau
        )));
    }

    let finite: Vec<f64> = samples.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return Err(MathError::InsufficientData(
            "No samples to compute a quantile from".to_string(),
        ));
    }

    let mut data = Data::new(finite);
    Ok(data.quantile(tau))
}

/// Several quantiles of the same sample, computed on one sorted copy.
pub fn quantiles(samples: &[f64], taus: &[f64]) -> Result<Vec<f64>> {
    if let Some(tau) = taus.iter().find(|t| !(0.0..=1.0).contains(*t)) {
        return Err(MathError::InvalidInput(format!(
            "Quantile level must be within [0, 1], got {}",
            tau
        )));
    }

    let finite: Vec<f64> = samples.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return Err(MathError::InsufficientData(
            "No samples to compute a quantile from".to_string(),
        ));
    }

    let mut data = Data::new(finite);
    Ok(taus.iter().map(|&tau| data.quantile(tau)).collect())
}

/// Mean of absolute values. Zero for an empty slice.
pub fn mean_abs(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
}

/// Root mean square. Zero for an empty slice.
pub fn root_mean_square(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn median_of_odd_sample() {
        let q = quantile(&[5.0, 1.0, 3.0, 2.0, 4.0], 0.5).unwrap();
        assert_relative_eq!(q, 3.0);
    }

    #[test]
    fn quantiles_are_monotone() {
        let samples: Vec<f64> = (0..1000).map(|i| ((i * 7919) % 1000) as f64).collect();
        let qs = quantiles(&samples, &DECILES).unwrap();
        assert_eq!(qs.len(), 9);
        for w in qs.windows(2) {
            assert!(w[0] <= w[1]);
        }
        assert!(qs[0] > 50.0 && qs[0] < 150.0);
    }

    #[test]
    fn nan_draws_are_ignored() {
        let q = quantile(&[f64::NAN, 2.0, f64::NAN, 2.0], 0.9).unwrap();
        assert_relative_eq!(q, 2.0);
    }

    #[test]
    fn invalid_requests() {
        assert!(quantile(&[], 0.5).is_err());
        assert!(quantile(&[1.0], 1.5).is_err());
        assert!(quantiles(&[1.0], &[0.5, -0.1]).is_err());
    }

    #[test]
    fn absolute_summaries() {
        assert_relative_eq!(mean_abs(&[-1.0, 3.0]), 2.0);
        assert_relative_eq!(root_mean_square(&[3.0, 4.0]), (12.5f64).sqrt());
        assert_relative_eq!(mean_abs(&[]), 0.0);
    }
}
