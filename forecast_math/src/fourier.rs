//! Fourier series terms for periodic seasonality

use chrono::NaiveDate;
use std::f64::consts::PI;

/// Period of the yearly seasonality in days
pub const YEARLY_PERIOD: f64 = 365.25;

/// Period of the weekly seasonality in days
pub const WEEKLY_PERIOD: f64 = 7.0;

/// Days elapsed since 1970-01-01.
///
/// Seasonal terms are evaluated on this absolute clock, so the same calendar
/// day always maps to the same phase regardless of where a series starts.
pub fn epoch_days(date: NaiveDate) -> f64 {
    // NaiveDate::default() is the Unix epoch
    (date - NaiveDate::default()).num_days() as f64
}

/// Fourier terms for one time point.
///
/// Returns `2 * order` values laid out as
/// `[sin(2π·1·t/P), cos(2π·1·t/P), sin(2π·2·t/P), cos(2π·2·t/P), ...]`.
pub fn fourier_terms(t: f64, period: f64, order: usize) -> Vec<f64> {
    let mut terms = Vec::with_capacity(2 * order);
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * t / period;
        terms.push(angle.sin());
        terms.push(angle.cos());
    }
    terms
}
