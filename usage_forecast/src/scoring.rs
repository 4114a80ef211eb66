//! Deviation scoring of actuals against forecast intervals

use crate::error::{ForecastError, Result};
use crate::models::ForecastRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Scored deviation of one series on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationRecord {
    pub date: NaiveDate,
    pub metric: String,
    /// `(actual - yhat) / actual`
    pub deviation: f64,
    /// Gap relative to the interval half-width on the side of the gap
    pub ci_deviation: f64,
    #[serde(rename = "geography")]
    pub series_key: String,
}

/// Deviation and ci-deviation of `actual` against `row`.
///
/// Fails when the score is undefined: a zero actual with a non-zero gap, or a
/// zero-width interval on the side of the gap.
pub fn score(actual: f64, row: &ForecastRow) -> Result<(f64, f64)> {
    let gap = actual - row.yhat;
    if gap == 0.0 {
        return Ok((0.0, 0.0));
    }
    if actual == 0.0 {
        return Err(ForecastError::ZeroActual {
            date: row.date,
            yhat: row.yhat,
        });
    }

    let width = if gap > 0.0 {
        row.upper_width()
    } else {
        row.lower_width()
    };
    if width <= 0.0 {
        return Err(ForecastError::DegenerateInterval {
            date: row.date,
            gap,
            width,
        });
    }

    Ok((gap / actual, gap / width))
}

/// Scores of one series, with the rows that could not be scored
#[derive(Debug, Default)]
pub struct ScoredSeries {
    pub records: Vec<DeviationRecord>,
    pub failures: Vec<(NaiveDate, ForecastError)>,
}

/// Score forecast rows already inner-joined with their actuals
pub fn score_series(metric: &str, series_key: &str, joined: &[(ForecastRow, f64)]) -> ScoredSeries {
    let mut scored = ScoredSeries::default();
    for (row, actual) in joined {
        match score(*actual, row) {
            Ok((deviation, ci_deviation)) => scored.records.push(DeviationRecord {
                date: row.date,
                metric: metric.to_string(),
                deviation,
                ci_deviation,
                series_key: series_key.to_string(),
            }),
            Err(err) => scored.failures.push((row.date, err)),
        }
    }
    scored
}
