//! Utility functions for the usage_forecast crate

use crate::data::Series;
use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};

/// Every date of the inclusive range `[start, end]`, empty if `start > end`
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// The `horizon` days following `last`
pub fn future_dates(last: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as u64)
        .filter_map(|i| last.checked_add_days(Days::new(i)))
        .collect()
}

/// Parse an ISO 8601 calendar date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| ForecastError::InvalidParameter(format!("Invalid date '{}': {}", s, e)))
}

/// A series cut into consecutive evaluation periods
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSplit {
    /// `[first_train, first_holdout)`
    pub training: Series,
    /// `[first_holdout, first_test)`
    pub holdout: Series,
    /// `[first_test, last_test]`
    pub test: Series,
    pub all: Series,
}

/// Split a series into training, holdout and test periods by date boundaries
pub fn split_series(
    series: &Series,
    first_train: NaiveDate,
    first_holdout: NaiveDate,
    first_test: NaiveDate,
    last_test: NaiveDate,
) -> Result<SeriesSplit> {
    if !(first_train < first_holdout && first_holdout < first_test && first_test <= last_test) {
        return Err(ForecastError::InvalidParameter(format!(
            "Split boundaries must be increasing: {} < {} < {} <= {}",
            first_train, first_holdout, first_test, last_test
        )));
    }

    Ok(SeriesSplit {
        training: series.filter(|o| o.date >= first_train && o.date < first_holdout),
        holdout: series.filter(|o| o.date >= first_holdout && o.date < first_test),
        test: series.filter(|o| o.date >= first_test && o.date <= last_test),
        all: series.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn ranges_are_inclusive() {
        assert_eq!(date_range(d("2020-02-28"), d("2020-03-01")).len(), 3);
        assert!(date_range(d("2020-03-01"), d("2020-02-28")).is_empty());
        assert_eq!(
            future_dates(d("2019-12-30"), 3),
            vec![d("2019-12-31"), d("2020-01-01"), d("2020-01-02")]
        );
    }

    #[test]
    fn split_periods_do_not_overlap() {
        let dates = date_range(d("2020-01-01"), d("2020-01-10"));
        let values = (0..dates.len()).map(|i| i as f64).collect();
        let series = Series::new("k", dates, values).unwrap();

        let split = split_series(
            &series,
            d("2020-01-01"),
            d("2020-01-05"),
            d("2020-01-08"),
            d("2020-01-09"),
        )
        .unwrap();
        assert_eq!(split.training.len(), 4);
        assert_eq!(split.holdout.len(), 3);
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.all.len(), 10);
    }

    #[test]
    fn split_rejects_unordered_boundaries() {
        let series = Series::new("k", vec![d("2020-01-01")], vec![1.0]).unwrap();
        assert!(split_series(
            &series,
            d("2020-01-05"),
            d("2020-01-01"),
            d("2020-01-08"),
            d("2020-01-09")
        )
        .is_err());
    }
}
