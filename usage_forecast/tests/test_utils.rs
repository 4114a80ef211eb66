use chrono::NaiveDate;
use usage_forecast::data::Series;
use usage_forecast::utils::{date_range, future_dates, parse_date, split_series};
use usage_forecast::ForecastError;

fn d(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

#[test]
fn test_parse_date() {
    assert_eq!(parse_date(" 2020-02-29 ").unwrap(), NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());
    assert!(matches!(
        parse_date("2019-02-29"),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(parse_date("yesterday").is_err());
}

#[test]
fn test_date_range_crosses_years() {
    let dates = date_range(d("2019-12-30"), d("2020-01-02"));
    assert_eq!(dates.len(), 4);
    assert_eq!(dates[2], d("2020-01-01"));
    assert_eq!(date_range(d("2020-01-01"), d("2020-01-01")), vec![d("2020-01-01")]);
}

#[test]
fn test_future_dates() {
    assert!(future_dates(d("2020-01-01"), 0).is_empty());
    let dates = future_dates(d("2020-02-27"), 3);
    assert_eq!(dates, vec![d("2020-02-28"), d("2020-02-29"), d("2020-03-01")]);
}

#[test]
fn test_split_series_with_gaps() {
    let dates = vec![d("2020-01-01"), d("2020-01-03"), d("2020-01-06"), d("2020-01-09")];
    let series = Series::new("US", dates, vec![1.0, 2.0, 3.0, 4.0]).unwrap();

    let split = split_series(
        &series,
        d("2020-01-01"),
        d("2020-01-04"),
        d("2020-01-08"),
        d("2020-01-31"),
    )
    .unwrap();

    assert_eq!(split.training.values(), vec![1.0, 2.0]);
    assert_eq!(split.holdout.values(), vec![3.0]);
    assert_eq!(split.test.values(), vec![4.0]);
    assert_eq!(split.all.key(), "US");
}
