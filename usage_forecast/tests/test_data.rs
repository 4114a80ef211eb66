use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;
use usage_forecast::data::{
    DataLoader, PartitionPolicy, Partitioner, RawRow, TableColumns, TrainingWindow,
};
use usage_forecast::ForecastError;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

// Daily rows for `key` starting at `start`, all above the support floor
fn daily_rows(key: &str, start: NaiveDate, days: usize) -> Vec<RawRow> {
    (0..days)
        .map(|i| RawRow::new(start + Days::new(i as u64), 100.0 + i as f64, key, 10_000))
        .collect()
}

#[test]
fn test_data_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,geography,value,support_count").unwrap();
    writeln!(file, "2020-01-01,DE,1200.5,9000").unwrap();
    writeln!(file, "2020-01-02,DE,1190.0,8800").unwrap();
    writeln!(file, "2020-01-01,FR,800.0,4000").unwrap();

    let columns = TableColumns {
        series_key: "geography".to_string(),
        ..TableColumns::default()
    };
    let rows = DataLoader::from_csv(file.path(), &columns).unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], RawRow::new(d("2020-01-01"), 1200.5, "DE", 9000));
    assert_eq!(rows[2].series_key, "FR");
    assert_eq!(rows[2].support_count, 4000);
}

#[test]
fn test_table_without_support_column() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,product,value").unwrap();
    writeln!(file, "2019-07-03,Fenix,410.0").unwrap();
    writeln!(file, "2019-07-04,Fenix,415.5").unwrap();

    let columns = TableColumns {
        series_key: "product".to_string(),
        ..TableColumns::default()
    };
    let rows = DataLoader::from_csv(file.path(), &columns).unwrap();
    assert_eq!(rows[1], RawRow::new(d("2019-07-04"), 415.5, "Fenix", 0));

    let unfloored = PartitionPolicy {
        min_support: 0,
        min_history: 2,
    };
    let data = Partitioner::new(unfloored).partition_full(&rows);
    assert_eq!(data.full["Fenix"].len(), 2);
    assert!(Partitioner::new(PartitionPolicy::default())
        .partition_full(&rows)
        .full
        .is_empty());
}

#[test]
fn test_data_loader_error_handling() {
    let result = DataLoader::from_csv("nonexistent_file.csv", &TableColumns::default());
    assert!(result.is_err());

    // Missing the configured columns
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "day,amount").unwrap();
    writeln!(file, "2020-01-01,1.0").unwrap();
    let result = DataLoader::from_csv(file.path(), &TableColumns::default());
    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[test]
fn test_min_history_boundary() {
    let start = d("2018-01-01");
    let mut rows = daily_rows("long", start, 600);
    rows.extend(daily_rows("short", start, 599));

    let data = Partitioner::new(PartitionPolicy::default()).partition_full(&rows);

    assert!(data.full.contains_key("long"));
    assert!(!data.full.contains_key("short"));
    assert_eq!(data.skipped.len(), 1);
    assert_eq!(data.skipped[0].series_key, "short");
    assert!(matches!(
        data.skipped[0].error,
        ForecastError::InsufficientData { needed: 600, got: 599 }
    ));
}

#[test]
fn test_support_floor_applies_before_history() {
    let start = d("2018-01-01");
    let mut rows = daily_rows("US", start, 605);
    // Ten rows fall below the floor, leaving 595 qualifying rows
    for row in rows.iter_mut().take(10) {
        row.support_count = 4999;
    }

    let data = Partitioner::new(PartitionPolicy::default()).partition_full(&rows);
    assert!(data.full.is_empty());
    assert!(matches!(
        data.skipped[0].error,
        ForecastError::InsufficientData { got: 595, .. }
    ));
}

#[test]
fn test_training_window_slices() {
    let start = d("2018-01-01");
    let rows = daily_rows("US", start, 800);
    let policy = PartitionPolicy {
        min_support: 5000,
        min_history: 100,
    };
    let window = TrainingWindow::new(d("2018-01-01"), d("2019-06-30")).unwrap();

    let data = Partitioner::new(policy).partition(&rows, &window);
    let training = &data.training["US"];
    let full = &data.full["US"];

    assert_eq!(full.len(), 800);
    assert_eq!(training.first_date(), Some(d("2018-01-01")));
    assert_eq!(training.last_date(), Some(d("2019-06-30")));
    assert!(training.len() < full.len());
}

#[test]
fn test_short_training_slice_is_skipped_but_full_kept() {
    let rows = daily_rows("US", d("2018-01-01"), 700);
    let window = TrainingWindow::new(d("2018-01-01"), d("2018-12-31")).unwrap();

    let data = Partitioner::new(PartitionPolicy::default()).partition(&rows, &window);
    assert!(data.full.contains_key("US"));
    assert!(!data.training.contains_key("US"));
    assert_eq!(data.skipped.len(), 1);
}

#[test]
fn test_duplicate_dates_reject_only_that_series() {
    let start = d("2018-01-01");
    let mut rows = daily_rows("bad", start, 610);
    rows.push(RawRow::new(start, 1.0, "bad", 10_000));
    rows.extend(daily_rows("good", start, 610));

    let data = Partitioner::new(PartitionPolicy::default()).partition_full(&rows);
    assert!(data.full.contains_key("good"));
    assert_eq!(data.rejected.len(), 1);
    assert_eq!(data.rejected[0].series_key, "bad");
    assert!(matches!(
        data.rejected[0].error,
        ForecastError::DataIntegrity { .. }
    ));
}

proptest! {
    #[test]
    fn prop_partitioned_series_respect_the_floors(
        supports in proptest::collection::vec(0u64..10_000, 1..200),
        min_history in 1usize..50,
    ) {
        let start = d("2019-01-01");
        let rows: Vec<RawRow> = supports
            .iter()
            .enumerate()
            .map(|(i, s)| RawRow::new(start + Days::new(i as u64), i as f64, "k", *s))
            .collect();
        let policy = PartitionPolicy { min_support: 5000, min_history };

        let data = Partitioner::new(policy).partition_full(&rows);
        let qualifying = supports.iter().filter(|s| **s >= 5000).count();

        match data.full.get("k") {
            Some(series) => {
                prop_assert!(qualifying >= min_history);
                prop_assert_eq!(series.len(), qualifying);
                for obs in series.observations() {
                    let i = (obs.date - start).num_days() as usize;
                    prop_assert!(supports[i] >= 5000);
                }
            }
            None => prop_assert!(qualifying < min_history),
        }
    }
}
