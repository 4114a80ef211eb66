use chrono::{Days, NaiveDate};
use std::f64::consts::PI;
use usage_forecast::cache::{BlobStore, MemoryBlobStore, ModelCache};
use usage_forecast::data::{PartitionPolicy, PartitionedData, Partitioner, RawRow, TrainingWindow};
use usage_forecast::engine::{EngineSettings, ForecastEngine, Metric};
use usage_forecast::error::Result;
use usage_forecast::registry::{DateRange, ModelConfig, ModelRegistry};
use usage_forecast::ForecastError;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn fast_config() -> ModelConfig {
    ModelConfig {
        n_changepoints: 5,
        ..ModelConfig::default()
    }
}

fn settings() -> EngineSettings {
    EngineSettings {
        uncertainty_samples: 60,
        seed: 7,
        ..EngineSettings::default()
    }
}

fn metric() -> Metric {
    Metric::new("dau_country", "desktop_dau")
}

// Trend plus weekly cycle with a little deterministic wobble
fn usage_rows(key: &str, start: NaiveDate, days: usize, level: f64) -> Vec<RawRow> {
    (0..days)
        .map(|i| {
            let t = i as f64;
            let value = level + 0.5 * t + 40.0 * (2.0 * PI * t / 7.0).sin() + ((i * 7919) % 13) as f64;
            RawRow::new(start + Days::new(i as u64), value, key, 20_000)
        })
        .collect()
}

fn partition(rows: &[RawRow], training_end: &str) -> PartitionedData {
    let window = TrainingWindow::new(d("2017-01-01"), d(training_end)).unwrap();
    Partitioner::new(PartitionPolicy::default()).partition(rows, &window)
}

#[derive(Debug)]
struct FailingStore;

impl BlobStore for FailingStore {
    fn load(&self, _metric: &str, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(ForecastError::CacheStore("store offline".to_string()))
    }

    fn replace_all(&self, _metric: &str, _blobs: Vec<(String, Vec<u8>)>) -> Result<()> {
        Err(ForecastError::CacheStore("store offline".to_string()))
    }
}

#[test]
fn test_retrain_scores_the_horizon_and_caches_models() {
    let registry = ModelRegistry::new()
        .with_entry("DE", fast_config())
        .with_entry("US", fast_config());
    let cache = ModelCache::new(MemoryBlobStore::new());
    let engine = ForecastEngine::new(&registry, &cache, settings());

    let mut rows = usage_rows("US", d("2017-01-01"), 760, 5000.0);
    rows.extend(usage_rows("DE", d("2017-01-01"), 760, 2000.0));
    let report = engine.retrain(&metric(), partition(&rows, "2018-12-31")).unwrap();

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.records.len(), 60);
    assert!(report.skipped.is_empty());
    assert_eq!(cache.store().keys("dau_country"), vec!["DE", "US"]);

    assert_eq!(report.records[0].series_key, "DE");
    assert_eq!(report.records[0].date, d("2019-01-01"));
    assert!(report.records.iter().all(|r| r.metric == "desktop_dau"));
    // The synthetic series is smooth, so deviations stay small
    assert!(report.records.iter().all(|r| r.deviation.abs() < 0.2));
    assert!(report.records.iter().all(|r| r.ci_deviation.is_finite()));
}

#[test]
fn test_short_horizon_is_skipped_but_cached() {
    let registry = ModelRegistry::new().with_entry("US", fast_config());
    let cache = ModelCache::new(MemoryBlobStore::new());
    let engine = ForecastEngine::new(&registry, &cache, settings());

    // Five days of actuals after the training window
    let rows = usage_rows("US", d("2017-01-01"), 735, 5000.0);
    let report = engine.retrain(&metric(), partition(&rows, "2018-12-31")).unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(
        report.skipped[0].reason,
        ForecastError::InsufficientData { needed: 10, got: 5 }
    ));
    assert_eq!(cache.store().keys("dau_country"), vec!["US"]);
}

#[test]
fn test_unknown_series_is_a_configuration_failure() {
    let registry = ModelRegistry::new().with_entry("US", fast_config());
    let cache = ModelCache::new(MemoryBlobStore::new());
    let engine = ForecastEngine::new(&registry, &cache, settings());

    let mut rows = usage_rows("US", d("2017-01-01"), 745, 5000.0);
    rows.extend(usage_rows("Atlantis", d("2017-01-01"), 745, 300.0));
    let report = engine.retrain(&metric(), partition(&rows, "2018-12-31")).unwrap();

    let failure = report
        .failures
        .iter()
        .find(|f| f.series_key == "Atlantis")
        .unwrap();
    assert!(failure.date.is_none());
    assert!(matches!(failure.error, ForecastError::Configuration(ref k) if k == "Atlantis"));
    assert!(report.records.iter().all(|r| r.series_key == "US"));
    assert_eq!(cache.store().keys("dau_country"), vec!["US"]);
}

#[test]
fn test_predict_without_cached_model_fails_per_series() {
    let registry = ModelRegistry::new().with_entry("US", fast_config());
    let cache = ModelCache::new(MemoryBlobStore::new());
    let engine = ForecastEngine::new(&registry, &cache, settings());

    let rows = usage_rows("US", d("2017-01-01"), 745, 5000.0);
    let data = Partitioner::new(PartitionPolicy::default()).partition_full(&rows);
    let report = engine.predict_daily(&metric(), data, d("2019-01-10")).unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        ForecastError::ModelNotFound { ref series_key, .. } if series_key == "US"
    ));
}

#[test]
fn test_predict_daily_uses_cached_models() {
    let registry = ModelRegistry::new().with_entry("US", fast_config());
    let cache = ModelCache::new(MemoryBlobStore::new());
    let engine = ForecastEngine::new(&registry, &cache, settings());

    let rows = usage_rows("US", d("2017-01-01"), 760, 5000.0);
    engine.retrain(&metric(), partition(&rows, "2018-12-31")).unwrap();

    let data = Partitioner::new(PartitionPolicy::default()).partition_full(&rows);
    let report = engine.predict_daily(&metric(), data, d("2019-01-20")).unwrap();

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!(record.date, d("2019-01-20"));
    assert_eq!(record.series_key, "US");
    assert!(record.ci_deviation.is_finite());
}

#[test]
fn test_excluded_ranges_leave_fit_input_only() {
    let config = fast_config()
        .with_valid_start(d("2017-02-01"))
        .excluding(DateRange::new(d("2018-03-01"), d("2018-03-31")).unwrap());
    let registry = ModelRegistry::new().with_entry("US", config);
    let cache = ModelCache::new(MemoryBlobStore::new());
    let engine = ForecastEngine::new(&registry, &cache, settings());

    let rows = usage_rows("US", d("2017-01-01"), 760, 5000.0);
    let data = partition(&rows, "2018-12-31");
    let training = &data.training["US"];
    let input = engine.fit_input("US", training).unwrap();

    assert_eq!(input.first_date(), Some(d("2017-02-01")));
    assert_eq!(input.value_on(d("2018-03-15")), None);
    assert_eq!(input.len(), training.len() - 31 - 31);
    assert!(data.full["US"].value_on(d("2018-03-15")).is_some());
}

#[test]
fn test_forecast_as_of_covers_the_following_days() {
    let registry = ModelRegistry::new().with_entry("US", fast_config());
    let cache = ModelCache::new(MemoryBlobStore::new());
    let engine = ForecastEngine::new(&registry, &cache, settings());

    let rows = usage_rows("US", d("2017-01-01"), 760, 5000.0);
    let data = Partitioner::new(PartitionPolicy::default()).partition_full(&rows);
    let forecast = engine
        .forecast_as_of("US", &data.full["US"], d("2018-12-31"), d("2019-03-31"))
        .unwrap();

    assert_eq!(forecast.len(), 90);
    assert_eq!(forecast.dates()[0], d("2019-01-01"));
    assert!(forecast.rows().iter().all(|r| r.quantiles.is_some()));
}

#[test]
fn test_store_failure_aborts_the_run() {
    let registry = ModelRegistry::new().with_entry("US", fast_config());
    let cache = ModelCache::new(FailingStore);
    let engine = ForecastEngine::new(&registry, &cache, settings());

    let rows = usage_rows("US", d("2017-01-01"), 760, 5000.0);
    let result = engine.retrain(&metric(), partition(&rows, "2018-12-31"));
    assert!(matches!(result, Err(ForecastError::CacheStore(_))));

    let data = Partitioner::new(PartitionPolicy::default()).partition_full(&rows);
    let result = engine.predict_daily(&metric(), data, d("2019-01-10"));
    assert!(matches!(result, Err(ForecastError::CacheStore(_))));
}
