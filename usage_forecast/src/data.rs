//! Raw usage tables and per-key time series
//!
//! The partitioner turns one wide table of `(date, value, series_key,
//! support_count)` rows into independent, date-sorted series, applying the
//! minimum-aggregation floor and the minimum-history gate.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use polars::prelude::{CsvReader, DataFrame, DataType, SerReader, Series as PolarsSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// Minimum number of contributing samples behind an aggregate row
pub const DEFAULT_MIN_SUPPORT: u64 = 5000;

/// Minimum number of daily observations (about two years) for a series to be modeled
pub const DEFAULT_MIN_HISTORY: usize = 600;

/// One row of the raw input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub date: NaiveDate,
    pub value: f64,
    pub series_key: String,
    pub support_count: u64,
}

impl RawRow {
    pub fn new(date: NaiveDate, value: f64, series_key: &str, support_count: u64) -> Self {
        Self {
            date,
            value,
            series_key: series_key.to_string(),
            support_count,
        }
    }
}

/// A single dated value of a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// A date-sorted series with unique dates
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    key: String,
    observations: Vec<Observation>,
}

impl Series {
    /// Build a series from observations in any order.
    ///
    /// Fails with `DataIntegrity` on duplicate dates or non-finite values.
    pub fn from_observations(key: &str, mut observations: Vec<Observation>) -> Result<Self> {
        if let Some(bad) = observations.iter().find(|o| !o.value.is_finite()) {
            return Err(ForecastError::DataIntegrity {
                series_key: key.to_string(),
                message: format!("non-finite value {} on {}", bad.value, bad.date),
            });
        }

        observations.sort_by_key(|o| o.date);

        if let Some(pair) = observations.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(ForecastError::DataIntegrity {
                series_key: key.to_string(),
                message: format!("duplicate date {}", pair[0].date),
            });
        }

        Ok(Self {
            key: key.to_string(),
            observations,
        })
    }

    /// Build a series from parallel date and value vectors (for testing)
    pub fn new(key: &str, dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }

        let observations = dates
            .into_iter()
            .zip(values)
            .map(|(date, value)| Observation { date, value })
            .collect();

        Self::from_observations(key, observations)
    }

    /// Get the series key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the observations, sorted by date
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Get the length of the series
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Value observed on `date`, if any
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.observations
            .binary_search_by_key(&date, |o| o.date)
            .ok()
            .map(|i| self.observations[i].value)
    }

    /// Inclusive date slice `[start, end]`
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> Self {
        self.filter(|o| o.date >= start && o.date <= end)
    }

    /// Keep only observations matching `predicate`
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Observation) -> bool,
    {
        Self {
            key: self.key.clone(),
            observations: self
                .observations
                .iter()
                .copied()
                .filter(|o| predicate(o))
                .collect(),
        }
    }
}

/// Column names of the raw input table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableColumns {
    pub date: String,
    pub value: String,
    pub series_key: String,
    pub support_count: String,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            value: "value".to_string(),
            series_key: "series_key".to_string(),
            support_count: "support_count".to_string(),
        }
    }
}

/// Data loader for raw usage tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load raw rows from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, columns: &TableColumns) -> Result<Vec<RawRow>> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(&df, columns)
    }

    /// Convert an existing DataFrame into raw rows.
    ///
    /// Null values become NaN so the partitioner can reject the owning series;
    /// rows with a null date, key or an unparseable date reject the whole table.
    /// A table without the support column loads with a support count of zero,
    /// which only passes a zero support floor.
    pub fn from_dataframe(df: &DataFrame, columns: &TableColumns) -> Result<Vec<RawRow>> {
        let dates = Self::string_column(df, &columns.date)?;
        let keys = Self::string_column(df, &columns.series_key)?;
        let values = Self::f64_column(df, &columns.value)?;
        let support = if df.column(&columns.support_count).is_ok() {
            Self::f64_column(df, &columns.support_count)?
        } else {
            debug!(column = %columns.support_count, "no support column");
            vec![None; df.height()]
        };

        let mut rows = Vec::with_capacity(df.height());
        for (i, (((date, key), value), support)) in dates
            .into_iter()
            .zip(keys)
            .zip(values)
            .zip(support)
            .enumerate()
        {
            let date = date
                .as_deref()
                .ok_or_else(|| ForecastError::DataError(format!("Row {} has no date", i)))
                .and_then(parse_date)?;
            let key = key
                .ok_or_else(|| ForecastError::DataError(format!("Row {} has no series key", i)))?;

            rows.push(RawRow {
                date,
                value: value.unwrap_or(f64::NAN),
                series_key: key,
                support_count: support.filter(|s| *s > 0.0).map(|s| s as u64).unwrap_or(0),
            });
        }

        debug!(rows = rows.len(), "loaded raw usage rows");
        Ok(rows)
    }

    fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a PolarsSeries> {
        df.column(name).map_err(|e| {
            ForecastError::DataError(format!("Column '{}' not found: {}", name, e))
        })
    }

    fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
        let col = Self::column(df, name)?.cast(&DataType::Utf8)?;
        Ok(col
            .utf8()?
            .into_iter()
            .map(|v| v.map(|s| s.trim().to_string()))
            .collect())
    }

    fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
        let col = Self::column(df, name)?.cast(&DataType::Float64)?;
        Ok(col.f64()?.into_iter().collect())
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    // Accept both plain dates and timestamps with a date prefix
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| ForecastError::DataError(format!("Invalid date '{}': {}", s, e)))
}

/// Inclusive training interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TrainingWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ForecastError::InvalidParameter(format!(
                "Training window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Volume floors applied while partitioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionPolicy {
    /// Rows with fewer contributing samples are suppressed
    pub min_support: u64,
    /// Series with fewer qualifying rows are excluded
    pub min_history: usize,
}

impl Default for PartitionPolicy {
    fn default() -> Self {
        Self {
            min_support: DEFAULT_MIN_SUPPORT,
            min_history: DEFAULT_MIN_HISTORY,
        }
    }
}

/// A key that did not make it into the partition, and why
#[derive(Debug)]
pub struct Rejection {
    pub series_key: String,
    pub error: ForecastError,
}

/// Output of the partitioner
#[derive(Debug, Default)]
pub struct PartitionedData {
    /// Every eligible series with all its qualifying rows
    pub full: BTreeMap<String, Series>,
    /// Training slices of series with enough history inside the window
    pub training: BTreeMap<String, Series>,
    /// Series rejected for data integrity problems
    pub rejected: Vec<Rejection>,
    /// Series dropped for insufficient history
    pub skipped: Vec<Rejection>,
}

/// Splits raw tables into per-key series
#[derive(Debug, Clone, Copy, Default)]
pub struct Partitioner {
    policy: PartitionPolicy,
}

impl Partitioner {
    pub fn new(policy: PartitionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PartitionPolicy {
        &self.policy
    }

    /// Partition into full series only (daily scoring path)
    pub fn partition_full(&self, rows: &[RawRow]) -> PartitionedData {
        self.partition_inner(rows, None)
    }

    /// Partition into full series and training slices (retrain path)
    pub fn partition(&self, rows: &[RawRow], window: &TrainingWindow) -> PartitionedData {
        self.partition_inner(rows, Some(window))
    }

    fn partition_inner(&self, rows: &[RawRow], window: Option<&TrainingWindow>) -> PartitionedData {
        let mut grouped: BTreeMap<&str, Vec<Observation>> = BTreeMap::new();
        let mut suppressed = 0usize;

        // The aggregation floor is applied before any volume check
        for row in rows {
            if row.support_count < self.policy.min_support {
                suppressed += 1;
                continue;
            }
            grouped
                .entry(row.series_key.as_str())
                .or_default()
                .push(Observation {
                    date: row.date,
                    value: row.value,
                });
        }
        debug!(suppressed, keys = grouped.len(), "applied minimum support floor");

        let mut out = PartitionedData::default();
        for (key, observations) in grouped {
            if observations.len() < self.policy.min_history {
                debug!(series_key = key, rows = observations.len(), "below minimum history");
                out.skipped.push(Rejection {
                    series_key: key.to_string(),
                    error: ForecastError::InsufficientData {
                        needed: self.policy.min_history,
                        got: observations.len(),
                    },
                });
                continue;
            }

            let series = match Series::from_observations(key, observations) {
                Ok(series) => series,
                Err(error) => {
                    warn!(series_key = key, %error, "rejecting series");
                    out.rejected.push(Rejection {
                        series_key: key.to_string(),
                        error,
                    });
                    continue;
                }
            };

            if let Some(window) = window {
                let training = series.slice_dates(window.start, window.end);
                if training.len() < self.policy.min_history {
                    debug!(
                        series_key = key,
                        rows = training.len(),
                        "below minimum history inside the training window"
                    );
                    out.skipped.push(Rejection {
                        series_key: key.to_string(),
                        error: ForecastError::InsufficientData {
                            needed: self.policy.min_history,
                            got: training.len(),
                        },
                    });
                } else {
                    out.training.insert(key.to_string(), training);
                }
            }

            out.full.insert(key.to_string(), series);
        }

        out
    }
}
