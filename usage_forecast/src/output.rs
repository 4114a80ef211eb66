//! Published output rows and writers

use crate::error::{ForecastError, Result};
use crate::models::ForecastResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One forecast row of a forecast publishing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Latest date of actuals used to fit the model
    pub asofdate: NaiveDate,
    /// Series key of the forecast target
    pub datasource: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub low90: f64,
    pub high90: f64,
    pub p10: f64,
    pub p20: f64,
    pub p30: f64,
    pub p40: f64,
    pub p50: f64,
    pub p60: f64,
    pub p70: f64,
    pub p80: f64,
    pub p90: f64,
}

/// Flatten a forecast into publishing rows. Requires sampled quantiles.
pub fn forecast_records(
    asofdate: NaiveDate,
    datasource: &str,
    forecast: &ForecastResult,
) -> Result<Vec<ForecastRecord>> {
    forecast
        .rows()
        .iter()
        .map(|row| {
            let q = row.quantiles.ok_or_else(|| {
                ForecastError::ForecastingError(format!(
                    "Forecast for {} on {} has no quantiles",
                    datasource, row.date
                ))
            })?;
            Ok(ForecastRecord {
                asofdate,
                datasource: datasource.to_string(),
                date: row.date,
                kind: "forecast".to_string(),
                value: row.yhat,
                low90: row.yhat_lower,
                high90: row.yhat_upper,
                p10: q[0],
                p20: q[1],
                p30: q[2],
                p40: q[3],
                p50: q[4],
                p60: q[5],
                p70: q[6],
                p80: q[7],
                p90: q[8],
            })
        })
        .collect()
}

/// Destination for output rows
pub trait RecordSink {
    fn write_records<T: Serialize>(&mut self, records: &[T]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

/// CSV writer with a header row taken from the record fields
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| ForecastError::IoError(e.into_error()))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_records<T: Serialize>(&mut self, records: &[T]) -> Result<()> {
        for record in records {
            self.writer.serialize(record)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write_records<T: Serialize>(&mut self, records: &[T]) -> Result<()> {
        for record in records {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
