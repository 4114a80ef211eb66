//! Batch entry points
//!
//! Each run walks the configured metric jobs in order: load the input table,
//! partition it, hand it to the [`ForecastEngine`] and write the results under
//! the output directory.

use crate::cache::{BlobStore, ModelCache};
use crate::config::{MetricJob, PipelineConfig};
use crate::data::{DataLoader, Partitioner, RawRow};
use crate::engine::{ForecastEngine, RunReport};
use crate::error::Result;
use crate::output::{forecast_records, CsvSink, ForecastRecord, RecordSink};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// What one metric job produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub source: String,
    pub output: PathBuf,
    pub records: usize,
    pub failures: usize,
    pub skipped: usize,
}

/// Runs the configured jobs against one model cache
#[derive(Debug)]
pub struct Pipeline<'a, S: BlobStore> {
    config: &'a PipelineConfig,
    cache: &'a ModelCache<S>,
}

impl<'a, S: BlobStore> Pipeline<'a, S> {
    pub fn new(config: &'a PipelineConfig, cache: &'a ModelCache<S>) -> Self {
        Self { config, cache }
    }

    fn engine(&self, job: &MetricJob) -> ForecastEngine<'a, S> {
        ForecastEngine::new(
            job.registry.registry(),
            self.cache,
            self.config.engine_settings(),
        )
    }

    fn partitioner(&self, job: &MetricJob) -> Partitioner {
        Partitioner::new(self.config.partition_policy_for(job))
    }

    fn load(&self, job: &MetricJob) -> Result<Vec<RawRow>> {
        info!(metric = %job.source, input = %job.input.display(), "loading input");
        DataLoader::from_csv(&job.input, &job.columns)
    }

    fn output_path(&self, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.output_dir)?;
        Ok(self.config.output_dir.join(name))
    }

    fn write_report(&self, job: &MetricJob, report: &RunReport, file_name: &str) -> Result<JobSummary> {
        for failure in &report.failures {
            warn!(
                metric = %job.source,
                series_key = %failure.series_key,
                date = ?failure.date,
                error = %failure.error,
                "failure"
            );
        }

        let output = self.output_path(file_name)?;
        let mut sink = CsvSink::create(&output)?;
        sink.write_records(&report.records)?;
        sink.flush()?;

        Ok(JobSummary {
            source: job.source.clone(),
            output,
            records: report.records.len(),
            failures: report.failures.len(),
            skipped: report.skipped.len(),
        })
    }

    /// Refit every series inside the training window and score the days
    /// after it
    pub fn run_retrain(&self) -> Result<Vec<JobSummary>> {
        let window = self.config.training_window()?;
        let mut summaries = Vec::with_capacity(self.config.metrics.len());

        for job in &self.config.metrics {
            let rows = self.load(job)?;
            let data = self.partitioner(job).partition(&rows, &window);
            let report = self.engine(job).retrain(&job.metric(), data)?;
            let file_name = format!("{}_retrain.csv", job.source);
            summaries.push(self.write_report(job, &report, &file_name)?);
        }
        Ok(summaries)
    }

    /// Score `date` with the cached models
    pub fn run_daily(&self, date: NaiveDate) -> Result<Vec<JobSummary>> {
        let mut summaries = Vec::with_capacity(self.config.metrics.len());

        for job in &self.config.metrics {
            let rows = self.load(job)?;
            let data = self.partitioner(job).partition_full(&rows);
            let report = self.engine(job).predict_daily(&job.metric(), data, date)?;
            let file_name = format!("{}_{}.csv", job.source, date.format("%Y%m%d"));
            summaries.push(self.write_report(job, &report, &file_name)?);
        }
        Ok(summaries)
    }

    /// Fit on the actuals up to `asofdate` and publish forecasts through the
    /// configured horizon end. Series without a registry entry are left out.
    pub fn run_forecast(&self, asofdate: NaiveDate) -> Result<Vec<JobSummary>> {
        let horizon_end = self.config.forecast_horizon_end;
        let mut summaries = Vec::with_capacity(self.config.metrics.len());

        for job in &self.config.metrics {
            let registry = job.registry.registry();
            let engine = self.engine(job);
            let data = self.partitioner(job).partition_full(&self.load(job)?);

            let outcomes: Vec<(String, Result<Vec<ForecastRecord>>)> = data
                .full
                .par_iter()
                .filter(|(key, _)| registry.contains(key))
                .map(|(key, series)| {
                    let records = engine
                        .forecast_as_of(key, series, asofdate, horizon_end)
                        .and_then(|forecast| forecast_records(asofdate, key, &forecast));
                    (key.clone(), records)
                })
                .collect();

            let mut records = Vec::new();
            let mut failures = data.rejected.len();
            for (key, outcome) in outcomes {
                match outcome {
                    Ok(rows) => records.extend(rows),
                    Err(err) if err.is_infrastructure() => return Err(err),
                    Err(err) => {
                        warn!(metric = %job.source, series_key = %key, error = %err, "forecast failed");
                        failures += 1;
                    }
                }
            }

            let output =
                self.output_path(&format!("{}_forecast_{}.csv", job.source, asofdate.format("%Y%m%d")))?;
            let mut sink = CsvSink::create(&output)?;
            sink.write_records(&records)?;
            sink.flush()?;
            info!(metric = %job.source, records = records.len(), failures, "forecast written");

            summaries.push(JobSummary {
                source: job.source.clone(),
                output,
                records: records.len(),
                failures,
                skipped: data.skipped.len(),
            });
        }
        Ok(summaries)
    }
}
