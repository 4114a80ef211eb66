//! Per-series model configuration
//!
//! A registry maps a series key to an immutable [`ModelConfig`]. Lookups of an
//! unknown key fail with [`ForecastError::Configuration`] unless the registry
//! was built with an explicit default entry.

use crate::data::{Observation, Series};
use crate::error::{ForecastError, Result};
use crate::holidays::{HolidayCalendar, GEO_EVENTS};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How seasonal and holiday components combine with the trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    #[default]
    Additive,
    Multiplicative,
}

/// Fourier order of a seasonal component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityStrength {
    /// Enabled with the default order once the history is long enough
    #[default]
    Auto,
    Fourier(usize),
    Disabled,
}

impl SeasonalityStrength {
    /// Fourier order to fit, given the span of the training history in days.
    /// Zero means the component is not fitted.
    pub fn resolve(&self, default_order: usize, span_days: i64, min_span_days: i64) -> usize {
        match *self {
            SeasonalityStrength::Auto if span_days >= min_span_days => default_order,
            SeasonalityStrength::Auto => 0,
            SeasonalityStrength::Fourier(order) => order,
            SeasonalityStrength::Disabled => 0,
        }
    }
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ForecastError::InvalidParameter(format!(
                "Date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Hyperparameters and data filters of one series model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub seasonality_mode: SeasonalityMode,
    pub yearly_seasonality: SeasonalityStrength,
    pub weekly_seasonality: SeasonalityStrength,
    pub n_changepoints: usize,
    /// Share of the history over which changepoints are placed
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub holidays_prior_scale: f64,
    pub holidays: Vec<HolidayCalendar>,
    /// Observations before this date are not used for fitting
    pub valid_start_date: Option<NaiveDate>,
    /// Anomalous periods left out of fitting but still scored
    pub excluded_ranges: Vec<DateRange>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seasonality_mode: SeasonalityMode::Additive,
            yearly_seasonality: SeasonalityStrength::Auto,
            weekly_seasonality: SeasonalityStrength::Auto,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            holidays_prior_scale: 10.0,
            holidays: Vec::new(),
            valid_start_date: None,
            excluded_ranges: Vec::new(),
        }
    }
}

impl ModelConfig {
    pub fn multiplicative(mut self) -> Self {
        self.seasonality_mode = SeasonalityMode::Multiplicative;
        self
    }

    pub fn with_yearly(mut self, strength: SeasonalityStrength) -> Self {
        self.yearly_seasonality = strength;
        self
    }

    pub fn with_weekly(mut self, strength: SeasonalityStrength) -> Self {
        self.weekly_seasonality = strength;
        self
    }

    pub fn with_changepoint_range(mut self, range: f64) -> Self {
        self.changepoint_range = range;
        self
    }

    pub fn with_changepoint_prior_scale(mut self, scale: f64) -> Self {
        self.changepoint_prior_scale = scale;
        self
    }

    pub fn with_seasonality_prior_scale(mut self, scale: f64) -> Self {
        self.seasonality_prior_scale = scale;
        self
    }

    pub fn with_holidays(mut self, calendars: &[HolidayCalendar]) -> Self {
        self.holidays = calendars.to_vec();
        self
    }

    pub fn with_valid_start(mut self, date: NaiveDate) -> Self {
        self.valid_start_date = Some(date);
        self
    }

    pub fn excluding(mut self, range: DateRange) -> Self {
        self.excluded_ranges.push(range);
        self
    }

    /// Check hyperparameters are usable for fitting
    pub fn validate(&self) -> Result<()> {
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.changepoint_range
            )));
        }
        for (name, scale) in [
            ("changepoint_prior_scale", self.changepoint_prior_scale),
            ("seasonality_prior_scale", self.seasonality_prior_scale),
            ("holidays_prior_scale", self.holidays_prior_scale),
        ] {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, scale
                )));
            }
        }
        Ok(())
    }

    /// Whether `date` is usable for fitting under this configuration
    pub fn admits(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.valid_start_date {
            if date < start {
                return false;
            }
        }
        !self.excluded_ranges.iter().any(|r| r.contains(date))
    }

    /// The observations of `series` that may be used for fitting
    pub fn training_input(&self, series: &Series) -> Series {
        series.filter(|obs: &Observation| self.admits(obs.date))
    }
}

/// Lookup from series key to model configuration
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: BTreeMap<String, ModelConfig>,
    default: Option<ModelConfig>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry answering every key without its own entry with `config`
    pub fn with_default(config: ModelConfig) -> Self {
        Self {
            entries: BTreeMap::new(),
            default: Some(config),
        }
    }

    pub fn with_entry(mut self, key: &str, config: ModelConfig) -> Self {
        self.entries.insert(key.to_string(), config);
        self
    }

    pub fn get(&self, key: &str) -> Result<&ModelConfig> {
        self.entries
            .get(key)
            .or(self.default.as_ref())
            .ok_or_else(|| ForecastError::Configuration(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.default.is_some() || self.entries.contains_key(key)
    }

    /// Keys among `keys` that this registry cannot answer
    pub fn validate_keys<'k, I>(&self, keys: I) -> Vec<&'k str>
    where
        I: IntoIterator<Item = &'k str>,
    {
        keys.into_iter().filter(|k| !self.contains(k)).collect()
    }

    /// Keys with an explicit entry
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

// Built-in table entries are literals; a bad one is a programming error
fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| panic!("invalid registry date {}-{}-{}", year, month, day))
}

fn span(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange::new(start, end).unwrap_or_else(|e| panic!("invalid registry exclusion: {}", e))
}

static PRODUCT_REGISTRY: Lazy<ModelRegistry> = Lazy::new(|| {
    let kpi_push = ModelConfig::default()
        .with_yearly(SeasonalityStrength::Fourier(20))
        .with_changepoint_range(0.75)
        .multiplicative()
        .with_changepoint_prior_scale(0.008)
        .with_seasonality_prior_scale(0.20)
        .with_holidays(&[HolidayCalendar::EasterDays])
        .with_valid_start(ymd(2017, 1, 30));
    let fxa = ModelConfig::default()
        .with_changepoint_range(0.8)
        .with_changepoint_prior_scale(0.02)
        .with_valid_start(ymd(2018, 3, 20));

    ModelRegistry::new()
        .with_entry(
            "desktop_global",
            ModelConfig::default()
                .with_yearly(SeasonalityStrength::Fourier(20))
                .with_changepoint_range(0.7)
                .multiplicative()
                .with_changepoint_prior_scale(0.015)
                .with_seasonality_prior_scale(0.25)
                .with_holidays(&[HolidayCalendar::EasterDays])
                .with_valid_start(ymd(2016, 4, 8))
                .excluding(span(ymd(2019, 5, 16), ymd(2019, 6, 7))),
        )
        .with_entry("nondesktop_global", ModelConfig::default())
        .with_entry("fxa_global", fxa.clone())
        .with_entry("desktop_tier1", ModelConfig::default())
        .with_entry("nondesktop_tier1", ModelConfig::default())
        .with_entry("fxa_tier1", fxa)
        .with_entry(
            "Fennec Android",
            ModelConfig::default()
                .with_changepoint_prior_scale(0.0005)
                .with_seasonality_prior_scale(0.001)
                .multiplicative()
                .with_valid_start(ymd(2017, 3, 4)),
        )
        .with_entry(
            "Focus iOS",
            ModelConfig::default()
                .with_changepoint_prior_scale(0.0005)
                .with_valid_start(ymd(2017, 12, 6)),
        )
        .with_entry(
            "Focus Android",
            ModelConfig::default()
                .with_changepoint_prior_scale(0.005)
                .with_valid_start(ymd(2017, 7, 17))
                .excluding(span(ymd(2018, 9, 1), ymd(2019, 3, 1))),
        )
        .with_entry(
            "Fennec iOS",
            ModelConfig::default()
                .with_changepoint_prior_scale(0.005)
                .with_seasonality_prior_scale(0.001)
                .multiplicative()
                .with_valid_start(ymd(2017, 3, 3))
                .excluding(span(ymd(2017, 11, 8), ymd(2017, 12, 31))),
        )
        .with_entry(
            "Fenix",
            ModelConfig::default()
                .with_changepoint_prior_scale(0.0005)
                .with_valid_start(ymd(2019, 7, 3)),
        )
        .with_entry(
            "Firefox Lite",
            ModelConfig::default()
                .with_changepoint_prior_scale(0.0005)
                .with_valid_start(ymd(2017, 3, 4)),
        )
        .with_entry(
            "FirefoxForFireTV",
            ModelConfig::default()
                .with_changepoint_prior_scale(0.0005)
                .with_seasonality_prior_scale(0.005)
                .multiplicative()
                .with_yearly(SeasonalityStrength::Fourier(10))
                .with_valid_start(ymd(2018, 2, 4)),
        )
        .with_entry(
            "FirefoxConnect",
            ModelConfig::default()
                .with_changepoint_prior_scale(0.0005)
                .with_valid_start(ymd(2018, 10, 10)),
        )
        .with_entry("nondesktop_nofire_global", kpi_push.clone())
        .with_entry("nondesktop_nofire_tier1", kpi_push)
});

static GEOGRAPHY_REGISTRY: Lazy<ModelRegistry> = Lazy::new(|| {
    ModelRegistry::with_default(ModelConfig::default().multiplicative().with_holidays(&GEO_EVENTS))
});

/// Hand-tuned models of the product KPI series
pub fn product_registry() -> &'static ModelRegistry {
    &PRODUCT_REGISTRY
}

/// One multiplicative model with the geo-event calendar for every geography
pub fn geography_registry() -> &'static ModelRegistry {
    &GEOGRAPHY_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_a_configuration_error() {
        let err = product_registry().get("Netscape").unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(ref k) if k == "Netscape"));
        assert!(err.to_string().contains("Netscape"));
    }

    #[test]
    fn geography_default_is_explicit() {
        let config = geography_registry().get("Narnia").unwrap();
        assert_eq!(config.seasonality_mode, SeasonalityMode::Multiplicative);
        assert_eq!(config.holidays, GEO_EVENTS.to_vec());
        assert!(geography_registry().has_default());
        assert!(!product_registry().has_default());
    }

    #[test]
    fn auto_seasonality_needs_enough_history() {
        assert_eq!(SeasonalityStrength::Auto.resolve(10, 729, 730), 0);
        assert_eq!(SeasonalityStrength::Auto.resolve(10, 730, 730), 10);
        assert_eq!(SeasonalityStrength::Fourier(20).resolve(10, 5, 730), 20);
        assert_eq!(SeasonalityStrength::Disabled.resolve(10, 5000, 730), 0);
    }

    #[test]
    fn admits_respects_start_and_exclusions() {
        let config = product_registry().get("desktop_global").unwrap();
        assert!(!config.admits(ymd(2016, 4, 7)));
        assert!(config.admits(ymd(2016, 4, 8)));
        assert!(!config.admits(ymd(2019, 5, 16)));
        assert!(!config.admits(ymd(2019, 6, 7)));
        assert!(config.admits(ymd(2019, 6, 8)));
    }

    #[test]
    fn built_in_dates_are_well_formed() {
        let registry = product_registry();
        for key in registry.keys() {
            let config = registry.get(key).unwrap();
            let start = config.valid_start_date.unwrap_or(ymd(2016, 1, 1));
            assert!(start >= ymd(2016, 1, 1), "{} starts {}", key, start);
            assert!(config.excluded_ranges.iter().all(|r| r.start >= start && r.start <= r.end));
        }
        assert_eq!(
            registry.get("desktop_global").unwrap().excluded_ranges,
            vec![span(ymd(2019, 5, 16), ymd(2019, 6, 7))]
        );
    }

    #[test]
    fn validate_keys_reports_missing() {
        let missing = product_registry().validate_keys(["Fenix", "Mosaic", "fxa_tier1"]);
        assert_eq!(missing, vec!["Mosaic"]);
        assert!(geography_registry().validate_keys(["anything"]).is_empty());
    }

    #[test]
    fn invalid_hyperparameters_are_rejected() {
        assert!(ModelConfig::default().validate().is_ok());
        assert!(ModelConfig::default()
            .with_changepoint_range(0.0)
            .validate()
            .is_err());
        assert!(ModelConfig::default()
            .with_changepoint_prior_scale(-1.0)
            .validate()
            .is_err());
    }
}
