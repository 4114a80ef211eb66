//! Holiday and event calendars used as exogenous regressors
//!
//! Each calendar produces named date intervals with asymmetric windows. A model
//! receives the concatenation of all its calendars; entries are never merged,
//! so overlapping windows of different names act as independent regressors.

use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use forecast_math::calendar::{eastern_easter, western_easter};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::debug;

/// A named effect active on `[date - lower_window, date + upper_window]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayEntry {
    pub name: String,
    pub date: NaiveDate,
    /// Days before `date` covered by the effect
    pub lower_window: u32,
    /// Days after `date` covered by the effect
    pub upper_window: u32,
}

impl HolidayEntry {
    pub fn new(name: &str, date: NaiveDate, lower_window: u32, upper_window: u32) -> Self {
        Self {
            name: name.to_string(),
            date,
            lower_window,
            upper_window,
        }
    }

    /// Day offsets covered by the window, from `-lower_window` to `upper_window`
    pub fn offsets(&self) -> RangeInclusive<i64> {
        -(self.lower_window as i64)..=self.upper_window as i64
    }

    /// Date at `offset` days from the holiday itself
    pub fn day_at(&self, offset: i64) -> Option<NaiveDate> {
        if offset >= 0 {
            self.date.checked_add_days(Days::new(offset as u64))
        } else {
            self.date.checked_sub_days(Days::new(offset.unsigned_abs()))
        }
    }

    /// Offset of `date` within the window, if it falls inside
    pub fn offset_of(&self, date: NaiveDate) -> Option<i64> {
        let offset = (date - self.date).num_days();
        self.offsets().contains(&offset).then_some(offset)
    }
}

/// Named calendars a model configuration can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayCalendar {
    /// The days around Western Easter as separate zero-window effects
    /// (`easter-3` .. `easter1`)
    EasterDays,
    EasterWest,
    EasterEast,
    ChineseNewYear,
    Holi,
    Nowruz,
    IslamicRepublicDay,
}

/// Calendars applied to geography-level series
pub const GEO_EVENTS: [HolidayCalendar; 6] = [
    HolidayCalendar::ChineseNewYear,
    HolidayCalendar::Holi,
    HolidayCalendar::EasterWest,
    HolidayCalendar::EasterEast,
    HolidayCalendar::Nowruz,
    HolidayCalendar::IslamicRepublicDay,
];

// Curated dates for events without a closed-form calendar. Years outside a
// table contribute no entries.
const CHINESE_NEW_YEAR: &[(i32, u32, u32)] = &[
    (2015, 2, 19),
    (2016, 2, 8),
    (2017, 1, 28),
    (2018, 2, 16),
    (2019, 2, 5),
    (2020, 1, 25),
    (2021, 2, 12),
    (2022, 2, 1),
    (2023, 1, 22),
    (2024, 2, 10),
    (2025, 1, 29),
];

const HOLI: &[(i32, u32, u32)] = &[
    (2016, 3, 6),
    (2017, 3, 13),
    (2018, 3, 2),
    (2019, 3, 21),
    (2020, 3, 10),
    (2021, 3, 29),
    (2022, 3, 18),
    (2023, 3, 8),
    (2024, 3, 25),
    (2025, 3, 14),
];

const NOWRUZ: &[(i32, u32, u32)] = &[
    (2016, 3, 20),
    (2017, 3, 21),
    (2018, 3, 20),
    (2019, 3, 20),
    (2020, 3, 19),
    (2021, 3, 20),
    (2022, 3, 21),
    (2023, 3, 21),
    (2024, 3, 20),
    (2025, 3, 20),
];

const ISLAMIC_REPUBLIC_DAY: &[(i32, u32, u32)] = &[
    (2016, 3, 31),
    (2017, 4, 1),
    (2018, 4, 1),
    (2019, 4, 1),
    (2020, 3, 31),
    (2021, 4, 1),
    (2022, 4, 1),
    (2023, 4, 1),
    (2024, 3, 31),
    (2025, 4, 1),
];

impl HolidayCalendar {
    /// Entry name used for this calendar's regressors
    pub fn name(&self) -> &'static str {
        match self {
            HolidayCalendar::EasterDays => "easter",
            HolidayCalendar::EasterWest => "easter_west",
            HolidayCalendar::EasterEast => "easter_east",
            HolidayCalendar::ChineseNewYear => "chinese_new_year",
            HolidayCalendar::Holi => "holi",
            HolidayCalendar::Nowruz => "nowruz",
            HolidayCalendar::IslamicRepublicDay => "islamic_republic_day",
        }
    }

    /// `(lower_window, upper_window)` in days
    pub fn windows(&self) -> (u32, u32) {
        match self {
            HolidayCalendar::EasterDays => (0, 0),
            HolidayCalendar::EasterWest | HolidayCalendar::EasterEast => (6, 1),
            HolidayCalendar::ChineseNewYear => (20, 20),
            HolidayCalendar::Holi => (1, 1),
            HolidayCalendar::Nowruz => (11, 6),
            HolidayCalendar::IslamicRepublicDay => (6, 3),
        }
    }

    /// Entries of this calendar for every year in `years`
    pub fn entries(&self, years: RangeInclusive<i32>) -> Result<Vec<HolidayEntry>> {
        let (lower, upper) = self.windows();
        match self {
            HolidayCalendar::EasterDays => easter_days(years),
            HolidayCalendar::EasterWest => {
                movable(self.name(), years, lower, upper, western_easter)
            }
            HolidayCalendar::EasterEast => {
                movable(self.name(), years, lower, upper, eastern_easter)
            }
            HolidayCalendar::ChineseNewYear => {
                Ok(curated(self.name(), CHINESE_NEW_YEAR, years, lower, upper))
            }
            HolidayCalendar::Holi => Ok(curated(self.name(), HOLI, years, lower, upper)),
            HolidayCalendar::Nowruz => Ok(curated(self.name(), NOWRUZ, years, lower, upper)),
            HolidayCalendar::IslamicRepublicDay => Ok(curated(
                self.name(),
                ISLAMIC_REPUBLIC_DAY,
                years,
                lower,
                upper,
            )),
        }
    }
}

/// Concatenate the entries of several calendars into one holiday table
pub fn holiday_table(
    calendars: &[HolidayCalendar],
    years: RangeInclusive<i32>,
) -> Result<Vec<HolidayEntry>> {
    let mut table = Vec::new();
    for calendar in calendars {
        table.extend(calendar.entries(years.clone())?);
    }
    debug!(
        calendars = calendars.len(),
        entries = table.len(),
        "built holiday table"
    );
    Ok(table)
}

/// Each of the five days from Maundy Thursday to Easter Monday as its own effect
fn easter_days(years: RangeInclusive<i32>) -> Result<Vec<HolidayEntry>> {
    let mut entries = Vec::new();
    for year in years {
        let easter = western_easter(year)?;
        for offset in -3i64..=1 {
            let entry = HolidayEntry::new("easter", easter, 0, 0);
            let day = entry.day_at(offset).ok_or_else(|| {
                ForecastError::ForecastingError(format!("Easter offset overflow in {}", year))
            })?;
            entries.push(HolidayEntry::new(&format!("easter{}", offset), day, 0, 0));
        }
    }
    Ok(entries)
}

fn movable<F>(
    name: &str,
    years: RangeInclusive<i32>,
    lower: u32,
    upper: u32,
    feast: F,
) -> Result<Vec<HolidayEntry>>
where
    F: Fn(i32) -> forecast_math::Result<NaiveDate>,
{
    years
        .map(|year| Ok(HolidayEntry::new(name, feast(year)?, lower, upper)))
        .collect()
}

fn curated(
    name: &str,
    table: &[(i32, u32, u32)],
    years: RangeInclusive<i32>,
    lower: u32,
    upper: u32,
) -> Vec<HolidayEntry> {
    table
        .iter()
        .filter(|(year, _, _)| years.contains(year))
        .filter_map(|&(year, month, day)| NaiveDate::from_ymd_opt(year, month, day))
        .map(|date| HolidayEntry::new(name, date, lower, upper))
        .collect()
}
