//! Movable feast computations
//!
//! Contains exact date algorithms for the feasts whose dates move every year:
//! - Western Easter (Gregorian computus)
//! - Eastern (Orthodox) Easter (Julian computus, shifted to the Gregorian calendar)

use crate::{MathError, Result};
use chrono::{Days, NaiveDate};

/// First year of the Gregorian calendar.
pub const FIRST_GREGORIAN_YEAR: i32 = 1583;

/// Western Easter Sunday for `year`, using the anonymous Gregorian algorithm
/// (Meeus/Jones/Butcher).
pub fn western_easter(year: i32) -> Result<NaiveDate> {
    check_year(year)?;

    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let n = h + l - 7 * m + 114;

    let month = (n / 31) as u32;
    let day = (n % 31 + 1) as u32;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        MathError::CalculationError(format!(
            "Computed invalid Easter date {}-{}-{}",
            year, month, day
        ))
    })
}

/// Eastern (Orthodox) Easter Sunday for `year`, expressed as a Gregorian date.
///
/// The Julian computus gives the date in the Julian calendar; it is moved to
/// the Gregorian calendar by the century-dependent offset between the two.
pub fn eastern_easter(year: i32) -> Result<NaiveDate> {
    check_year(year)?;

    let a = year % 4;
    let b = year % 7;
    let c = year % 19;
    let d = (19 * c + 15) % 30;
    let e = (2 * a + 4 * b - d + 34) % 7;
    let n = d + e + 114;

    let month = (n / 31) as u32;
    let day = (n % 31 + 1) as u32;

    let julian = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        MathError::CalculationError(format!(
            "Computed invalid Julian Easter date {}-{}-{}",
            year, month, day
        ))
    })?;

    julian
        .checked_add_days(Days::new(julian_offset_days(year) as u64))
        .ok_or_else(|| {
            MathError::CalculationError(format!("Easter date overflow for year {}", year))
        })
}

/// Days the Julian calendar lags the Gregorian calendar in March of `year`.
pub fn julian_offset_days(year: i32) -> i32 {
    year / 100 - year / 400 - 2
}

fn check_year(year: i32) -> Result<()> {
    if year < FIRST_GREGORIAN_YEAR {
        return Err(MathError::InvalidInput(format!(
            "year {} predates the Gregorian calendar",
            year
        )));
    }
    Ok(())
}
