use std::{fmt, sync::LazyLock};

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use super::InputError;

pub const MAX_BOOKING_DAYS: i64 = 90;

static DATE_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2})[./-](\d{1,2})[./-](\d{4})\s*$").expect("static regex")
});

/// Day/month/year as the picker shows them. The date itself is always a
/// `NaiveDate`; these are derived from it or turned into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl DateParts {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            day: date.day(),
            month: date.month(),
            year: date.year(),
        }
    }

    pub fn to_date(&self) -> Result<NaiveDate, InputError> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day).ok_or(InputError::InvalidDate {
            day: self.day,
            month: self.month,
            year: self.year,
        })
    }

    /// Accepts `DD/MM/YYYY`, `DD.MM.YYYY` and `DD-MM-YYYY`.
    pub fn parse(input: &str) -> Result<Self, InputError> {
        let captures = DATE_INPUT.captures(input).ok_or(InputError::DateFormat)?;
        let number = |i: usize| captures[i].parse::<u32>().map_err(|_| InputError::DateFormat);

        Ok(Self {
            day: number(1)?,
            month: number(2)?,
            year: number(3)? as i32,
        })
    }
}

impl fmt::Display for DateParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:04}", self.day, self.month, self.year)
    }
}

/// A consultation can be booked from today up to `MAX_BOOKING_DAYS` ahead.
pub fn validate_booking_date(date: NaiveDate, today: NaiveDate) -> Result<NaiveDate, InputError> {
    let days_ahead = date.signed_duration_since(today).num_days();
    if days_ahead < 0 {
        return Err(InputError::DateInPast);
    }
    if days_ahead > MAX_BOOKING_DAYS {
        return Err(InputError::DateTooFar(MAX_BOOKING_DAYS));
    }
    Ok(date)
}
