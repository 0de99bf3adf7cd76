use std::{fmt, sync::LazyLock};

use chrono::{NaiveTime, Timelike};
use regex::Regex;

use super::InputError;

static TWELVE_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2})(?:[:.](\d{2}))?\s*([AaPp])\.?\s*[Mm]\.?\s*$").expect("static regex")
});
static TWENTY_FOUR_HOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Am,
    Pm,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Am => f.write_str("AM"),
            Period::Pm => f.write_str("PM"),
        }
    }
}

/// Hour/minute/period as the picker shows them. The canonical value is a
/// 24-hour `HH:MM` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    pub hour: u32,
    pub minute: u32,
    pub period: Period,
}

impl TimeParts {
    pub fn from_time(time: NaiveTime) -> Self {
        let (is_pm, hour) = time.hour12();
        Self {
            hour,
            minute: time.minute(),
            period: if is_pm { Period::Pm } else { Period::Am },
        }
    }

    pub fn from_canonical(value: &str) -> Result<Self, InputError> {
        let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map_err(|_| InputError::InvalidTime(value.to_string()))?;
        Ok(Self::from_time(time))
    }

    pub fn to_canonical(&self) -> Result<String, InputError> {
        if !(1..=12).contains(&self.hour) || self.minute > 59 {
            return Err(InputError::InvalidTime(self.to_string()));
        }
        let hour = match (self.period, self.hour) {
            (Period::Am, 12) => 0,
            (Period::Am, hour) => hour,
            (Period::Pm, 12) => 12,
            (Period::Pm, hour) => hour + 12,
        };
        Ok(format!("{:02}:{:02}", hour, self.minute))
    }

    /// Accepts `10:30 AM`, `10.30pm`, `7 pm` or a 24-hour `22:30`.
    pub fn parse(input: &str) -> Result<Self, InputError> {
        if let Some(captures) = TWELVE_HOUR.captures(input) {
            let hour: u32 = captures[1].parse().map_err(|_| InputError::TimeFormat)?;
            let minute: u32 = match captures.get(2) {
                Some(minute) => minute.as_str().parse().map_err(|_| InputError::TimeFormat)?,
                None => 0,
            };
            let period = match &captures[3] {
                "a" | "A" => Period::Am,
                _ => Period::Pm,
            };
            let parts = Self {
                hour,
                minute,
                period,
            };
            // validates the ranges
            parts.to_canonical()?;
            return Ok(parts);
        }

        if let Some(captures) = TWENTY_FOUR_HOUR.captures(input) {
            let hour: u32 = captures[1].parse().map_err(|_| InputError::TimeFormat)?;
            let minute: u32 = captures[2].parse().map_err(|_| InputError::TimeFormat)?;
            let time = NaiveTime::from_hms_opt(hour, minute, 0)
                .ok_or_else(|| InputError::InvalidTime(input.trim().to_string()))?;
            return Ok(Self::from_time(time));
        }

        Err(InputError::TimeFormat)
    }
}

impl fmt::Display for TimeParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02} {}", self.hour, self.minute, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(hour: u32, minute: u32, period: Period) -> TimeParts {
        TimeParts {
            hour,
            minute,
            period,
        }
    }

    #[test]
    fn midnight_and_noon() {
        assert_eq!(parts(12, 0, Period::Am).to_canonical().unwrap(), "00:00");
        assert_eq!(parts(12, 5, Period::Pm).to_canonical().unwrap(), "12:05");
        assert_eq!(TimeParts::from_canonical("00:00").unwrap(), parts(12, 0, Period::Am));
        assert_eq!(TimeParts::from_canonical("12:05").unwrap(), parts(12, 5, Period::Pm));
    }

    #[test]
    fn canonical_derivation_both_ways() {
        for canonical in ["00:30", "09:15", "11:59", "13:00", "23:45"] {
            let derived = TimeParts::from_canonical(canonical).unwrap();
            assert_eq!(derived.to_canonical().unwrap(), canonical);
        }
        assert_eq!(TimeParts::from_canonical("18:40").unwrap().to_string(), "6:40 PM");
    }

    #[test]
    fn out_of_range_parts_are_rejected() {
        assert!(parts(0, 0, Period::Am).to_canonical().is_err());
        assert!(parts(13, 0, Period::Pm).to_canonical().is_err());
        assert!(parts(10, 60, Period::Am).to_canonical().is_err());
        assert!(TimeParts::from_canonical("24:00").is_err());
    }

    #[test]
    fn parses_user_input() {
        assert_eq!(TimeParts::parse("10:30 AM"), Ok(parts(10, 30, Period::Am)));
        assert_eq!(TimeParts::parse("10.30pm"), Ok(parts(10, 30, Period::Pm)));
        assert_eq!(TimeParts::parse("7 p.m."), Ok(parts(7, 0, Period::Pm)));
        assert_eq!(TimeParts::parse("22:30"), Ok(parts(10, 30, Period::Pm)));
        assert_eq!(TimeParts::parse("0:15"), Ok(parts(12, 15, Period::Am)));

        assert_eq!(TimeParts::parse("half past ten"), Err(InputError::TimeFormat));
        assert!(matches!(TimeParts::parse("13:30 PM"), Err(InputError::InvalidTime(_))));
        assert!(matches!(TimeParts::parse("25:00"), Err(InputError::InvalidTime(_))));
    }
}
