//! Calendar day identifier.
//!
//! # Invariants
//! - Wire format is exactly `YYYY-MM-DD` and must name a real calendar date.
//! - Weekday math is timezone-naive: the civil date is used as-is.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};

static DAY_PATTERN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid day regex"));

/// Error returned for malformed day strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayParseError(pub String);

impl Display for DayParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid date `{}`; expected YYYY-MM-DD", self.0)
    }
}

impl Error for DayParseError {}

/// A validated civil date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayDate(NaiveDate);

impl DayDate {
    pub fn parse(value: &str) -> Result<Self, DayParseError> {
        if !DAY_PATTERN_RE.is_match(value) {
            return Err(DayParseError(value.to_string()));
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| DayParseError(value.to_string()))
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Day of week with Sunday = 0 through Saturday = 6.
    pub fn weekday_from_sunday(self) -> u8 {
        self.0.weekday().num_days_from_sunday() as u8
    }

    pub fn as_naive(self) -> NaiveDate {
        self.0
    }
}

impl Display for DayDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for DayDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw.as_str()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::DayDate;

    #[test]
    fn parse_accepts_strict_calendar_dates_only() {
        assert!(DayDate::parse("2026-01-05").is_ok());
        assert!(DayDate::parse("2026-1-5").is_err());
        assert!(DayDate::parse("2026-02-30").is_err());
        assert!(DayDate::parse(" 2026-01-05").is_err());
        assert!(DayDate::parse("2026-01-05T00:00:00Z").is_err());
    }

    #[test]
    fn weekday_is_computed_from_civil_date() {
        // 2026-01-04 is a Sunday.
        assert_eq!(DayDate::parse("2026-01-04").unwrap().weekday_from_sunday(), 0);
        assert_eq!(DayDate::parse("2026-01-05").unwrap().weekday_from_sunday(), 1);
        assert_eq!(DayDate::parse("2026-01-10").unwrap().weekday_from_sunday(), 6);
    }

    #[test]
    fn display_round_trips_wire_format() {
        let day = DayDate::from_ymd(2026, 3, 9).unwrap();
        assert_eq!(day.to_string(), "2026-03-09");
    }
}
