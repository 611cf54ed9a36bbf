//! Timestamp handling for artifact filenames.
//!
//! Every raw and rendered artifact carries its acquisition time as a
//! fixed-width filename prefix (e.g. `20183192334541_C13.nc` or
//! `KFSX20190517_000556.png`). A [`TimestampFormat`] knows how wide that
//! prefix is and parses only that slice, so extensions and product suffixes
//! never trip up the parser.

use std::fmt::Write;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalidation key for cached source geometry: the UTC calendar day.
pub type GeometryEpoch = NaiveDate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("Invalid timestamp pattern: {0}")]
    InvalidPattern(String),

    #[error("'{name}' does not match timestamp pattern '{pattern}'")]
    NoMatch { name: String, pattern: String },
}

/// A strftime-style pattern used as a filename prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimestampFormat {
    pattern: String,
    width: usize,
}

impl TimestampFormat {
    /// Build a format, measuring its rendered width against a reference instant.
    pub fn new(pattern: impl Into<String>) -> Result<Self, TimeParseError> {
        let pattern = pattern.into();
        let reference = NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| TimeParseError::InvalidPattern(pattern.clone()))?;

        // chrono reports unknown specifiers as a fmt::Error on write
        let mut rendered = String::new();
        write!(rendered, "{}", reference.format(&pattern))
            .map_err(|_| TimeParseError::InvalidPattern(pattern.clone()))?;

        if rendered.is_empty() || rendered == pattern {
            return Err(TimeParseError::InvalidPattern(pattern));
        }

        Ok(Self {
            width: rendered.len(),
            pattern,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of filename characters consumed by the timestamp.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Parse the timestamp prefix of `name`.
    pub fn parse(&self, name: &str) -> Result<DateTime<Utc>, TimeParseError> {
        let head = name.get(..self.width).unwrap_or(name);
        NaiveDateTime::parse_from_str(head, &self.pattern)
            .map(|ndt| Utc.from_utc_datetime(&ndt))
            .map_err(|_| TimeParseError::NoMatch {
                name: name.to_string(),
                pattern: self.pattern.clone(),
            })
    }

    /// Render `ts` with this pattern.
    pub fn format(&self, ts: &DateTime<Utc>) -> String {
        ts.format(&self.pattern).to_string()
    }
}

impl TryFrom<String> for TimestampFormat {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TimestampFormat> for String {
    fn from(value: TimestampFormat) -> Self {
        value.pattern
    }
}

/// Age of a file as far as its name can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAge {
    Known(Duration),
    /// The name did not match the expected timestamp layout.
    Unparseable,
}

impl FileAge {
    pub fn as_hours(&self) -> Option<f64> {
        match self {
            FileAge::Known(d) => Some(d.num_milliseconds() as f64 / 3_600_000.0),
            FileAge::Unparseable => None,
        }
    }

    /// True only for a known age strictly greater than `limit`.
    pub fn exceeds(&self, limit: Duration) -> bool {
        matches!(self, FileAge::Known(d) if *d > limit)
    }
}

/// Elapsed time from `ts` to `now`. Negative for timestamps in the future.
pub fn age(ts: &DateTime<Utc>, now: &DateTime<Utc>) -> Duration {
    now.signed_duration_since(*ts)
}

/// Parse `name` with `format` and compute its age relative to `now`.
pub fn file_age(name: &str, format: &TimestampFormat, now: &DateTime<Utc>) -> FileAge {
    match format.parse(name) {
        Ok(ts) => FileAge::Known(age(&ts, now)),
        Err(_) => FileAge::Unparseable,
    }
}

/// Convert fractional hours into a millisecond-precision duration.
pub fn duration_from_hours(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

pub fn epoch_of(ts: &DateTime<Utc>) -> GeometryEpoch {
    ts.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goes_format_width_and_parse() {
        let fmt = TimestampFormat::new("%Y%j%H%M%S").unwrap();
        assert_eq!(fmt.width(), 13);

        let ts = fmt.parse("20183192334541_C13.nc").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2018, 11, 15, 23, 34, 54).unwrap());
    }

    #[test]
    fn test_radar_format_with_literal_prefix() {
        let fmt = TimestampFormat::new("KFSX%Y%m%d_%H%M%S").unwrap();
        assert_eq!(fmt.width(), "KFSX20190517_000556".len());

        let ts = fmt.parse("KFSX20190517_000556.png").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2019, 5, 17, 0, 5, 56).unwrap());
        assert_eq!(fmt.format(&ts), "KFSX20190517_000556");
    }

    #[test]
    fn test_short_or_garbled_names_fail() {
        let fmt = TimestampFormat::new("%Y%j%H%M%S").unwrap();
        assert!(fmt.parse("2018").is_err());
        assert!(fmt.parse("notes.txt").is_err());
        assert!(fmt.parse("").is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(TimestampFormat::new("no-specifiers").is_err());
        assert!(TimestampFormat::new("").is_err());
    }

    #[test]
    fn test_file_age_distinguishes_unparseable() {
        let fmt = TimestampFormat::new("%Y%j%H%M%S").unwrap();
        let now = Utc.with_ymd_and_hms(2018, 11, 16, 0, 0, 0).unwrap();

        let known = file_age("20183192300000_C13.nc", &fmt, &now);
        assert_eq!(known.as_hours(), Some(1.0));

        let bad = file_age("garbage_C13.nc", &fmt, &now);
        assert_eq!(bad, FileAge::Unparseable);
        assert!(!bad.exceeds(Duration::zero()));
    }

    #[test]
    fn test_exceeds_is_strict() {
        let limit = duration_from_hours(25.0);
        assert!(!FileAge::Known(limit).exceeds(limit));
        assert!(FileAge::Known(limit + Duration::seconds(1)).exceeds(limit));
    }

    #[test]
    fn test_epoch_is_utc_day() {
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 1).unwrap();
        assert_ne!(epoch_of(&late), epoch_of(&early));
    }
}
