//! Which remote listing prefixes to query on a cycle.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::product::ProductKey;

/// One listing request: a prefix and the hour it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPrefix {
    pub prefix: String,
    /// Start of the covered hour
    pub hour: DateTime<Utc>,
}

/// Longest lookback a stream may configure: one week of hourly listings.
pub const MAX_LOOKBACK_HOURS: f64 = 168.0;

/// Hourly prefixes from `now - round(lookback_hours)` through the current
/// hour, oldest first. Consecutive identical prefixes (radar listings are
/// per day) are collapsed. Lookback is clamped to [`MAX_LOOKBACK_HOURS`].
pub fn plan_queries(lookback_hours: f64, now: DateTime<Utc>, product: &ProductKey) -> Vec<QueryPrefix> {
    let bins = lookback_hours.round().clamp(0.0, MAX_LOOKBACK_HOURS) as i64;
    let current_hour = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let mut prefixes: Vec<QueryPrefix> = Vec::with_capacity(bins as usize + 1);
    for back in (0..=bins).rev() {
        let hour = current_hour - Duration::hours(back);
        let prefix = product.prefix_for(&hour);
        if prefixes.last().map(|p| p.prefix == prefix).unwrap_or(false) {
            continue;
        }
        prefixes.push(QueryPrefix { prefix, hour });
    }
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rounding_to_nearest_hour() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 10, 0).unwrap();
        let p = ProductKey::goes("ABI-L2-CMIPC", "C13");
        assert_eq!(plan_queries(2.4, now, &p).len(), 3);
        assert_eq!(plan_queries(2.6, now, &p).len(), 4);
        assert_eq!(plan_queries(0.0, now, &p).len(), 1);
    }

    #[test]
    fn test_hours_are_truncated() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 59, 59).unwrap();
        let p = ProductKey::goes("ABI-L2-CMIPC", "C13");
        let q = plan_queries(1.0, now, &p);
        assert_eq!(q[0].hour, Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap());
        assert_eq!(q[1].hour, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_lookback_is_clamped() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 10, 0).unwrap();
        let p = ProductKey::goes("ABI-L2-CMIPC", "C13");
        let q = plan_queries(1.0e12, now, &p);
        assert_eq!(q.len(), MAX_LOOKBACK_HOURS as usize + 1);
        assert_eq!(q[0].hour, Utc.with_ymd_and_hms(2024, 2, 23, 12, 0, 0).unwrap());
    }
}
