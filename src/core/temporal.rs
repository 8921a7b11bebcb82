//! Time handling: millisecond timestamps and daily buckets

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format used for segment date buckets.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp representing a point in time with millisecond precision
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp {
    /// Milliseconds since Unix epoch
    millis: i64,
}

impl Timestamp {
    /// Smallest representable timestamp
    pub const MIN: Timestamp = Timestamp { millis: i64::MIN };

    /// Largest representable timestamp
    pub const MAX: Timestamp = Timestamp { millis: i64::MAX };

    /// Create a timestamp from milliseconds since Unix epoch
    pub fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// Create a timestamp from seconds since Unix epoch
    pub fn from_secs(secs: i64) -> Self {
        Self {
            millis: secs.saturating_mul(1_000),
        }
    }

    /// Get current timestamp
    pub fn now() -> Self {
        Self {
            millis: Utc::now().timestamp_millis(),
        }
    }

    /// Get milliseconds since Unix epoch
    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    /// Get seconds since Unix epoch
    pub fn as_secs(&self) -> i64 {
        self.millis.div_euclid(1_000)
    }

    /// Convert to chrono DateTime, saturating at chrono's representable range
    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis).unwrap_or(if self.millis < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }

    /// UTC calendar day this timestamp falls in
    pub fn date(&self) -> NaiveDate {
        self.to_datetime().date_naive()
    }

    /// First millisecond of the given UTC day
    pub fn start_of_day(date: NaiveDate) -> Self {
        let millis = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or(0);
        Self { millis }
    }

    /// Add a duration in milliseconds
    pub fn add_millis(&self, millis: i64) -> Self {
        Self {
            millis: self.millis.saturating_add(millis),
        }
    }

    /// Subtract a duration in milliseconds
    pub fn sub_millis(&self, millis: i64) -> Self {
        Self {
            millis: self.millis.saturating_sub(millis),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            millis: dt.timestamp_millis(),
        }
    }
}

/// Render a bucket date as `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_creation() {
        let ts = Timestamp::now();
        assert!(ts.as_millis() > 0);

        let ts2 = Timestamp::from_secs(1000);
        assert_eq!(ts2.as_secs(), 1000);
        assert_eq!(ts2.as_millis(), 1_000_000);
    }

    #[test]
    fn test_date_bucket() {
        // 2024-01-31T23:59:59.999Z
        let ts = Timestamp::from_millis(1_706_745_599_999);
        assert_eq!(format_date(ts.date()), "2024-01-31");
        assert_eq!(format_date(ts.add_millis(1).date()), "2024-02-01");
    }

    #[test]
    fn test_start_of_day() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let start = Timestamp::start_of_day(date);
        assert_eq!(start.date(), date);
        assert_eq!(start.sub_millis(1).date(), date.pred_opt().unwrap());
    }

    #[test]
    fn test_out_of_range_dates_saturate() {
        assert_eq!(Timestamp::from_millis(10_000_000_000_000_000).date(), NaiveDate::MAX);
        assert_eq!(Timestamp::from_millis(-10_000_000_000_000_000).date(), NaiveDate::MIN);
        assert_eq!(Timestamp::MAX.date(), NaiveDate::MAX);
        assert_eq!(Timestamp::MIN.date(), NaiveDate::MIN);
    }

    #[test]
    fn test_serde_is_plain_millis() {
        let ts = Timestamp::from_millis(42);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "42");
    }
}
