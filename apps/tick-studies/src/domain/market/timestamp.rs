//! Timestamp value object for tick data.
//!
//! Every timestamp that crosses the wire, whatever shape it arrived in, is
//! normalized to signed microseconds since the Unix epoch.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Microseconds in one second.
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Microseconds in one hour.
pub const MICROS_PER_HOUR: i64 = 3_600 * MICROS_PER_SECOND;

/// A UTC instant with microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from epoch microseconds.
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Create a timestamp from epoch seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * MICROS_PER_SECOND)
    }

    /// Create a timestamp from fractional epoch seconds, rounded to the
    /// nearest microsecond.
    #[must_use]
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * MICROS_PER_SECOND as f64).round() as i64)
    }

    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_micros())
    }

    /// Parse from an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid RFC 3339 timestamp.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)?;
        Ok(Self(dt.with_timezone(&Utc).timestamp_micros()))
    }

    /// Epoch microseconds.
    #[must_use]
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// Convert to a `DateTime<Utc>`. Out-of-range values clamp to the epoch.
    #[must_use]
    pub fn as_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_micros(self.0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Format as RFC 3339 with microsecond precision.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.as_datetime()
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }

    /// Shift backwards by `micros`, saturating at `i64::MIN`.
    #[must_use]
    pub const fn saturating_sub_micros(&self, micros: i64) -> Self {
        Self(self.0.saturating_sub(micros))
    }

    /// Signed distance `self - other` in microseconds.
    #[must_use]
    pub const fn micros_since(&self, other: Self) -> i64 {
        self.0.saturating_sub(other.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_micros())
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.as_datetime()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_parse_keeps_microseconds() {
        let ts = Timestamp::parse("2024-01-15T10:00:00.123456Z").unwrap();
        assert_eq!(ts.as_micros(), 1_705_312_800_123_456);
    }

    #[test]
    fn timestamp_parse_invalid() {
        assert!(Timestamp::parse("not-a-date").is_err());
    }

    #[test]
    fn timestamp_rfc3339_round_trip() {
        let ts = Timestamp::from_micros(1_705_312_800_000_001);
        assert_eq!(Timestamp::parse(&ts.to_rfc3339()).unwrap(), ts);
    }

    #[test]
    fn timestamp_from_fractional_seconds() {
        let ts = Timestamp::from_secs_f64(1_705_312_800.25);
        assert_eq!(ts.as_micros(), 1_705_312_800_250_000);
    }

    #[test]
    fn timestamp_ordering_and_distance() {
        let a = Timestamp::from_secs(10);
        let b = Timestamp::from_secs(12);
        assert!(a < b);
        assert_eq!(b.micros_since(a), 2 * MICROS_PER_SECOND);
        assert_eq!(b.saturating_sub_micros(2 * MICROS_PER_SECOND), a);
    }
}
