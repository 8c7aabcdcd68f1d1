//! Conversion between wire timestamps (Unix seconds) and stored datetimes.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("Timestamp out of range: {0}")]
    OutOfRange(i64),
}

/// 0000-01-01T00:00:00Z
pub const MIN_UNIX_SECONDS: i64 = -62_167_219_200;
/// 9999-12-31T23:59:59Z
pub const MAX_UNIX_SECONDS: i64 = 253_402_300_799;

/// Convert Unix seconds received on the wire into a UTC datetime.
///
/// Only four-digit years are accepted.
pub fn from_unix_seconds(secs: i64) -> Result<DateTime<Utc>, TimestampError> {
    if !(MIN_UNIX_SECONDS..=MAX_UNIX_SECONDS).contains(&secs) {
        return Err(TimestampError::OutOfRange(secs));
    }
    DateTime::from_timestamp(secs, 0).ok_or(TimestampError::OutOfRange(secs))
}

/// Convert a stored datetime back into Unix seconds for the wire.
pub fn to_unix_seconds(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp()
}
