//! Expiration policy.
//!
//! Every persisted expiry is whole seconds since epoch, truncated toward the
//! past. Comparisons happen in that unit.

use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result};
use crate::session::SessionData;

/// Converts an instant to seconds since epoch, rounding down.
pub fn to_seconds_epoch(date: OffsetDateTime) -> i64 {
    date.unix_timestamp()
}

/// Converts seconds since epoch back to an instant.
///
/// Fails for values outside the range `time` can represent.
pub fn from_seconds_epoch(seconds: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|_| Error::InvalidTimestamp(seconds.to_string()))
}

/// Milliseconds since epoch, rounding down.
pub fn to_millis_epoch(date: OffsetDateTime) -> i64 {
    date.unix_timestamp_nanos().div_euclid(1_000_000) as i64
}

/// Expiration instant for `session`, written at `now`.
///
/// An integral `cookie.maxAge` wins over `default_ttl`. Negative lifetimes
/// are honored and produce an instant in the past.
pub fn expiration_date(session: &SessionData, default_ttl: Duration, now: OffsetDateTime) -> OffsetDateTime {
    let lifetime = session
        .cookie_max_age()
        .map(Duration::milliseconds)
        .unwrap_or(default_ttl);
    now.saturating_add(lifetime)
}

/// Whether a record expiring at `expires_at` (seconds since epoch) is expired
/// at `now`. A missing expiry counts as expired.
pub fn is_expired(expires_at: Option<i64>, now: OffsetDateTime) -> bool {
    match expires_at {
        Some(expires_at) => expires_at <= to_seconds_epoch(now),
        None => true,
    }
}

/// Whether a refresh is due for a session last written at `updated` (ms).
///
/// A zero interval always refreshes.
pub fn touch_due(updated: Option<i64>, touch_interval_ms: u64, now_ms: i64) -> bool {
    let interval = i64::try_from(touch_interval_ms).unwrap_or(i64::MAX);
    match updated {
        Some(updated) => updated.saturating_add(interval) <= now_ms,
        None => true,
    }
}
