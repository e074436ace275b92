//! Timestamp parsing and time-basis helpers.
//!
//! What this module provides:
//! - [`parse_ts_to_utc`]: accept the timestamp shapes the backend emits
//!   (RFC-3339 with offset, naive ISO-8601, decimal epoch) and convert to UTC.
//! - [`epoch_to_utc`]: numeric epoch (seconds or milliseconds) to UTC.
//! - [`TimeBasis`]: the single calendar every bucket truncation in a call is
//!   computed in, either UTC or one IANA zone.
//! - [`from_local_naive_with_policy`]: map a truncated local wall time back to
//!   an instant, resolving DST gaps and repeats via [`DstPolicy`].
//!
//! Notes:
//! - Naive timestamps (no offset) are read as UTC; the backend stores
//!   `utcnow()` values without a suffix.
//! - Epoch magnitudes up to `1e11` are seconds, larger ones milliseconds.
//!   `1e11` seconds is the year 5138, `1e11` milliseconds is March 1973.
//!
//! Examples
//! - "2024-03-10T09:30:00-05:00" -> 2024-03-10T14:30:00Z
//! - "2024-03-10 14:30:00"       -> 2024-03-10T14:30:00Z
//! - "1710081000"                -> 2024-03-10T14:30:00Z
//! - "2024"                      -> 2024-01-01T00:00:00Z

use std::{fmt, str::FromStr};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::TimestampError;

/// Epoch values with a larger magnitude are interpreted as milliseconds.
pub const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Cap on the minute-by-minute walk out of a DST gap.
const DST_GAP_MAX_MINUTES: u32 = 120;

const NAIVE_LAYOUTS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parse any accepted timestamp string into UTC.
///
/// Tried in order: RFC-3339, ISO-8601 with a compact `+HHMM` offset, naive
/// ISO-8601 (read as UTC), date only (midnight UTC), a bare four-digit year
/// (January 1, midnight UTC), decimal epoch.
pub fn parse_ts_to_utc(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(TimestampError::Unrecognized(raw.to_string()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    if let Some(jan1) = bare_year(s) {
        return Ok(jan1.and_utc());
    }
    if let Ok(v) = s.parse::<f64>() {
        return epoch_to_utc(v);
    }
    Err(TimestampError::Unrecognized(raw.to_string()))
}

/// `YYYY` alone means January 1 of that year, as browsers read it.
fn bare_year(s: &str) -> Option<NaiveDateTime> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1)?.and_hms_opt(0, 0, 0)
}

/// Numeric epoch to UTC; see [`EPOCH_MILLIS_THRESHOLD`].
pub fn epoch_to_utc(value: f64) -> Result<DateTime<Utc>, TimestampError> {
    if !value.is_finite() {
        return Err(TimestampError::OutOfRange(value.to_string()));
    }
    let millis = if value.abs() > EPOCH_MILLIS_THRESHOLD {
        value.round()
    } else {
        (value * 1000.0).round()
    };
    if millis.abs() >= i64::MAX as f64 {
        return Err(TimestampError::OutOfRange(value.to_string()));
    }
    DateTime::from_timestamp_millis(millis as i64)
        .ok_or_else(|| TimestampError::OutOfRange(value.to_string()))
}

/// Calendar used for bucket truncation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeBasis {
    /// Truncate in UTC.
    #[default]
    Utc,
    /// Truncate on the wall clock of an IANA zone.
    Zone(Tz),
}

impl fmt::Display for TimeBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeBasis::Utc => f.write_str("utc"),
            TimeBasis::Zone(tz) => f.write_str(tz.name()),
        }
    }
}

impl FromStr for TimeBasis {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("empty time basis"));
        }
        if s.eq_ignore_ascii_case("utc") || s == "Z" {
            return Ok(TimeBasis::Utc);
        }
        let tz: Tz = s
            .parse()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("bad tz: {s}"))?;
        Ok(TimeBasis::Zone(tz))
    }
}

impl TryFrom<String> for TimeBasis {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeBasis> for String {
    fn from(value: TimeBasis) -> Self {
        value.to_string()
    }
}

/// How to pick an instant when a local wall time occurs twice (DST fall-back).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstPolicy {
    /// Always the earlier occurrence. Day and week starts use this so a
    /// repeated midnight never splits a day.
    PreferEarliest,
    /// The later occurrence if it is not after the given instant, otherwise
    /// the earlier one. Hour starts use this so the two passes through a
    /// repeated hour stay in separate buckets.
    LatestNotAfter(DateTime<Utc>),
}

/// Convert a local wall time in `tz` to UTC.
///
/// Behavior:
/// - Single mapping: returned as is.
/// - Ambiguous (fall-back): resolved by `policy`.
/// - Nonexistent (spring-forward gap): step forward minute by minute until a
///   valid instant is found (max 2 hours).
pub fn from_local_naive_with_policy(naive: NaiveDateTime, tz: Tz, policy: DstPolicy) -> DateTime<Utc> {
    use chrono::offset::LocalResult::*;
    match tz.from_local_datetime(&naive) {
        Single(dt) => dt.with_timezone(&Utc),
        Ambiguous(a, b) => {
            let (a, b) = (a.with_timezone(&Utc), b.with_timezone(&Utc));
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            match policy {
                DstPolicy::PreferEarliest => early,
                DstPolicy::LatestNotAfter(limit) if late <= limit => late,
                DstPolicy::LatestNotAfter(_) => early,
            }
        }
        None => {
            let mut t = naive;
            for _ in 0..DST_GAP_MAX_MINUTES {
                t += Duration::minutes(1);
                if let Single(dt) = tz.from_local_datetime(&t) {
                    return dt.with_timezone(&Utc);
                }
            }
            // wider than any real gap: apply the offset in force at that wall time
            let offset = tz.offset_from_utc_datetime(&naive).fix();
            (naive - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
        }
    }
}
