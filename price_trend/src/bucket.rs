//! bucket.rs — map observations to `(store, anchor)` bucket keys
//!
//! - One stable epoch: Unix (1970-01-01T00:00:00Z).
//! - UTC basis: second-based floor math; hour and day are fixed widths.
//! - Week: Monday 00:00–aligned using a week epoch of 1969-12-29.
//! - Zone basis: truncate on the local wall clock, then resolve back to an
//!   instant with [`from_local_naive_with_policy`].
//!
//! Every anchor is the inclusive start of its bucket, so an observation that
//! sits exactly on a boundary anchors to itself.

use chrono::{DateTime, Datelike, Days, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::{
    error::Malformed,
    models::Observation,
    tz::{DstPolicy, TimeBasis, from_local_naive_with_policy},
    unit::TrendUnit,
};

/// Number of seconds in an hour.
pub const SECS_PER_HOUR: i64 = 60 * 60;
/// Number of seconds in a day.
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
/// Number of seconds in a week.
pub const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;

/// shift so Monday 1969-12-29 00:00Z becomes offset 0
const WEEK_MONDAY_ANCHOR_OFFSET_SECS: i64 = 3 * SECS_PER_DAY; // +3d

/// Identity of one bucket: the store plus its normalized anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    /// Trimmed store identifier.
    pub store: String,
    /// Start instant of the bucket.
    pub anchor: DateTime<Utc>,
}

/// Validate an observation and compute its bucket key.
///
/// Returns the reason the observation must be dropped when it is malformed.
pub fn bucketize(
    observation: &Observation,
    unit: TrendUnit,
    basis: TimeBasis,
) -> Result<BucketKey, Malformed> {
    let (store, ts) = observation.validated()?;
    let anchor = bucket_start(ts, unit, basis).ok_or(Malformed::BadTimestamp)?;
    Ok(BucketKey {
        store: store.to_string(),
        anchor,
    })
}

/// Start instant of the bucket containing `ts`.
///
/// `None` only when the start would fall outside chrono's representable range.
pub fn bucket_start(ts: DateTime<Utc>, unit: TrendUnit, basis: TimeBasis) -> Option<DateTime<Utc>> {
    match basis {
        TimeBasis::Utc => match unit {
            TrendUnit::Hour => start_fixed(ts, SECS_PER_HOUR),
            TrendUnit::Day => start_fixed(ts, SECS_PER_DAY),
            TrendUnit::Week => start_week(ts),
        },
        TimeBasis::Zone(tz) => start_zoned(ts, unit, tz),
    }
}

// ----- UTC internals -----

fn start_fixed(ts: DateTime<Utc>, bucket_secs: i64) -> Option<DateTime<Utc>> {
    // timestamp() floors, so sub-second fractions are dropped here
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(bucket_secs), 0)
}

fn start_week(ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let secs = ts.timestamp();
    let since_monday = (secs + WEEK_MONDAY_ANCHOR_OFFSET_SECS).rem_euclid(SECS_PER_WEEK);
    DateTime::from_timestamp(secs - since_monday, 0)
}

// ----- zone internals -----

fn start_zoned(ts: DateTime<Utc>, unit: TrendUnit, tz: Tz) -> Option<DateTime<Utc>> {
    let local = ts.with_timezone(&tz).naive_local();
    let (floor, policy) = match unit {
        TrendUnit::Hour => (
            local.date().and_hms_opt(local.hour(), 0, 0)?,
            DstPolicy::LatestNotAfter(ts),
        ),
        TrendUnit::Day => (local_midnight(local, 0)?, DstPolicy::PreferEarliest),
        TrendUnit::Week => {
            let back = u64::from(local.weekday().num_days_from_monday());
            (local_midnight(local, back)?, DstPolicy::PreferEarliest)
        }
    };
    Some(from_local_naive_with_policy(floor, tz, policy))
}

fn local_midnight(local: NaiveDateTime, days_back: u64) -> Option<NaiveDateTime> {
    local
        .date()
        .checked_sub_days(Days::new(days_back))?
        .and_hms_opt(0, 0, 0)
}

// -------------------- tests --------------------
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn start(ts: DateTime<Utc>, unit: TrendUnit) -> DateTime<Utc> {
        bucket_start(ts, unit, TimeBasis::Utc).unwrap()
    }

    #[test]
    fn hour_contains_its_last_second() {
        let a = start(utc(2024, 1, 1, 10, 0, 0), TrendUnit::Hour);
        let b = start(utc(2024, 1, 1, 10, 59, 59) + Duration::milliseconds(999), TrendUnit::Hour);
        let c = start(utc(2024, 1, 1, 11, 0, 0), TrendUnit::Hour);
        assert_eq!(a, utc(2024, 1, 1, 10, 0, 0));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn day_truncates_to_midnight() {
        assert_eq!(
            start(utc(2024, 2, 29, 23, 59, 59), TrendUnit::Day),
            utc(2024, 2, 29, 0, 0, 0)
        );
    }

    #[test]
    fn week_rolls_back_to_monday() {
        // 2024-01-03 is a Wednesday; its week starts Monday 2024-01-01.
        assert_eq!(
            start(utc(2024, 1, 3, 15, 20, 0), TrendUnit::Week),
            utc(2024, 1, 1, 0, 0, 0)
        );
        // Sunday belongs to the week that started six days earlier.
        assert_eq!(
            start(utc(2024, 1, 7, 23, 59, 59), TrendUnit::Week),
            utc(2024, 1, 1, 0, 0, 0)
        );
        // Monday midnight anchors to itself.
        let monday = utc(2024, 1, 8, 0, 0, 0);
        assert_eq!(start(monday, TrendUnit::Week), monday);
    }

    #[test]
    fn pre_epoch_timestamps_floor_downwards() {
        // 1969-12-31 is a Wednesday.
        assert_eq!(
            start(utc(1969, 12, 31, 12, 30, 0), TrendUnit::Week),
            utc(1969, 12, 29, 0, 0, 0)
        );
        assert_eq!(
            start(utc(1969, 12, 31, 12, 30, 0) + Duration::milliseconds(1), TrendUnit::Hour),
            utc(1969, 12, 31, 12, 0, 0)
        );
    }

    #[test]
    fn zone_basis_uses_local_calendar() {
        let kolkata = TimeBasis::Zone(Tz::Asia__Kolkata);
        // 20:00Z on Jan 1 is 01:30 on Jan 2 in Kolkata (+05:30).
        let ts = utc(2024, 1, 1, 20, 0, 0);
        assert_eq!(start(ts, TrendUnit::Day), utc(2024, 1, 1, 0, 0, 0));
        assert_eq!(
            bucket_start(ts, TrendUnit::Day, kolkata),
            Some(utc(2024, 1, 1, 18, 30, 0))
        );
        // Local hour start is 01:00 IST = 19:30Z.
        assert_eq!(
            bucket_start(ts, TrendUnit::Hour, kolkata),
            Some(utc(2024, 1, 1, 19, 30, 0))
        );
        // Tuesday Jan 2 local -> Monday Jan 1 00:00 IST.
        assert_eq!(
            bucket_start(ts, TrendUnit::Week, kolkata),
            Some(utc(2023, 12, 31, 18, 30, 0))
        );
    }

    #[test]
    fn repeated_hour_stays_split_but_day_does_not() {
        let ny = TimeBasis::Zone(Tz::America__New_York);
        let first = utc(2024, 11, 3, 5, 30, 0); // 01:30 EDT
        let second = utc(2024, 11, 3, 6, 30, 0); // 01:30 EST
        assert_eq!(
            bucket_start(first, TrendUnit::Hour, ny),
            Some(utc(2024, 11, 3, 5, 0, 0))
        );
        assert_eq!(
            bucket_start(second, TrendUnit::Hour, ny),
            Some(utc(2024, 11, 3, 6, 0, 0))
        );
        let day = bucket_start(first, TrendUnit::Day, ny);
        assert_eq!(day, bucket_start(second, TrendUnit::Day, ny));
        assert_eq!(day, Some(utc(2024, 11, 3, 4, 0, 0))); // midnight EDT
    }

    #[test]
    fn bucketize_builds_structured_key() {
        let obs = Observation::new(" X ", "2024-01-01T10:45:00Z", 600.0);
        let key = bucketize(&obs, TrendUnit::Hour, TimeBasis::Utc).unwrap();
        assert_eq!(
            key,
            BucketKey {
                store: "X".into(),
                anchor: utc(2024, 1, 1, 10, 0, 0)
            }
        );
        let bad = Observation {
            store: "X".into(),
            timestamp: None,
            price: 1.0,
        };
        assert_eq!(
            bucketize(&bad, TrendUnit::Hour, TimeBasis::Utc),
            Err(Malformed::MissingTimestamp)
        );
    }
}
