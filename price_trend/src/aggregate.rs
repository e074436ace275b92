//! Multi-store trend aggregation.
//!
//! ## What this does
//! - Bucketizes every observation into a [`BucketKey`] (store + anchor).
//! - Accumulates a running sum and count per key in one pass.
//! - Reduces each bucket to a [`Point`] holding the rounded arithmetic mean.
//! - Groups points by store and sorts each series by time.
//!
//! ## Exactness
//! Prices are summed as integer micro-units (`i128`), so the result does not
//! depend on input order: any permutation of the same observations produces
//! the same [`TrendSet`]. Rounding to whole currency units is half-up and
//! done on the integers.
//!
//! Each price is first quantized to the nearest micro-unit, so sub-micro
//! fractions can move a mean across the half-unit boundary: `0.4999996`
//! becomes `0.500000` and reports `1`. Currency prices never carry that many
//! decimals.
//!
//! ## Dirty input
//! Malformed observations are skipped and counted in
//! [`DropReport`](crate::models::DropReport). The only call-level failure is
//! an unknown unit string ([`TrendError::InvalidUnit`]).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    bucket::{BucketKey, bucketize},
    error::TrendError,
    models::{Aggregation, DropReport, Observation, Point, Series, TrendSet},
    tz::TimeBasis,
    unit::TrendUnit,
};

const MICROS_PER_UNIT: i128 = 1_000_000;

/// Running sum and count for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceAccumulator {
    sum_micros: i128,
    count: u64,
}

impl PriceAccumulator {
    /// Add one price. Callers pass prices that passed
    /// [`is_valid_price`](crate::models::is_valid_price).
    pub fn push(&mut self, price: f64) {
        self.sum_micros += (price * MICROS_PER_UNIT as f64).round() as i128;
        self.count += 1;
    }

    /// Fold another accumulator in; the combined mean is count-weighted.
    pub fn merge(&mut self, other: PriceAccumulator) {
        self.sum_micros += other.sum_micros;
        self.count += other.count;
    }

    /// Number of prices accumulated.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean rounded half-up to a whole unit; `None` when empty.
    pub fn mean_rounded(&self) -> Option<i64> {
        if self.count == 0 {
            return None;
        }
        let denom = i128::from(self.count) * MICROS_PER_UNIT;
        // floor(sum / denom + 1/2)
        let value = (2 * self.sum_micros + denom).div_euclid(2 * denom);
        i64::try_from(value).ok()
    }
}

/// Aggregates observations into per-store series in one calendar basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aggregator {
    basis: TimeBasis,
}

impl Aggregator {
    /// Aggregator truncating buckets in `basis`.
    pub const fn new(basis: TimeBasis) -> Self {
        Self { basis }
    }

    /// Calendar used for truncation.
    pub const fn basis(&self) -> TimeBasis {
        self.basis
    }

    /// Bucket, average, and group `observations` by `unit`.
    ///
    /// Never fails: malformed records are dropped and counted.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(unit = %unit, basis = %self.basis, observations = observations.len())
    )]
    pub fn aggregate(&self, observations: &[Observation], unit: TrendUnit) -> Aggregation {
        let mut dropped = DropReport::default();
        let mut buckets: IndexMap<BucketKey, PriceAccumulator> = IndexMap::new();

        for obs in observations {
            match bucketize(obs, unit, self.basis) {
                Ok(key) => buckets.entry(key).or_default().push(obs.price),
                Err(reason) => dropped.record(reason),
            }
        }

        if dropped.total() > 0 {
            warn!(
                dropped = dropped.total(),
                missing_timestamp = dropped.missing_timestamp,
                bad_timestamp = dropped.bad_timestamp,
                bad_price = dropped.bad_price,
                empty_store = dropped.empty_store,
                "skipped malformed observations"
            );
        }

        let bucket_count = buckets.len();
        let trends = build_trends(buckets);
        debug!(buckets = bucket_count, stores = trends.len(), "aggregated trend");

        Aggregation {
            unit,
            basis: self.basis,
            trends,
            dropped,
        }
    }

    /// Like [`Aggregator::aggregate`], parsing the unit literal first.
    ///
    /// Errors:
    /// - [`TrendError::InvalidUnit`] when `unit` is not `hour`, `day`, or `week`;
    ///   no observation is looked at in that case.
    pub fn aggregate_str(
        &self,
        observations: &[Observation],
        unit: &str,
    ) -> Result<Aggregation, TrendError> {
        let unit: TrendUnit = unit.parse()?;
        Ok(self.aggregate(observations, unit))
    }
}

/// [`Aggregator::aggregate`] in the UTC basis.
pub fn aggregate(observations: &[Observation], unit: TrendUnit) -> Aggregation {
    Aggregator::default().aggregate(observations, unit)
}

/// [`Aggregator::aggregate_str`] in the UTC basis.
pub fn aggregate_str(observations: &[Observation], unit: &str) -> Result<Aggregation, TrendError> {
    Aggregator::default().aggregate_str(observations, unit)
}

fn build_trends(buckets: IndexMap<BucketKey, PriceAccumulator>) -> TrendSet {
    let mut per_store: IndexMap<String, Vec<(DateTime<Utc>, PriceAccumulator)>> = IndexMap::new();
    for (key, acc) in buckets {
        per_store.entry(key.store).or_default().push((key.anchor, acc));
    }

    let mut set = TrendSet::default();
    for (store, buckets) in per_store {
        let points = assemble_points(buckets);
        if !points.is_empty() {
            set.insert(Series { store, points });
        }
    }
    set
}

/// Sort by time and collapse equal times by merging their accumulators.
fn assemble_points(mut buckets: Vec<(DateTime<Utc>, PriceAccumulator)>) -> Vec<Point> {
    buckets.sort_by_key(|(time, _)| *time);

    let mut merged: Vec<(DateTime<Utc>, PriceAccumulator)> = Vec::with_capacity(buckets.len());
    for (time, acc) in buckets {
        match merged.last_mut() {
            Some((last, into)) if *last == time => into.merge(acc),
            _ => merged.push((time, acc)),
        }
    }

    merged
        .into_iter()
        .filter_map(|(time, acc)| {
            Some(Point {
                time,
                value: acc.mean_rounded()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn acc(prices: &[f64]) -> PriceAccumulator {
        let mut a = PriceAccumulator::default();
        for p in prices {
            a.push(*p);
        }
        a
    }

    #[test]
    fn mean_rounds_half_up() {
        assert_eq!(acc(&[100.0, 200.0, 300.0]).mean_rounded(), Some(200));
        assert_eq!(acc(&[550.0, 551.0]).mean_rounded(), Some(551));
        assert_eq!(acc(&[10.0, 10.0, 11.0]).mean_rounded(), Some(10));
        assert_eq!(acc(&[0.49]).mean_rounded(), Some(0));
        assert_eq!(acc(&[0.5]).mean_rounded(), Some(1));
        assert_eq!(PriceAccumulator::default().mean_rounded(), None);
    }

    #[test]
    fn prices_are_quantized_to_micro_units() {
        assert_eq!(acc(&[0.4999996]).mean_rounded(), Some(1));
        assert_eq!(acc(&[0.4999994]).mean_rounded(), Some(0));
        assert_eq!(acc(&[0.499999]).mean_rounded(), Some(0));
        assert_eq!(acc(&[99.99, 100.01]).mean_rounded(), Some(100));
    }

    #[test]
    fn padded_store_names_join_the_trimmed_series() {
        let obs = vec![
            Observation::new("X", "2024-01-01T10:15:00Z", 500.0),
            Observation::new(" X ", "2024-01-01T10:45:00Z", 600.0),
            Observation::new("X\t", "2024-01-01T11:05:00Z", 700.0),
        ];
        let out = aggregate(&obs, TrendUnit::Hour);
        assert_eq!(out.trends.stores().collect::<Vec<_>>(), vec!["X"]);
        let values: Vec<i64> = out.trends.get("X").unwrap().points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![550, 700]);
    }

    #[test]
    fn averages_one_bucket() {
        let obs = vec![
            Observation::new("A", "2024-01-01T10:05:00Z", 100.0),
            Observation::new("A", "2024-01-01T10:25:00Z", 200.0),
            Observation::new("A", "2024-01-01T10:55:00Z", 300.0),
        ];
        let out = aggregate(&obs, TrendUnit::Hour);
        let a = out.trends.get("A").unwrap();
        assert_eq!(
            a.points,
            vec![Point {
                time: utc(2024, 1, 1, 10, 0, 0),
                value: 200
            }]
        );
        assert!(a.needs_emphasis());
    }

    #[test]
    fn hour_scenario_two_stores() {
        let obs = vec![
            Observation::new("X", "2024-01-01T10:15:00Z", 500.0),
            Observation::new("X", "2024-01-01T10:45:00Z", 600.0),
            Observation::new("Y", "2024-01-01T10:05:00Z", 700.0),
        ];
        let out = aggregate_str(&obs, "hour").unwrap();
        let ten = utc(2024, 1, 1, 10, 0, 0);
        assert_eq!(out.trends.stores().collect::<Vec<_>>(), vec!["X", "Y"]);
        assert_eq!(out.trends.get("X").unwrap().points, vec![Point { time: ten, value: 550 }]);
        assert_eq!(out.trends.get("Y").unwrap().points, vec![Point { time: ten, value: 700 }]);
        assert_eq!(out.dropped.total(), 0);
    }

    #[test]
    fn malformed_records_are_dropped_not_fatal() {
        let obs = vec![
            Observation::new("A", "2024-01-01T00:00:00Z", 100.0),
            Observation::new("A", "2024-01-02T00:00:00Z", 200.0),
            Observation::new("A", "2024-01-03T00:00:00Z", -5.0),
            Observation::new("A", "2024-01-04T00:00:00Z", 400.0),
            Observation::new("A", "2024-01-05T00:00:00Z", 500.0),
        ];
        let out = aggregate(&obs, TrendUnit::Day);
        let values: Vec<i64> = out.trends.get("A").unwrap().points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![100, 200, 400, 500]);
        assert_eq!(out.dropped.bad_price, 1);
    }

    #[test]
    fn stores_without_survivors_are_omitted() {
        let obs = vec![
            Observation::new("A", "2024-01-01T00:00:00Z", 100.0),
            Observation::new("B", "garbage", 100.0),
            Observation::new("C", "2024-01-01T00:00:00Z", f64::NAN),
        ];
        let out = aggregate(&obs, TrendUnit::Week);
        assert_eq!(out.trends.len(), 1);
        assert!(out.trends.get("B").is_none());
        assert!(out.trends.get("C").is_none());
        assert_eq!(out.dropped.bad_timestamp, 1);
        assert_eq!(out.dropped.bad_price, 1);
    }

    #[test]
    fn invalid_unit_rejects_whole_call() {
        let obs = vec![Observation::new("A", "2024-01-01T00:00:00Z", 1.0)];
        assert_eq!(
            aggregate_str(&obs, "month"),
            Err(TrendError::InvalidUnit("month".into()))
        );
    }

    #[test]
    fn empty_input_is_empty_result() {
        let out = aggregate(&[], TrendUnit::Day);
        assert!(out.trends.is_empty());
        assert_eq!(out.dropped, DropReport::default());
    }

    #[test]
    fn series_are_sorted_by_time() {
        let obs = vec![
            Observation::new("A", "2024-01-03T08:00:00Z", 30.0),
            Observation::new("A", "2024-01-01T08:00:00Z", 10.0),
            Observation::new("A", "2024-01-02T08:00:00Z", 20.0),
        ];
        let out = aggregate(&obs, TrendUnit::Day);
        let times: Vec<_> = out.trends.get("A").unwrap().points.iter().map(|p| p.time).collect();
        assert_eq!(
            times,
            vec![
                utc(2024, 1, 1, 0, 0, 0),
                utc(2024, 1, 2, 0, 0, 0),
                utc(2024, 1, 3, 0, 0, 0)
            ]
        );
    }

    #[test]
    fn equal_times_merge_by_weighted_mean() {
        let t = utc(2024, 1, 1, 0, 0, 0);
        let later = utc(2024, 1, 2, 0, 0, 0);
        let points = assemble_points(vec![
            (later, acc(&[50.0])),
            (t, acc(&[100.0])),
            (t, acc(&[200.0, 200.0, 200.0])),
        ]);
        assert_eq!(
            points,
            vec![Point { time: t, value: 175 }, Point { time: later, value: 50 }]
        );
    }

    #[test]
    fn zone_aggregator_reports_its_basis() {
        let basis: TimeBasis = "Asia/Kolkata".parse().unwrap();
        let obs = vec![
            Observation::new("A", "2024-01-01T17:00:00Z", 100.0), // 22:30 IST Jan 1
            Observation::new("A", "2024-01-01T20:00:00Z", 300.0), // 01:30 IST Jan 2
        ];
        let out = Aggregator::new(basis).aggregate(&obs, TrendUnit::Day);
        assert_eq!(out.basis, basis);
        assert_eq!(out.trends.get("A").unwrap().points.len(), 2);
        // same input in UTC shares one day
        assert_eq!(aggregate(&obs, TrendUnit::Day).trends.get("A").unwrap().points.len(), 1);
    }
}
