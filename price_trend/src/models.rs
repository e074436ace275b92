//! Input and output shapes of the trend pipeline.
//!
//! - [`Observation`] — one raw `(store, timestamp, price)` sample as delivered
//!   by the backend (`price_trend` records).
//! - [`Point`] / [`Series`] — one store's aggregated, time-ascending samples.
//! - [`TrendSet`] — store → series, in first-appearance order; serializes as
//!   `{ "<store>": [ { "time": .., "value": .. } ] }` for the chart layer.
//! - [`Aggregation`] — a trend set plus the unit, basis, and drop counts.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use serde_json::Value;

use crate::{
    error::{Malformed, TimestampError},
    tz::{TimeBasis, epoch_to_utc, parse_ts_to_utc},
    unit::TrendUnit,
};

/// Timestamp exactly as received: a string in one of the accepted layouts, or
/// a bare epoch number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Epoch seconds or milliseconds.
    Epoch(f64),
    /// RFC-3339, naive ISO-8601, or a decimal epoch string.
    Text(String),
}

impl RawTimestamp {
    /// Parse into a UTC instant.
    pub fn to_utc(&self) -> Result<DateTime<Utc>, TimestampError> {
        match self {
            RawTimestamp::Epoch(v) => epoch_to_utc(*v),
            RawTimestamp::Text(s) => parse_ts_to_utc(s),
        }
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        RawTimestamp::Text(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

impl From<String> for RawTimestamp {
    fn from(value: String) -> Self {
        RawTimestamp::Text(value)
    }
}

/// One price sample for one store.
///
/// Deserialization never fails on a record's contents. A field of the wrong
/// shape becomes a value [`Observation::validated`] rejects, so one dirty
/// record is dropped and counted instead of failing the whole batch:
/// - `store` missing or not a string: empty store.
/// - `price` missing, `null`, or not a number (numeric strings are read):
///   `NaN` price.
/// - `timestamp` missing or `null`: no timestamp; any other non-string,
///   non-number value is kept as text and fails to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct Observation {
    /// Store identifier (e.g. "Amazon", "Flipkart").
    pub store: String,
    /// When the price was seen; `None` when the record had no timestamp.
    pub timestamp: Option<RawTimestamp>,
    /// Price in the call's single currency unit.
    pub price: f64,
}

impl Observation {
    /// Build an observation with a timestamp.
    pub fn new(store: impl Into<String>, timestamp: impl Into<RawTimestamp>, price: f64) -> Self {
        Self {
            store: store.into(),
            timestamp: Some(timestamp.into()),
            price,
        }
    }

    /// Validate the fields shared by every consumer and return the parsed
    /// instant together with the trimmed store name.
    ///
    /// Series are keyed on the trimmed name, so `" X "` and `"X"` are one store.
    pub fn validated(&self) -> Result<(&str, DateTime<Utc>), Malformed> {
        let store = self.store.trim();
        if store.is_empty() {
            return Err(Malformed::EmptyStore);
        }
        if !is_valid_price(self.price) {
            return Err(Malformed::BadPrice);
        }
        let ts = self
            .timestamp
            .as_ref()
            .ok_or(Malformed::MissingTimestamp)?
            .to_utc()
            .map_err(|_| Malformed::BadTimestamp)?;
        Ok((store, ts))
    }
}

impl From<Value> for Observation {
    fn from(record: Value) -> Self {
        let store = field(&record, "store")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let timestamp = field(&record, "timestamp").map(|v| match v {
            Value::Number(n) => n
                .as_f64()
                .map_or_else(|| RawTimestamp::Text(n.to_string()), RawTimestamp::Epoch),
            Value::String(s) => RawTimestamp::Text(s.clone()),
            other => RawTimestamp::Text(other.to_string()),
        });
        let price = field(&record, "price")
            .and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .unwrap_or(f64::NAN);
        Self {
            store,
            timestamp,
            price,
        }
    }
}

/// Non-null member of a JSON object; `None` for non-objects.
fn field<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    record.get(name).filter(|v| !v.is_null())
}

/// Largest accepted price. Keeps the micro-unit sums far from `i128` overflow.
pub const MAX_PRICE: f64 = 1e18;

/// Finite, non-negative, and at most [`MAX_PRICE`].
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && (0.0..=MAX_PRICE).contains(&price)
}

/// One aggregated sample: bucket anchor and rounded mean price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Start of the bucket.
    pub time: DateTime<Utc>,
    /// Mean price, rounded half-up to a whole currency unit.
    pub value: i64,
}

/// One store's points, strictly ascending by `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    /// Store identifier.
    pub store: String,
    /// Time-ascending points with unique times.
    pub points: Vec<Point>,
}

impl Series {
    /// Series short enough that a line renderer should draw its markers
    /// larger (two points or fewer).
    pub fn needs_emphasis(&self) -> bool {
        self.points.len() <= 2
    }

    /// First and last anchor, if any.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.points.first()?.time, self.points.last()?.time))
    }
}

/// Store → series, in order of first appearance.
///
/// Equality ignores store order; only the per-store series are compared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendSet {
    series: IndexMap<String, Series>,
}

impl TrendSet {
    pub(crate) fn insert(&mut self, series: Series) {
        self.series.insert(series.store.clone(), series);
    }

    /// Series for `store`.
    pub fn get(&self, store: &str) -> Option<&Series> {
        self.series.get(store)
    }

    /// Number of stores with at least one point.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// True when no observation survived filtering.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Store names in first-appearance order.
    pub fn stores(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Series in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.values()
    }
}

impl Serialize for TrendSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.series.len()))?;
        for (store, series) in &self.series {
            map.serialize_entry(store, &series.points)?;
        }
        map.end()
    }
}

/// Per-reason counts of observations that were skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropReport {
    /// No timestamp supplied.
    pub missing_timestamp: usize,
    /// Timestamp did not parse.
    pub bad_timestamp: usize,
    /// Negative, non-finite, or out-of-range price.
    pub bad_price: usize,
    /// Missing, non-string, or blank store identifier.
    pub empty_store: usize,
}

impl DropReport {
    /// Count one dropped observation.
    pub fn record(&mut self, reason: Malformed) {
        match reason {
            Malformed::MissingTimestamp => self.missing_timestamp += 1,
            Malformed::BadTimestamp => self.bad_timestamp += 1,
            Malformed::BadPrice => self.bad_price += 1,
            Malformed::EmptyStore => self.empty_store += 1,
        }
    }

    /// Total dropped observations.
    pub fn total(&self) -> usize {
        self.missing_timestamp + self.bad_timestamp + self.bad_price + self.empty_store
    }
}

/// Result of one aggregation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    /// Bucket granularity used.
    pub unit: TrendUnit,
    /// Calendar the buckets were truncated in.
    pub basis: TimeBasis,
    /// Per-store series.
    pub trends: TrendSet,
    /// What was skipped and why.
    pub dropped: DropReport,
}
