#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use price_trend::{Observation, TrendSet};

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

pub fn obs(store: &str, ts: &str, price: f64) -> Observation {
    Observation::new(store, ts, price)
}

/// `(time, value)` pairs of one store's series, for compact assertions.
pub fn pairs(set: &TrendSet, store: &str) -> Vec<(DateTime<Utc>, i64)> {
    set.get(store)
        .unwrap_or_else(|| panic!("no series for {store}"))
        .points
        .iter()
        .map(|p| (p.time, p.value))
        .collect()
}
