//! Summary statistics over a product's price history.
//!
//! [`summarize`] derives the figures shown next to the trend chart from the
//! same observations the aggregator consumes:
//! - lowest / highest / average price and the store that had the lowest one
//! - the latest price seen per store
//! - volatility (sample standard deviation) and its [`Stability`] band
//! - a [`BuyInsight`] comparing the first and last price of the trailing week
//! - how often each store was the cheapest at a given timestamp
//!
//! Everything is pure: the caller supplies `now`. Amounts are whole currency
//! units truncated toward zero; no user-facing text is produced here.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{error::AnalyticsError, models::Observation};

/// Scores below this are [`Stability::Stable`].
pub const STABLE_BELOW: f64 = 500.0;
/// Scores below this (and not stable) are [`Stability::Moderate`].
pub const MODERATE_BELOW: f64 = 1500.0;
/// Length of the trailing window used for [`BuyInsight`].
pub const INSIGHT_WINDOW_DAYS: i64 = 7;

/// Headline price figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    /// Lowest observed price.
    pub lowest: i64,
    /// Highest observed price.
    pub highest: i64,
    /// Mean of all observed prices.
    pub average: i64,
    /// Store of the lowest price (earliest such observation).
    pub cheapest_store: String,
}

/// Coarse classification of [`Volatility::score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    /// Score below [`STABLE_BELOW`].
    Stable,
    /// Score below [`MODERATE_BELOW`].
    Moderate,
    /// Everything else.
    HighlyVolatile,
}

impl Stability {
    /// Band for a volatility score.
    pub fn from_score(score: f64) -> Self {
        if score < STABLE_BELOW {
            Stability::Stable
        } else if score < MODERATE_BELOW {
            Stability::Moderate
        } else {
            Stability::HighlyVolatile
        }
    }
}

/// Price dispersion across all observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Volatility {
    /// Sample standard deviation, rounded to two decimals.
    pub score: f64,
    /// Band of `score`.
    pub stability: Stability,
}

/// Direction of the price over the trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "trend", content = "amount", rename_all = "snake_case")]
pub enum BuyInsight {
    /// Fewer than two observations inside the window.
    NotEnoughData,
    /// Last price is lower than the first by this amount.
    Dropped(i64),
    /// Last price is higher than the first by this amount.
    Increased(i64),
    /// First and last price are equal in whole units.
    Unchanged,
}

/// Everything [`summarize`] computes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAnalytics {
    /// Headline figures.
    pub summary: PriceSummary,
    /// Latest price per store, ordered by store name.
    pub store_prices: BTreeMap<String, i64>,
    /// Dispersion of all prices.
    pub volatility: Volatility,
    /// Trailing-week direction.
    pub best_time_to_buy: BuyInsight,
    /// Number of timestamps at which each store was the cheapest.
    pub store_consistency: BTreeMap<String, usize>,
}

struct Sample<'a> {
    store: &'a str,
    ts: DateTime<Utc>,
    price: f64,
}

/// Compute [`PriceAnalytics`] for `observations` as of `now`.
///
/// Malformed observations are ignored, exactly as in aggregation.
///
/// Errors:
/// - [`AnalyticsError::NotEnoughHistory`] when fewer than two valid
///   observations remain.
pub fn summarize(
    observations: &[Observation],
    now: DateTime<Utc>,
) -> Result<PriceAnalytics, AnalyticsError> {
    let mut samples: Vec<Sample<'_>> = observations
        .iter()
        .filter_map(|o| {
            let (store, ts) = o.validated().ok()?;
            Some(Sample {
                store,
                ts,
                price: o.price,
            })
        })
        .collect();
    if samples.len() < 2 {
        return Err(AnalyticsError::NotEnoughHistory {
            found: samples.len(),
        });
    }
    // stable: equal timestamps keep input order
    samples.sort_by_key(|s| s.ts);

    Ok(PriceAnalytics {
        summary: headline(&samples),
        store_prices: latest_per_store(&samples),
        volatility: volatility(&samples),
        best_time_to_buy: insight(&samples, now),
        store_consistency: cheapest_counts(&samples),
    })
}

fn whole(amount: f64) -> i64 {
    amount.trunc() as i64
}

fn headline(samples: &[Sample<'_>]) -> PriceSummary {
    let mut cheapest = &samples[0];
    let mut highest = samples[0].price;
    let mut sum = 0.0;
    for s in samples {
        let better_tie = s.price == cheapest.price && s.ts == cheapest.ts && s.store < cheapest.store;
        if s.price < cheapest.price || better_tie {
            cheapest = s;
        }
        highest = highest.max(s.price);
        sum += s.price;
    }
    PriceSummary {
        lowest: whole(cheapest.price),
        highest: whole(highest),
        average: whole(sum / samples.len() as f64),
        cheapest_store: cheapest.store.to_string(),
    }
}

fn latest_per_store(samples: &[Sample<'_>]) -> BTreeMap<String, i64> {
    let mut out = BTreeMap::new();
    // samples are time-ascending, so the last write per store wins
    for s in samples {
        out.insert(s.store.to_string(), whole(s.price));
    }
    out
}

fn volatility(samples: &[Sample<'_>]) -> Volatility {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|s| s.price).sum::<f64>() / n;
    let var = samples.iter().map(|s| (s.price - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let score = (var.sqrt() * 100.0).round() / 100.0;
    Volatility {
        score,
        stability: Stability::from_score(score),
    }
}

fn insight(samples: &[Sample<'_>], now: DateTime<Utc>) -> BuyInsight {
    let since = now - Duration::days(INSIGHT_WINDOW_DAYS);
    let mut recent = samples.iter().filter(|s| s.ts >= since);
    let (Some(first), Some(last)) = (recent.next(), recent.last()) else {
        return BuyInsight::NotEnoughData;
    };
    let diff = whole(last.price - first.price);
    match diff {
        d if d < 0 => BuyInsight::Dropped(-d),
        d if d > 0 => BuyInsight::Increased(d),
        _ => BuyInsight::Unchanged,
    }
}

fn cheapest_counts(samples: &[Sample<'_>]) -> BTreeMap<String, usize> {
    let mut winners: BTreeMap<DateTime<Utc>, &Sample<'_>> = BTreeMap::new();
    for s in samples {
        winners
            .entry(s.ts)
            .and_modify(|w| {
                if s.price < w.price || (s.price == w.price && s.store < w.store) {
                    *w = s;
                }
            })
            .or_insert(s);
    }
    let mut counts = BTreeMap::new();
    for w in winners.values() {
        *counts.entry(w.store.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
    }

    fn history() -> Vec<Observation> {
        vec![
            Observation::new("A", "2024-03-01T10:00:00Z", 1000.0),
            Observation::new("B", "2024-03-01T10:00:00Z", 900.0),
            Observation::new("A", "2024-03-05T10:00:00Z", 1100.0),
            Observation::new("B", "2024-03-05T10:00:00Z", 1200.0),
            Observation::new("A", "2024-03-08T10:00:00Z", 950.7),
            Observation::new("C", "broken", 10.0),
        ]
    }

    #[test]
    fn summary_over_fixed_history() {
        let got = summarize(&history(), now()).unwrap();
        assert_eq!(
            got.summary,
            PriceSummary {
                lowest: 900,
                highest: 1200,
                average: 1030,
                cheapest_store: "B".into(),
            }
        );
        assert_eq!(
            got.store_prices,
            BTreeMap::from([("A".to_string(), 950), ("B".to_string(), 1200)])
        );
        assert_eq!(
            got.store_consistency,
            BTreeMap::from([("A".to_string(), 2), ("B".to_string(), 1)])
        );
        assert_eq!(got.volatility.score, 120.3);
        assert_eq!(got.volatility.stability, Stability::Stable);
        // window starts 2024-03-03: 1100 -> 950.7
        assert_eq!(got.best_time_to_buy, BuyInsight::Dropped(149));
    }

    #[test]
    fn stability_bands() {
        assert_eq!(Stability::from_score(0.0), Stability::Stable);
        assert_eq!(Stability::from_score(499.99), Stability::Stable);
        assert_eq!(Stability::from_score(500.0), Stability::Moderate);
        assert_eq!(Stability::from_score(1499.99), Stability::Moderate);
        assert_eq!(Stability::from_score(1500.0), Stability::HighlyVolatile);
    }

    #[test]
    fn insight_variants() {
        let up = vec![
            Observation::new("A", "2024-03-08T00:00:00Z", 100.0),
            Observation::new("A", "2024-03-09T00:00:00Z", 180.0),
        ];
        assert_eq!(summarize(&up, now()).unwrap().best_time_to_buy, BuyInsight::Increased(80));

        let flat = vec![
            Observation::new("A", "2024-03-08T00:00:00Z", 100.2),
            Observation::new("B", "2024-03-09T00:00:00Z", 100.9),
        ];
        assert_eq!(summarize(&flat, now()).unwrap().best_time_to_buy, BuyInsight::Unchanged);

        let stale = vec![
            Observation::new("A", "2024-01-01T00:00:00Z", 100.0),
            Observation::new("A", "2024-03-09T00:00:00Z", 180.0),
        ];
        assert_eq!(
            summarize(&stale, now()).unwrap().best_time_to_buy,
            BuyInsight::NotEnoughData
        );
    }

    #[test]
    fn needs_two_valid_observations() {
        let obs = vec![
            Observation::new("A", "2024-03-08T00:00:00Z", 100.0),
            Observation::new("A", "2024-03-09T00:00:00Z", -1.0),
        ];
        assert_eq!(
            summarize(&obs, now()),
            Err(AnalyticsError::NotEnoughHistory { found: 1 })
        );
    }

    #[test]
    fn insight_serializes_tagged() {
        let json = serde_json::to_value(BuyInsight::Dropped(149)).unwrap();
        assert_eq!(json, serde_json::json!({"trend": "dropped", "amount": 149}));
        let json = serde_json::to_value(BuyInsight::Unchanged).unwrap();
        assert_eq!(json, serde_json::json!({"trend": "unchanged"}));
    }
}
