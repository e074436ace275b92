//! Time-bucketed multi-store price trends.
//!
//! Turns an unordered stream of `(store, timestamp, price)` observations into
//! one chronologically ordered, bucket-averaged series per store, ready for a
//! line chart. See [`aggregate::Aggregator`] for the entrypoint and
//! [`analytics::summarize`] for the summary figures shown alongside.

#![deny(missing_docs)]

pub mod aggregate;
pub mod analytics;
pub mod board;
pub mod bucket;
pub mod config;
pub mod error;
pub mod input;
pub mod models;
pub mod tz;
pub mod unit;

pub use aggregate::{Aggregator, aggregate, aggregate_str};
pub use error::TrendError;
pub use models::{Aggregation, Observation, Point, Series, TrendSet};
pub use unit::TrendUnit;
