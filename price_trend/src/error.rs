//! Error types for the trend pipeline.
//!
//! Two tiers:
//! - [`TrendError`] rejects a whole call (caller bugs such as an unknown unit).
//! - [`Malformed`] describes why a single observation was dropped. It is never
//!   returned from aggregation; it is only counted in a
//!   [`DropReport`](crate::models::DropReport).

use thiserror::Error;

/// Call-level failures of the aggregator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrendError {
    /// The unit selector is not one of `hour`, `day`, `week`.
    #[error("invalid trend unit {0:?} (expected one of: hour, day, week)")]
    InvalidUnit(String),
}

/// Reasons an individual observation is skipped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Malformed {
    /// No timestamp was supplied.
    #[error("missing timestamp")]
    MissingTimestamp,
    /// The timestamp could not be parsed into an instant.
    #[error("unparseable timestamp")]
    BadTimestamp,
    /// Negative, NaN, infinite, or out-of-range price.
    #[error("invalid price")]
    BadPrice,
    /// Store identifier is missing, not a string, or blank after trimming.
    #[error("empty store identifier")]
    EmptyStore,
}

/// Timestamp parsing failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// The string matched none of the accepted layouts.
    #[error("unrecognized timestamp: {0:?}")]
    Unrecognized(String),
    /// The epoch value does not fit in the supported calendar range.
    #[error("epoch value out of range: {0}")]
    OutOfRange(String),
}

/// Failures of [`summarize`](crate::analytics::summarize).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// Fewer than two valid observations survived filtering.
    #[error("not enough price history available (found {found} valid observations)")]
    NotEnoughHistory {
        /// Number of valid observations found.
        found: usize,
    },
}

/// Caller-side size precondition from [`TrendConfig`](crate::config::TrendConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{len} observations exceed the configured maximum of {max}")]
pub struct InputTooLarge {
    /// Observations supplied.
    pub len: usize,
    /// Configured `max_observations`.
    pub max: usize,
}
