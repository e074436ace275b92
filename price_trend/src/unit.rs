//! Trend bucket granularity.
//!
//! [`TrendUnit`] is the closed set of bucket sizes a trend chart can be
//! toggled between. The UI hands over a literal string; parsing it is the one
//! place where an unknown unit turns into [`TrendError::InvalidUnit`].
//!
//! ```
//! use price_trend::unit::TrendUnit;
//!
//! let unit: TrendUnit = "week".parse().unwrap();
//! assert_eq!(unit, TrendUnit::Week);
//! assert_eq!(unit.to_string(), "week");
//! assert!("month".parse::<TrendUnit>().is_err());
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TrendError;

/// Bucket granularity for a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendUnit {
    /// Wall-clock hour.
    Hour,
    /// Calendar day, starting at midnight.
    Day,
    /// ISO week, starting Monday at midnight.
    Week,
}

impl TrendUnit {
    /// All units, in increasing width.
    pub const ALL: [TrendUnit; 3] = [TrendUnit::Hour, TrendUnit::Day, TrendUnit::Week];

    /// Literal used on the wire and in config files.
    pub const fn as_str(self) -> &'static str {
        match self {
            TrendUnit::Hour => "hour",
            TrendUnit::Day => "day",
            TrendUnit::Week => "week",
        }
    }
}

impl fmt::Display for TrendUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendUnit {
    type Err = TrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(TrendUnit::Hour),
            "day" => Ok(TrendUnit::Day),
            "week" => Ok(TrendUnit::Week),
            other => Err(TrendError::InvalidUnit(other.to_string())),
        }
    }
}
