//! Trend configuration: parsing, validation, and environment overrides.
//!
//! The TOML file has a single `[trend]` table:
//!
//! ```toml
//! [trend]
//! unit = "day"               # default unit when the caller gives none
//! basis = "Asia/Kolkata"     # "utc" (default) or any IANA zone
//! max_observations = 100000  # optional input-size precondition
//! ```
//!
//! Key behaviors:
//! - Every key is optional; unknown keys are rejected.
//! - `max_observations = 0` is rejected; leave it out for no limit.
//! - `PRICE_TREND_UNIT`, `PRICE_TREND_BASIS` and
//!   `PRICE_TREND_MAX_OBSERVATIONS` override the file when set.
//!
//! Entrypoints:
//! - Parse from a TOML string: [`load_config_str`]
//! - Parse from a file path: [`load_config_path`]
//! - Optional file + environment, as the CLI does it: [`resolve_config`]
//!
//! Precedence, lowest first: defaults, file, environment, and finally
//! per-request flags through [`TrendConfig::with_overrides`].

use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use shared_utils::{ConfigError, parse_env_var};
use tracing::debug;

use crate::{aggregate::Aggregator, error::InputTooLarge, tz::TimeBasis, unit::TrendUnit};

/// Environment variable overriding [`TrendConfig::unit`].
pub const ENV_UNIT: &str = "PRICE_TREND_UNIT";
/// Environment variable overriding [`TrendConfig::basis`].
pub const ENV_BASIS: &str = "PRICE_TREND_BASIS";
/// Environment variable overriding [`TrendConfig::max_observations`].
pub const ENV_MAX_OBSERVATIONS: &str = "PRICE_TREND_MAX_OBSERVATIONS";

/// Top-level file layout.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    trend: TrendConfig,
}

/// Settings for one trend front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TrendConfig {
    /// Unit used when a request does not name one.
    pub unit: TrendUnit,
    /// Calendar basis for bucket truncation.
    pub basis: TimeBasis,
    /// Largest input the caller accepts; `None` means unlimited.
    pub max_observations: Option<usize>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            unit: TrendUnit::Day,
            basis: TimeBasis::Utc,
            max_observations: None,
        }
    }
}

impl TrendConfig {
    /// Reject values the type system lets through.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_observations == Some(0) {
            bail!("max_observations must be > 0 (omit it for no limit)");
        }
        Ok(())
    }

    /// Apply `PRICE_TREND_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(unit) = parse_env_var::<TrendUnit>(ENV_UNIT)? {
            debug!(%unit, "unit overridden from environment");
            self.unit = unit;
        }
        if let Some(basis) = parse_env_var::<TimeBasis>(ENV_BASIS)? {
            debug!(%basis, "basis overridden from environment");
            self.basis = basis;
        }
        if let Some(max) = parse_env_var::<usize>(ENV_MAX_OBSERVATIONS)? {
            debug!(max, "max_observations overridden from environment");
            self.max_observations = Some(max);
        }
        Ok(())
    }

    /// Apply per-request overrides (CLI flags) on top of file and environment.
    pub fn with_overrides(mut self, unit: Option<TrendUnit>, basis: Option<TimeBasis>) -> Self {
        if let Some(unit) = unit {
            self.unit = unit;
        }
        if let Some(basis) = basis {
            self.basis = basis;
        }
        self
    }

    /// Aggregator configured with this basis.
    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(self.basis)
    }

    /// Enforce `max_observations` before handing input to the aggregator.
    pub fn check_input_len(&self, len: usize) -> Result<(), InputTooLarge> {
        match self.max_observations {
            Some(max) if len > max => Err(InputTooLarge { len, max }),
            _ => Ok(()),
        }
    }
}

/// Parse and validate a config from a TOML string.
///
/// Errors:
/// - TOML syntax errors, unknown keys, unknown unit or zone names
/// - `max_observations = 0`
pub fn load_config_str(toml_str: &str) -> anyhow::Result<TrendConfig> {
    let file: ConfigFile = toml::from_str(toml_str).context("failed to parse trend config TOML")?;
    file.trend.validate()?;
    Ok(file.trend)
}

/// Read a config TOML file from disk, parse, and validate it.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<TrendConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text).with_context(|| format!("in {}", path.as_ref().display()))
}

/// Optional file (defaults when `None`), then environment overrides.
pub fn resolve_config(path: Option<&Path>) -> anyhow::Result<TrendConfig> {
    let mut cfg = match path {
        Some(p) => load_config_path(p)?,
        None => TrendConfig::default(),
    };
    cfg.apply_env_overrides()
        .context("invalid PRICE_TREND_* environment override")?;
    cfg.validate()?;
    Ok(cfg)
}
