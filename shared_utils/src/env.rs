use std::{env::VarError, fmt::Display, str::FromStr};

use crate::config::ConfigError;

/// Reads an optional environment variable.
///
/// Unset and blank values both yield `Ok(None)`. A value that is not valid
/// unicode is reported as [`ConfigError::InvalidEnvVar`] rather than ignored.
pub fn get_env_var_opt(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => Ok(Some(v.trim().to_string())),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvVar {
            name: name.to_string(),
            reason: "not valid unicode".into(),
        }),
    }
}

/// Reads and parses an optional environment variable with [`FromStr`].
pub fn parse_env_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = get_env_var_opt(name)? else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidEnvVar {
            name: name.to_string(),
            reason: format!("{raw:?}: {e}"),
        })
}
