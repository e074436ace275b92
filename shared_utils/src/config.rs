use thiserror::Error;

/// Errors related to application configuration sourced from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is set but its value could not be interpreted.
    #[error("Invalid value for environment variable {name}: {reason}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}
