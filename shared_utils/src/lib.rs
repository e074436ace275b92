//! Small helpers shared across the workspace crates.

pub mod config;
pub mod env;

pub use config::ConfigError;
pub use env::{get_env_var_opt, parse_env_var};
