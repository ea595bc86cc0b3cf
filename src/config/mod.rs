//! Configuration module for StockPulse.
//!
//! Structured configuration loading from environment variables, split by
//! binary: training and serving. Parameter grids can additionally come from
//! a TOML file.

mod grid_config;
mod serving_config;
mod training_config;

pub use grid_config::GridConfig;
pub use serving_config::ServingEnvConfig;
pub use training_config::TrainingEnvConfig;

use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Parses `key` from the environment, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .context(format!("Failed to parse {}", key))
}

/// Like [`parse_env`] for settings without a default.
fn parse_optional_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .context(format!("Failed to parse {}", key)),
        _ => Ok(None),
    }
}
