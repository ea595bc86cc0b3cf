//! Serving configuration parsing from environment variables.

use super::parse_env;
use crate::application::serving::service::{DEFAULT_MAX_CONCURRENT_INFERENCES, DEFAULT_REQUEST_TIMEOUT_MS};
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Serving environment configuration
#[derive(Debug, Clone)]
pub struct ServingEnvConfig {
    pub bind_addr: SocketAddr,
    pub artifact_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub request_timeout_ms: u64,
    /// Upper bound on inferences occupying the blocking pool.
    pub max_concurrent_inferences: usize,
}

impl Default for ServingEnvConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            artifact_dir: PathBuf::from("models"),
            manifest_path: PathBuf::from("models/serving.toml"),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_concurrent_inferences: DEFAULT_MAX_CONCURRENT_INFERENCES,
        }
    }
}

impl ServingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let artifact_dir = env::var("ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.artifact_dir);

        Ok(Self {
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| defaults.bind_addr.to_string())
                .parse::<SocketAddr>()
                .context("Failed to parse BIND_ADDR")?,
            manifest_path: env::var("MANIFEST_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| artifact_dir.join("serving.toml")),
            request_timeout_ms: parse_env("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
            max_concurrent_inferences: parse_env(
                "MAX_CONCURRENT_INFERENCES",
                defaults.max_concurrent_inferences,
            )?,
            artifact_dir,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
