//! StockPulse Server - Headless prediction API
//!
//! Loads every artifact listed in the serving manifest, then serves the
//! movement, sentiment and relevance endpoints. The listener is only bound
//! once all artifacts have loaded; a missing artifact aborts startup.
//!
//! # Usage
//! ```sh
//! MANIFEST_PATH=models/serving.toml cargo run --bin server
//! ```
//!
//! # Environment Variables
//! - `BIND_ADDR` - Listen address (default: 127.0.0.1:5000)
//! - `ARTIFACT_DIR` - Directory holding `<artifact id>.json` files (default: models)
//! - `MANIFEST_PATH` - Serving manifest (default: $ARTIFACT_DIR/serving.toml)
//! - `REQUEST_TIMEOUT_MS` - Per-request inference timeout (default: 5000)
//! - `MAX_CONCURRENT_INFERENCES` - Inferences allowed on the blocking pool (default: 16)

use anyhow::{Context, Result};
use std::sync::Arc;
use stockpulse::application::ml::families::FittedModel;
use stockpulse::application::serving::manifest::ServingManifest;
use stockpulse::application::serving::registry::ArtifactRegistry;
use stockpulse::application::serving::service::PredictionService;
use stockpulse::config::ServingEnvConfig;
use stockpulse::infrastructure::{ArtifactStore, FsBlobStore};
use stockpulse::interfaces::http;
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Setup logging
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("StockPulse Server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = ServingEnvConfig::from_env()?;
    info!(
        "Configuration loaded: Manifest={:?}, Artifacts={:?}, Timeout={}ms, Max inferences={}",
        config.manifest_path,
        config.artifact_dir,
        config.request_timeout_ms,
        config.max_concurrent_inferences
    );

    // Loading: every listed artifact must deserialize before we accept traffic
    let manifest = ServingManifest::load(&config.manifest_path)
        .with_context(|| format!("Failed to load manifest {:?}", config.manifest_path))?;
    let store = ArtifactStore::new(Arc::new(
        FsBlobStore::open(&config.artifact_dir).context("Failed to open artifact directory")?,
    ));
    let registry: ArtifactRegistry<FittedModel> =
        ArtifactRegistry::load(&manifest, &store).context("Failed to load serving artifacts")?;
    info!("Loaded {} models", registry.len());

    let service = Arc::new(
        PredictionService::new(Arc::new(registry), config.request_timeout())
            .with_max_concurrency(config.max_concurrent_inferences),
    );

    // Ready
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    http::serve(listener, service, async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received. Exiting...");
    })
    .await?;

    Ok(())
}
