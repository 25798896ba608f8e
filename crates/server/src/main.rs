//! Flight Server - price and delay prediction API
//!
//! Loads both trained artifacts once at startup and serves predictions
//! until interrupted. A failed artifact load exits before the listener binds.

use anyhow::{Context, Result};
use flight_lib::{
    health::{components, HealthRegistry},
    observability::{PredictorMetrics, StructuredLogger},
    ModelVariant, ServingContext,
};
use flight_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting flight-server");

    let config = ServerConfig::load()?;
    info!(
        instance = %config.instance_name,
        model_dir = %config.model_dir.display(),
        "Server configured"
    );

    let logger = StructuredLogger::new(&config.instance_name);
    let metrics = PredictorMetrics::new();
    let health_registry = HealthRegistry::new();

    let context = ServingContext::load(&config.artifact_config())
        .context("failed to load model artifacts")?;

    for variant in ModelVariant::ALL {
        let info = context.model_info(variant);
        let family = info.model_family.as_str();
        metrics.set_model_info(variant, &info.model_version, family);
        logger.log_artifact_loaded(variant, &info.model_version, family);
        health_registry.register(components::for_variant(variant)).await;
    }
    health_registry.set_ready(true).await;

    let addr = config.listen_address();
    let app_state = Arc::new(api::AppState::new(
        Arc::new(context),
        health_registry,
        metrics,
        logger.clone(),
    ));

    logger.log_startup(SERVER_VERSION, &addr);
    api::serve(&addr, app_state, shutdown_signal()).await?;
    logger.log_shutdown("SIGINT received");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
