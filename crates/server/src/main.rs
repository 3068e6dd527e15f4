//! Tuning server - PostgreSQL configuration over HTTP
//!
//! Accepts resource descriptions, consults timescaledb-tune when it is
//! installed and otherwise answers with heuristic estimates.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tuner_lib::{
    health::{components, HealthRegistry},
    observability::{StructuredLogger, TunerMetrics},
    ResourceSpecValidator, TuningEngine,
};
use tuner_server::{api, config::ServerConfig};

const TUNER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting tuner-server");

    let config = ServerConfig::load()?;
    info!(
        instance = %config.instance_name,
        oracle = %config.oracle_program,
        timeout_secs = config.oracle_timeout_secs,
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ORACLE).await;
    health_registry.register(components::ENGINE).await;

    let metrics = TunerMetrics::new();

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(TUNER_VERSION, &config.oracle_program);

    let engine = TuningEngine::builder(config.oracle_settings())
        .validator(ResourceSpecValidator::with_limits(
            config.validation_limits()?,
        ))
        .build();
    let limits = engine.validator().limits();
    info!(
        max_memory_mb = limits.memory_mb.1,
        max_cpus = limits.cpus.1,
        max_connections = limits.max_connections.1,
        "Request limits"
    );

    let app_state = Arc::new(api::AppState::new(
        engine,
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));

    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API listener on {}", addr))?;

    health_registry.set_ready(true).await;

    let shutdown_logger = logger.clone();
    let shutdown = async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for shutdown signal");
            return;
        }
        shutdown_logger.log_shutdown("SIGINT received");
    };

    match tokio::spawn(api::serve_on(listener, app_state, shutdown)).await {
        Ok(Ok(())) => {
            info!("Shutting down");
            Ok(())
        }
        Ok(Err(err)) => {
            let reason = format!("API server failed: {}", err);
            error!(reason = %reason, "API server exited");
            logger.log_shutdown(&reason);
            Err(err)
        }
        Err(err) => {
            let reason = format!("API server task panicked: {}", err);
            error!(reason = %reason, "API server exited");
            logger.log_shutdown(&reason);
            anyhow::bail!(reason)
        }
    }
}
