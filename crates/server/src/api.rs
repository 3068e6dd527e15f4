//! HTTP API: tuning requests, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tuner_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    FailureKind, FieldIssue, MemoryUnit, Provenance, RawTuneRequest, StructuredLogger,
    TuneResponse, TunerMetrics, TuningEngine, TuningFailure, TuningResult, ValidationError,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: TuningEngine,
    pub health_registry: HealthRegistry,
    pub metrics: TunerMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        engine: TuningEngine,
        health_registry: HealthRegistry,
        metrics: TunerMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            engine,
            health_registry,
            metrics,
            logger,
        }
    }
}

/// Body of `POST /api/tune`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuneRequest {
    #[serde(flatten)]
    pub resources: RawTuneRequest,
    /// "MB" (default) or "GB"
    #[serde(default)]
    pub memory_unit: Option<String>,
}

impl TuneRequest {
    /// Resolve the memory unit so `memory` is expressed in MiB
    pub fn into_raw(self) -> Result<RawTuneRequest, FieldIssue> {
        let unit = match self.memory_unit.as_deref() {
            Some(unit) => unit.parse::<MemoryUnit>()?,
            None => MemoryUnit::default(),
        };
        Ok(self.resources.in_unit(unit))
    }
}

fn invalid_input(issue: FieldIssue) -> TuningResult {
    TuningResult::Failure(TuningFailure::invalid_input(ValidationError {
        issues: vec![issue],
    }))
}

/// HTTP status for a tuning outcome
pub fn status_for(result: &TuningResult) -> StatusCode {
    match result.failure_kind() {
        None => StatusCode::OK,
        Some(FailureKind::InvalidInput) => StatusCode::BAD_REQUEST,
        Some(FailureKind::OracleTimeout) => StatusCode::GATEWAY_TIMEOUT,
        Some(FailureKind::OracleExecutionError) | Some(FailureKind::InternalError) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Generate a configuration for the posted resources
async fn tune(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TuneRequest>, JsonRejection>,
) -> impl IntoResponse {
    let result = match payload {
        Ok(Json(request)) => match request.into_raw() {
            Ok(raw) => state.engine.generate(&raw).await,
            Err(issue) => invalid_input(issue),
        },
        Err(rejection) => invalid_input(FieldIssue::new("body", rejection.body_text())),
    };

    state.metrics.record(&result);
    state.health_registry.observe(&result).await;
    state.logger.log_result(&result);
    if result.provenance() == Some(Provenance::Heuristic) {
        state.logger.log_fallback(state.engine.oracle_program());
    }

    (status_for(&result), Json(TuneResponse::from(&result)))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // heuristic output is still served
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %err, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/tune", post(tune))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API on an already bound listener until `shutdown` resolves.
///
/// Readiness drops as soon as shutdown begins. Once the server stops, for
/// whatever reason, the engine component is marked unhealthy.
pub async fn serve_on<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "Starting API server");

    let registry = state.health_registry.clone();
    let draining = async move {
        shutdown.await;
        registry.set_ready(false).await;
    };

    let served = axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(draining)
        .await;

    let reason = match &served {
        Ok(()) => "API server stopped".to_string(),
        Err(err) => format!("API server failed: {}", err),
    };
    state.health_registry.set_ready(false).await;
    state
        .health_registry
        .set_unhealthy(components::ENGINE, reason)
        .await;

    served?;
    Ok(())
}
