//! Integration tests for the tuning API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tuner_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    oracle::{async_trait, Oracle, OracleOutput},
    OracleError, OracleInvocation, OracleSettings, ResourceSpecValidator, StructuredLogger,
    TunerMetrics, TuningEngine, ValidationLimits,
};
use tuner_server::api::{create_router, serve_on, AppState};

/// Oracle stand-in with a fixed outcome
struct FixedOracle(fn() -> Result<OracleOutput, OracleError>);

#[async_trait]
impl Oracle for FixedOracle {
    async fn run(
        &self,
        _invocation: &OracleInvocation,
        _timeout: Duration,
    ) -> Result<OracleOutput, OracleError> {
        (self.0)()
    }
}

fn missing_oracle_settings() -> OracleSettings {
    OracleSettings {
        program: "/nonexistent/bin/timescaledb-tune".to_string(),
        ..OracleSettings::default()
    }
}

async fn setup_app(engine: TuningEngine) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::ORACLE).await;
    health_registry.register(components::ENGINE).await;

    let state = Arc::new(AppState::new(
        engine,
        health_registry,
        TunerMetrics::new(),
        StructuredLogger::new("test-instance"),
    ));
    (create_router(state.clone()), state)
}

async fn setup_missing_oracle_app() -> (Router, Arc<AppState>) {
    setup_app(TuningEngine::new(missing_oracle_settings())).await
}

async fn setup_fixed_oracle_app(
    outcome: fn() -> Result<OracleOutput, OracleError>,
) -> (Router, Arc<AppState>) {
    let engine = TuningEngine::builder(OracleSettings::default())
        .oracle(Arc::new(FixedOracle(outcome)))
        .build();
    setup_app(engine).await
}

async fn post_tune(app: Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/tune")
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn reference_request() -> Value {
    json!({
        "memory": 8192,
        "cpus": 4,
        "profile": "default",
        "pgVersion": "15"
    })
}

#[tokio::test]
async fn test_tune_falls_back_to_heuristic_without_oracle() {
    let (app, _state) = setup_missing_oracle_app().await;

    let (status, body) = post_tune(app, reference_request().to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["provenance"], "heuristic");

    let configuration = body["configuration"].as_str().unwrap();
    assert!(configuration.contains("shared_buffers = 2048MB"));
    assert!(configuration.contains("effective_cache_size = 6144MB"));
    assert!(body["command"]
        .as_str()
        .unwrap()
        .starts_with("/nonexistent/bin/timescaledb-tune --memory 8192MB --cpus 4"));
}

#[tokio::test]
async fn test_tune_converts_gigabytes() {
    let (app, _state) = setup_missing_oracle_app().await;

    let (status, body) = post_tune(
        app,
        json!({
            "memory": 8,
            "memoryUnit": "GB",
            "cpus": 4,
            "profile": "default",
            "pgVersion": "15"
        })
        .to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["configuration"]
        .as_str()
        .unwrap()
        .contains("shared_buffers = 2048MB"));
}

#[tokio::test]
async fn test_tune_rejects_unknown_memory_unit() {
    let (app, _state) = setup_missing_oracle_app().await;

    let mut request = reference_request();
    request["memoryUnit"] = json!("TB");
    let (status, body) = post_tune(app, request.to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidInput");
    assert_eq!(body["issues"][0]["field"], "memoryUnit");
}

#[tokio::test]
async fn test_tune_rejects_too_little_memory() {
    let (app, _state) = setup_missing_oracle_app().await;

    let mut request = reference_request();
    request["memory"] = json!(256);
    let (status, body) = post_tune(app, request.to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "InvalidInput");
    assert!(body.get("configuration").is_none());

    let issues = body["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["field"], "memory");
}

#[tokio::test]
async fn test_tune_rejects_zero_cpus() {
    let (app, _state) = setup_missing_oracle_app().await;

    let mut request = reference_request();
    request["cpus"] = json!(0);
    let (status, body) = post_tune(app, request.to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["issues"][0]["field"], "cpus");
}

#[tokio::test]
async fn test_tune_reports_every_invalid_field() {
    let (app, _state) = setup_missing_oracle_app().await;

    let (status, body) = post_tune(
        app,
        json!({
            "memory": 100,
            "cpus": 500,
            "profile": "oltp; rm -rf /",
            "pgVersion": "9"
        })
        .to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["memory", "cpus", "profile", "pgVersion"]);
}

#[tokio::test]
async fn test_tune_rejects_malformed_json() {
    let (app, _state) = setup_missing_oracle_app().await;

    let (status, body) = post_tune(app, "{\"memory\": 8192,").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidInput");
    assert_eq!(body["issues"][0]["field"], "body");
}

#[tokio::test]
async fn test_tune_returns_oracle_output_verbatim() {
    let (app, state) = setup_fixed_oracle_app(|| {
        Ok(OracleOutput {
            stdout: "shared_buffers = 2GB\n  work_mem = 5242kB\n\n".to_string(),
            stderr: String::new(),
            duration_ms: 42,
        })
    })
    .await;

    let (status, body) = post_tune(app.clone(), reference_request().to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provenance"], "oracle");
    assert_eq!(
        body["configuration"],
        "shared_buffers = 2GB\n  work_mem = 5242kB\n\n"
    );

    let health = state.health_registry.health().await;
    assert_eq!(health.status, tuner_lib::ComponentStatus::Healthy);
}

#[tokio::test]
async fn test_tune_timeout_maps_to_gateway_timeout() {
    let (app, state) =
        setup_fixed_oracle_app(|| Err(OracleError::Timeout { elapsed_ms: 10_000 })).await;

    let (status, body) = post_tune(app, reference_request().to_string()).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "OracleTimeout");
    assert!(body.get("configuration").is_none());

    // A misbehaving oracle degrades the service without taking it down
    let health = state.health_registry.health().await;
    assert_eq!(health.status, tuner_lib::ComponentStatus::Degraded);
}

#[tokio::test]
async fn test_tune_execution_failure_maps_to_500() {
    let (app, _state) = setup_fixed_oracle_app(|| {
        Err(OracleError::ExecutionFailed {
            exit_code: 1,
            stderr: "could not parse memory".to_string(),
        })
    })
    .await;

    let (status, body) = post_tune(app, reference_request().to_string()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "OracleExecutionError");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("could not parse memory"));
}

#[tokio::test]
async fn test_fallback_degrades_oracle_health() {
    let (app, _state) = setup_missing_oracle_app().await;

    post_tune(app.clone(), reference_request().to_string()).await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["oracle"]["status"], "degraded");
    assert_eq!(health["components"]["engine"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_missing_oracle_app().await;

    state
        .health_registry
        .set_unhealthy(components::ENGINE, "Worker pool exhausted")
        .await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_tracks_initialization() {
    let (app, state) = setup_missing_oracle_app().await;

    let (status, readiness) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_missing_oracle_app().await;

    post_tune(app.clone(), reference_request().to_string()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("pg_tuner_requests_total"));
    assert!(metrics_text.contains("provenance=\"heuristic\""));
    assert!(metrics_text.contains("pg_tuner_oracle_duration_seconds_bucket"));
}

#[tokio::test]
async fn test_serves_over_tcp() {
    let (_app, state) = setup_missing_oracle_app().await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_on(listener, state, std::future::pending()));

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/tune", addr))
        .json(&reference_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["provenance"], "heuristic");

    server.abort();
}

#[tokio::test]
async fn test_shutdown_marks_engine_unhealthy() {
    let (_app, state) = setup_missing_oracle_app().await;
    state.health_registry.set_ready(true).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_on(listener, state.clone(), async move {
        let _ = stop_rx.await;
    }));

    let response = reqwest::get(format!("http://{}/readyz", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();

    let health = state.health_registry.health().await;
    assert_eq!(health.status, ComponentStatus::Unhealthy);
    assert_eq!(
        health.components[components::ENGINE].status,
        ComponentStatus::Unhealthy
    );
    assert!(!state.health_registry.readiness().await.ready);
}

#[tokio::test]
async fn test_configured_limits_reject_large_requests() {
    let engine = TuningEngine::builder(missing_oracle_settings())
        .validator(ResourceSpecValidator::with_limits(ValidationLimits {
            cpus: (1, 8),
            ..ValidationLimits::default()
        }))
        .build();
    assert_eq!(engine.validator().limits().cpus, (1, 8));
    let (app, _state) = setup_app(engine).await;

    let mut request = reference_request();
    request["cpus"] = json!(16);
    let (status, body) = post_tune(app.clone(), request.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Cannot exceed 8 CPUs"));

    let (status, _) = post_tune(app, reference_request().to_string()).await;
    assert_eq!(status, StatusCode::OK);
}
