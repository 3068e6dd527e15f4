//! Observability infrastructure for the tuner
//!
//! Provides:
//! - Prometheus metrics (request outcomes, failure kinds, oracle latency, oracle availability)
//! - Structured JSON logging with tracing

use crate::engine::{Provenance, TuningResult};
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for oracle run time (in seconds), up to the 10s bound
const ORACLE_LATENCY_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<TunerMetricsInner> = OnceLock::new();

struct TunerMetricsInner {
    requests_total: IntCounterVec,
    failures_total: IntCounterVec,
    oracle_duration_seconds: Histogram,
    oracle_available: IntGauge,
}

impl TunerMetricsInner {
    fn new() -> Self {
        Self {
            requests_total: register_int_counter_vec!(
                "pg_tuner_requests_total",
                "Successful tuning requests by provenance",
                &["provenance"]
            )
            .expect("Failed to register requests_total"),

            failures_total: register_int_counter_vec!(
                "pg_tuner_failures_total",
                "Failed tuning requests by failure kind",
                &["kind"]
            )
            .expect("Failed to register failures_total"),

            oracle_duration_seconds: register_histogram!(
                "pg_tuner_oracle_duration_seconds",
                "Wall-clock time of successful oracle runs",
                ORACLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register oracle_duration_seconds"),

            oracle_available: register_int_gauge!(
                "pg_tuner_oracle_available",
                "1 if the last tuning request reached the oracle, 0 if it fell back"
            )
            .expect("Failed to register oracle_available"),
        }
    }
}

/// Tuner metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share
/// the same underlying metrics.
#[derive(Clone)]
pub struct TunerMetrics {
    _private: (),
}

impl Default for TunerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TunerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunerMetrics").finish()
    }
}

impl TunerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(TunerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &TunerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the outcome of one tuning request
    pub fn record(&self, result: &TuningResult) {
        match result {
            TuningResult::Success(success) => {
                self.inner()
                    .requests_total
                    .with_label_values(&[success.provenance.as_str()])
                    .inc();
                match success.provenance {
                    Provenance::Oracle => {
                        self.inner().oracle_available.set(1);
                        self.inner()
                            .oracle_duration_seconds
                            .observe(success.duration_ms as f64 / 1000.0);
                    }
                    Provenance::Heuristic => self.inner().oracle_available.set(0),
                }
            }
            TuningResult::Failure(failure) => {
                self.inner()
                    .failures_total
                    .with_label_values(&[failure.kind.as_str()])
                    .inc();
            }
        }
    }
}

/// Structured logger for tuner events
///
/// Consistent JSON-formatted events for startup, request outcomes
/// and shutdown.
#[derive(Clone, Debug)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log a completed tuning request
    pub fn log_result(&self, result: &TuningResult) {
        match result {
            TuningResult::Success(success) => {
                info!(
                    event = "tuning_completed",
                    instance = %self.instance,
                    provenance = %success.provenance.as_str(),
                    command = %success.invocation,
                    duration_ms = success.duration_ms,
                    "Generated tuning configuration"
                );
            }
            TuningResult::Failure(failure) => {
                warn!(
                    event = "tuning_failed",
                    instance = %self.instance,
                    kind = %failure.kind,
                    message = %failure.message,
                    "Tuning request failed"
                );
            }
        }
    }

    /// Log substitution of the heuristic for a missing oracle
    pub fn log_fallback(&self, program: &str) {
        warn!(
            event = "oracle_fallback",
            instance = %self.instance,
            program = %program,
            "Oracle not installed, serving heuristic estimates"
        );
    }

    /// Log tuner startup
    pub fn log_startup(&self, version: &str, oracle_program: &str) {
        info!(
            event = "tuner_started",
            instance = %self.instance,
            version = %version,
            oracle_program = %oracle_program,
            "Tuning service started"
        );
    }

    /// Log tuner shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "tuner_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Tuning service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{TuningFailure, TuningSuccess};
    use crate::error::FailureKind;

    #[test]
    fn test_metrics_record_outcomes() {
        let metrics = TunerMetrics::new();

        metrics.record(&TuningResult::Success(TuningSuccess {
            configuration: "shared_buffers = 2GB\n".to_string(),
            invocation: "timescaledb-tune --dry-run".to_string(),
            provenance: Provenance::Oracle,
            duration_ms: 120,
        }));
        metrics.record(&TuningResult::Failure(TuningFailure::new(
            FailureKind::OracleTimeout,
            "timed out",
        )));

        let families = prometheus::gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"pg_tuner_requests_total"));
        assert!(names.contains(&"pg_tuner_failures_total"));
        assert!(names.contains(&"pg_tuner_oracle_available"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance(), "test-instance");
    }
}
