//! PostgreSQL tuning configuration engine
//!
//! This crate provides the core functionality for:
//! - Validating hardware/software facts into a canonical resource spec
//! - Building a shell-free invocation of the external tuning oracle
//! - Running the oracle under a timeout and classifying its failures
//! - A deterministic heuristic fallback when the oracle is not installed
//! - Health checks and observability

pub mod engine;
pub mod error;
pub mod health;
pub mod heuristic;
pub mod invocation;
pub mod models;
pub mod observability;
pub mod oracle;
pub mod validator;

pub use engine::{
    Provenance, TuneResponse, TuningEngine, TuningEngineBuilder, TuningFailure, TuningResult,
    TuningSuccess,
};
pub use error::{FailureKind, FieldIssue, OracleError, ValidationError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use heuristic::{HeuristicCalculator, HeuristicRecommendation};
pub use invocation::{InvocationBuilder, OracleInvocation, OracleSettings};
pub use models::*;
pub use observability::{StructuredLogger, TunerMetrics};
pub use oracle::{Oracle, OracleOutput, ProcessOracle};
pub use validator::{ResourceSpecValidator, ValidationLimits};
