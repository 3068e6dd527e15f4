//! Tuning orchestration
//!
//! Composes validation, oracle invocation and heuristic fallback into a
//! single linear pipeline:
//!
//! ```text
//! Validating --invalid--> Done(Failure: InvalidInput)
//!     |
//!  Invoking --ok--------> Done(Success: oracle)
//!     |   \--not found--> FallingBack --> Done(Success: heuristic)
//!     \--timeout/error--> Done(Failure: OracleTimeout | OracleExecutionError | InternalError)
//! ```
//!
//! Nothing is retried. The engine holds no per-request state, so one
//! instance can serve any number of concurrent requests.

use crate::error::{FailureKind, FieldIssue, OracleError, ValidationError};
use crate::heuristic::HeuristicCalculator;
use crate::invocation::{InvocationBuilder, OracleSettings};
use crate::models::{RawTuneRequest, ResourceSpec};
use crate::oracle::{Oracle, ProcessOracle};
use crate::validator::ResourceSpecValidator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Where a configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Oracle,
    Heuristic,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Oracle => "oracle",
            Provenance::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningSuccess {
    /// Configuration text; oracle output is kept byte-for-byte
    pub configuration: String,
    /// Human-readable rendering of the oracle invocation
    pub invocation: String,
    pub provenance: Provenance,
    /// Time spent producing the configuration
    pub duration_ms: u64,
}

/// A rejected or failed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Offending fields, populated for [`FailureKind::InvalidInput`]
    pub issues: Vec<FieldIssue>,
}

impl TuningFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn invalid_input(err: ValidationError) -> Self {
        Self {
            kind: FailureKind::InvalidInput,
            message: err.to_string(),
            issues: err.issues,
        }
    }
}

/// Outcome of a tuning request; the only thing `generate` returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuningResult {
    Success(TuningSuccess),
    Failure(TuningFailure),
}

impl TuningResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TuningResult::Success(_))
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            TuningResult::Success(s) => Some(s.provenance),
            TuningResult::Failure(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            TuningResult::Success(_) => None,
            TuningResult::Failure(f) => Some(f.kind),
        }
    }
}

/// Wire form of [`TuningResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<FieldIssue>,
}

impl From<&TuningResult> for TuneResponse {
    fn from(result: &TuningResult) -> Self {
        match result {
            TuningResult::Success(s) => Self {
                success: true,
                configuration: Some(s.configuration.clone()),
                provenance: Some(s.provenance),
                command: Some(s.invocation.clone()),
                error: None,
                kind: None,
                issues: Vec::new(),
            },
            TuningResult::Failure(f) => Self {
                success: false,
                configuration: None,
                provenance: None,
                command: None,
                error: Some(f.message.clone()),
                kind: Some(f.kind),
                issues: f.issues.clone(),
            },
        }
    }
}

/// The tuning orchestrator
#[derive(Clone)]
pub struct TuningEngine {
    validator: ResourceSpecValidator,
    builder: InvocationBuilder,
    oracle: Arc<dyn Oracle>,
    heuristic: HeuristicCalculator,
    timeout: Duration,
}

impl fmt::Debug for TuningEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TuningEngine")
            .field("validator", &self.validator)
            .field("builder", &self.builder)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TuningEngine {
    /// Engine that runs the configured oracle program as a child process
    pub fn new(settings: OracleSettings) -> Self {
        TuningEngineBuilder::new(settings).build()
    }

    pub fn builder(settings: OracleSettings) -> TuningEngineBuilder {
        TuningEngineBuilder::new(settings)
    }

    pub fn validator(&self) -> &ResourceSpecValidator {
        &self.validator
    }

    pub fn oracle_program(&self) -> &str {
        &self.builder.settings().program
    }

    /// Validate a raw request and produce a configuration
    pub async fn generate(&self, raw: &RawTuneRequest) -> TuningResult {
        match self.validator.validate(raw) {
            Ok(spec) => self.generate_for_spec(&spec).await,
            Err(err) => {
                debug!(fields = ?err.fields(), "Rejected tuning request");
                TuningResult::Failure(TuningFailure::invalid_input(err))
            }
        }
    }

    /// Produce a configuration for an already validated spec
    pub async fn generate_for_spec(&self, spec: &ResourceSpec) -> TuningResult {
        let invocation = self.builder.build(spec);
        let description = invocation.describe();
        debug!(command = %description, "Invoking oracle");

        match self.oracle.run(&invocation, self.timeout).await {
            Ok(output) => TuningResult::Success(TuningSuccess {
                configuration: output.stdout,
                invocation: description,
                provenance: Provenance::Oracle,
                duration_ms: output.duration_ms,
            }),
            Err(OracleError::NotFound(program)) => {
                info!(program = %program, "Oracle not installed, using heuristic");
                let start = Instant::now();
                let configuration = self.heuristic.render(spec);
                TuningResult::Success(TuningSuccess {
                    configuration,
                    invocation: description,
                    provenance: Provenance::Heuristic,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Err(err) => {
                let kind = err.failure_kind().unwrap_or(FailureKind::InternalError);
                TuningResult::Failure(TuningFailure::new(kind, describe_failure(kind, &err)))
            }
        }
    }
}

fn describe_failure(kind: FailureKind, err: &OracleError) -> String {
    match kind {
        FailureKind::OracleTimeout => format!("Oracle did not finish in time: {}", err),
        FailureKind::OracleExecutionError => format!("Error running oracle: {}", err),
        _ => format!("Unexpected error: {}", err),
    }
}

/// Builder for [`TuningEngine`]
pub struct TuningEngineBuilder {
    settings: OracleSettings,
    validator: ResourceSpecValidator,
    oracle: Option<Arc<dyn Oracle>>,
}

impl TuningEngineBuilder {
    pub fn new(settings: OracleSettings) -> Self {
        Self {
            settings,
            validator: ResourceSpecValidator::new(),
            oracle: None,
        }
    }

    pub fn validator(mut self, validator: ResourceSpecValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the process-backed oracle
    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn build(self) -> TuningEngine {
        let timeout = self.settings.timeout;
        TuningEngine {
            validator: self.validator,
            builder: InvocationBuilder::new(self.settings),
            oracle: self.oracle.unwrap_or_else(|| Arc::new(ProcessOracle::new())),
            heuristic: HeuristicCalculator::new(),
            timeout,
        }
    }
}
