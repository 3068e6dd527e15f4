//! Error kinds for the tuning engine
//!
//! Validation problems and oracle execution problems are distinct types;
//! the orchestrator folds both into a [`FailureKind`] on the way out.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single offending field in a tuning request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation failure carrying every offending field, in input order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid input: {}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Names of the fields that failed, in the order they were checked
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.field.as_str()).collect()
    }
}

/// Failures from running the external oracle
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle executable is not installed or not on the search path
    #[error("oracle executable not found: {0}")]
    NotFound(String),

    /// The oracle exceeded its time bound and was killed
    #[error("oracle timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The oracle ran and exited unsuccessfully
    #[error("oracle exited with code {exit_code}: {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    /// The oracle could not be started for a reason other than absence
    #[error("failed to start oracle: {0}")]
    Spawn(#[source] std::io::Error),

    /// Output could not be captured or decoded
    #[error("malformed oracle output: {0}")]
    InvalidOutput(String),
}

/// Failure kinds reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidInput,
    OracleTimeout,
    OracleExecutionError,
    InternalError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "InvalidInput",
            FailureKind::OracleTimeout => "OracleTimeout",
            FailureKind::OracleExecutionError => "OracleExecutionError",
            FailureKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OracleError {
    /// Caller-facing kind for this failure.
    ///
    /// Returns `None` for [`OracleError::NotFound`], which is never surfaced:
    /// the orchestrator substitutes the heuristic instead.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            OracleError::NotFound(_) => None,
            OracleError::Timeout { .. } => Some(FailureKind::OracleTimeout),
            OracleError::ExecutionFailed { .. } | OracleError::Spawn(_) => {
                Some(FailureKind::OracleExecutionError)
            }
            OracleError::InvalidOutput(_) => Some(FailureKind::InternalError),
        }
    }
}
