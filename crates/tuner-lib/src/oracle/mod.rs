//! External tuning oracle execution
//!
//! The oracle is an authoritative tuning program (normally
//! `timescaledb-tune`) consulted when installed. This module runs it
//! without a shell, bounds it with a timeout and classifies the outcome:
//! success, "not installed", or a real execution failure.

mod process;
mod subprocess;

#[cfg(test)]
mod tests;

pub use process::ProcessOracle;
pub use subprocess::{run_invocation, MAX_OUTPUT_BYTES};

use crate::error::OracleError;
use crate::invocation::OracleInvocation;
use std::time::Duration;

pub use async_trait::async_trait;

/// Captured result of a successful oracle run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleOutput {
    /// Standard output, verbatim
    pub stdout: String,
    /// Standard error, kept for diagnostics
    pub stderr: String,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Trait for oracle implementations
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Run the invocation, killing it if it outlives `timeout`
    async fn run(
        &self,
        invocation: &OracleInvocation,
        timeout: Duration,
    ) -> Result<OracleOutput, OracleError>;
}
