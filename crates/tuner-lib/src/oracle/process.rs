//! Oracle backed by a real executable on the host

use super::{run_invocation, Oracle, OracleOutput};
use crate::error::OracleError;
use crate::invocation::OracleInvocation;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs the oracle as a child process with no shell in between
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOracle;

impl ProcessOracle {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Oracle for ProcessOracle {
    async fn run(
        &self,
        invocation: &OracleInvocation,
        timeout: Duration,
    ) -> Result<OracleOutput, OracleError> {
        debug!(
            program = %invocation.program,
            args = ?invocation.args,
            timeout_ms = timeout.as_millis() as u64,
            "Running oracle"
        );

        let result = run_invocation(invocation, timeout).await;

        match &result {
            Ok(output) => {
                debug!(duration_ms = output.duration_ms, "Oracle succeeded");
            }
            Err(OracleError::NotFound(program)) => {
                debug!(program = %program, "Oracle not installed");
            }
            Err(e) => {
                warn!(program = %invocation.program, error = %e, "Oracle failed");
            }
        }

        result
    }
}
