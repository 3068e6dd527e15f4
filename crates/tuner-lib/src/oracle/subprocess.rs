//! Process spawning, capture and timeout enforcement

use super::OracleOutput;
use crate::error::OracleError;
use crate::invocation::OracleInvocation;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Maximum bytes captured per stream (4 MiB)
pub const MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

type StreamTask = JoinHandle<std::io::Result<Vec<u8>>>;

/// Spawn the invocation directly (no shell), capture stdout/stderr and
/// enforce `timeout`.
///
/// One deadline covers the wait for exit and both stream reads. When it
/// passes, the child's whole process group is killed and the child is
/// reaped before the error is returned.
pub async fn run_invocation(
    invocation: &OracleInvocation,
    timeout: Duration,
) -> Result<OracleOutput, OracleError> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so anything the oracle forks can be killed with it
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let deadline = start + timeout;

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound => OracleError::NotFound(invocation.program.clone()),
        _ => OracleError::Spawn(e),
    })?;
    let pgid = child.id();

    let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let collected = tokio::time::timeout_at(deadline, async {
        let status = child.wait().await.map_err(OracleError::Spawn)?;
        let stdout = join_stream(&mut stdout_task).await?;
        let stderr = join_stream(&mut stderr_task).await?;
        Ok::<_, OracleError>((status, stdout, stderr))
    })
    .await;

    let (status, stdout, stderr) = match collected {
        Ok(Ok(collected)) => collected,
        Ok(Err(err)) => {
            stdout_task.abort();
            stderr_task.abort();
            return Err(err);
        }
        Err(_elapsed) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            terminate(&mut child, pgid).await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(OracleError::Timeout { elapsed_ms });
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let stderr = String::from_utf8_lossy(&stderr).into_owned();

    if !status.success() {
        return Err(OracleError::ExecutionFailed {
            exit_code: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8(stdout)
        .map_err(|e| OracleError::InvalidOutput(format!("stdout is not UTF-8: {}", e)))?;

    debug!(duration_ms, bytes = stdout.len(), "Oracle completed");
    Ok(OracleOutput {
        stdout,
        stderr,
        duration_ms,
    })
}

/// Kill the child's process group, then kill and reap the child itself
async fn terminate(child: &mut Child, pgid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pgid.and_then(|id| libc::pid_t::try_from(id).ok()) {
            // SAFETY: killpg only sends a signal; the group was created for this child
            if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::ESRCH) {
                    warn!(error = %err, pgid, "Failed to kill oracle process group");
                }
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;

    // Already reaped when only the stream reads overran
    if let Ok(None) = child.try_wait() {
        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill timed out oracle");
        }
    }
}

async fn join_stream(task: &mut StreamTask) -> Result<Vec<u8>, OracleError> {
    task.await
        .map_err(|e| OracleError::InvalidOutput(format!("capture task failed: {}", e)))?
        .map_err(|e| OracleError::InvalidOutput(format!("failed to read output: {}", e)))
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        h.take(MAX_OUTPUT_BYTES as u64).read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
