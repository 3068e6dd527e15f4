//! Oracle runner tests
//!
//! These spawn real processes (`/bin/sh`, `/bin/echo`) standing in for the
//! tuning oracle, so they only run on unix hosts.

#[cfg(all(test, unix))]
mod process_tests {
    use crate::error::OracleError;
    use crate::invocation::OracleInvocation;
    use crate::oracle::{Oracle, ProcessOracle};
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> OracleInvocation {
        OracleInvocation::new("/bin/sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_success_returns_stdout_verbatim() {
        let invocation = sh("printf 'shared_buffers = 2GB\\n\\n  work_mem = 5242kB  \\n'");
        let output = ProcessOracle
            .run(&invocation, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(output.stdout, "shared_buffers = 2GB\n\n  work_mem = 5242kB  \n");
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let invocation = OracleInvocation::new(
            "/bin/echo",
            vec!["--profile".to_string(), "; echo injected".to_string()],
        );
        let output = ProcessOracle
            .run(&invocation, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(output.stdout, "--profile ; echo injected\n");
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let invocation = OracleInvocation::new(
            "/nonexistent/bin/timescaledb-tune",
            vec!["--dry-run".to_string()],
        );
        let result = ProcessOracle.run(&invocation, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(OracleError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_binary_on_search_path_is_not_found() {
        let invocation = OracleInvocation::new("timescaledb-tune-definitely-absent", vec![]);
        let result = ProcessOracle.run(&invocation, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(OracleError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_execution_failure() {
        let invocation = sh("echo 'invalid --pg-version' >&2; exit 3");
        let result = ProcessOracle.run(&invocation, Duration::from_secs(5)).await;

        match result {
            Err(OracleError::ExecutionFailed { exit_code, stderr }) => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "invalid --pg-version");
            }
            other => panic!("expected execution failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let invocation = sh("exec sleep 30");
        let start = Instant::now();
        let result = ProcessOracle
            .run(&invocation, Duration::from_millis(200))
            .await;

        assert!(matches!(result, Err(OracleError::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_background_child_holding_stdout_times_out() {
        // The shell exits at once but its background job keeps stdout open
        let invocation = sh("sleep 5 & echo shared_buffers = 1GB");
        let start = Instant::now();
        let result = ProcessOracle
            .run(&invocation, Duration::from_millis(500))
            .await;

        assert!(
            matches!(result, Err(OracleError::Timeout { .. })),
            "{:?}",
            result
        );
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    /// Running, as opposed to gone or a zombie awaiting its reaper
    fn process_alive(pid: libc::pid_t) -> bool {
        // SAFETY: signal 0 only checks for existence
        if unsafe { libc::kill(pid, 0) } != 0 {
            return false;
        }
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                .unwrap_or(true),
            Err(_) => true,
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_forked_processes() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("child.pid");
        let invocation = sh(&format!(
            "sleep 30 >/dev/null 2>&1 & echo $! > {}; wait",
            pid_file.display()
        ));

        let result = ProcessOracle
            .run(&invocation, Duration::from_millis(300))
            .await;
        assert!(matches!(result, Err(OracleError::Timeout { .. })));

        let pid: libc::pid_t = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        // Killed before the error came back; give the signal a moment to land
        let gone_by = Instant::now() + Duration::from_secs(2);
        while process_alive(pid) && Instant::now() < gone_by {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!process_alive(pid), "forked process {} survived", pid);
    }

    #[tokio::test]
    async fn test_non_utf8_output_is_invalid() {
        let invocation = sh("printf '\\377\\376'");
        let result = ProcessOracle.run(&invocation, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(OracleError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn test_non_executable_file_is_spawn_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("timescaledb-tune");
        std::fs::write(&path, "not a program").unwrap();

        let invocation = OracleInvocation::new(path.to_string_lossy(), vec![]);
        let result = ProcessOracle.run(&invocation, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(OracleError::Spawn(_))));
    }
}
