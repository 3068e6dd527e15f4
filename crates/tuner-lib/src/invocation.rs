//! Argument-vector construction for the external tuning oracle
//!
//! The oracle is always run in preview mode: `--dry-run` with a throwaway
//! `--conf-path` and `--out-path`, so a live configuration file is never
//! touched. Every flag and value is a separate token; nothing is joined
//! into a command line that a shell could reinterpret.

use crate::models::{Profile, ResourceSpec};
use std::time::Duration;

/// Default oracle executable, resolved through the search path
pub const DEFAULT_ORACLE_PROGRAM: &str = "timescaledb-tune";

/// Placeholder for the oracle's required "existing config" input
pub const DEFAULT_CONF_PATH: &str = "/dev/null";

/// Disposable output path for the preview
pub const DEFAULT_OUT_PATH: &str = "/tmp/pg.conf";

/// Time bound for a single oracle run
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(10);

/// How to locate and drive the oracle
#[derive(Debug, Clone)]
pub struct OracleSettings {
    /// Executable name or path
    pub program: String,
    /// Value passed to `--conf-path`
    pub conf_path: String,
    /// Value passed to `--out-path`
    pub out_path: String,
    /// Maximum wall-clock time before the oracle is killed
    pub timeout: Duration,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_ORACLE_PROGRAM.to_string(),
            conf_path: DEFAULT_CONF_PATH.to_string(),
            out_path: DEFAULT_OUT_PATH.to_string(),
            timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }
}

/// A fully built oracle invocation: program plus discrete argument tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl OracleInvocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Human-readable rendering for display and logs only; never executed
    pub fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value following `flag`, if present
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Builds oracle invocations from validated specs
#[derive(Debug, Clone, Default)]
pub struct InvocationBuilder {
    settings: OracleSettings,
}

impl InvocationBuilder {
    pub fn new(settings: OracleSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &OracleSettings {
        &self.settings
    }

    pub fn build(&self, spec: &ResourceSpec) -> OracleInvocation {
        let mut args = vec![
            "--memory".to_string(),
            format!("{}MB", spec.memory_mb()),
            "--cpus".to_string(),
            spec.cpu_count().to_string(),
            "--pg-version".to_string(),
            spec.pg_version().as_str().to_string(),
            "--conf-path".to_string(),
            self.settings.conf_path.clone(),
            "--out-path".to_string(),
            self.settings.out_path.clone(),
            "--dry-run".to_string(),
            "--yes".to_string(),
        ];

        // The oracle's own default profile matches ours
        if spec.profile() != Profile::Default {
            args.push("--profile".to_string());
            args.push(spec.profile().as_str().to_string());
        }

        if let Some(conns) = spec.max_connections() {
            args.push("--max-conns".to_string());
            args.push(conns.to_string());
        }

        OracleInvocation::new(self.settings.program.clone(), args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawTuneRequest;
    use crate::validator::ResourceSpecValidator;

    fn spec(raw: RawTuneRequest) -> ResourceSpec {
        ResourceSpecValidator::new().validate(&raw).unwrap()
    }

    #[test]
    fn test_fixed_tokens() {
        let invocation =
            InvocationBuilder::default().build(&spec(RawTuneRequest::new(8192, 4, "default", "15")));

        assert_eq!(invocation.program, "timescaledb-tune");
        assert_eq!(
            invocation.args,
            vec![
                "--memory", "8192MB", "--cpus", "4", "--pg-version", "15", "--conf-path",
                "/dev/null", "--out-path", "/tmp/pg.conf", "--dry-run", "--yes",
            ]
        );
    }

    #[test]
    fn test_default_profile_has_no_profile_flag() {
        let invocation =
            InvocationBuilder::default().build(&spec(RawTuneRequest::new(2048, 2, "default", "16")));
        assert!(!invocation.args.iter().any(|a| a == "--profile"));
        assert!(!invocation.args.iter().any(|a| a == "--max-conns"));
    }

    #[test]
    fn test_promscale_profile_flag() {
        let invocation = InvocationBuilder::default()
            .build(&spec(RawTuneRequest::new(2048, 2, "promscale", "16")));

        assert_eq!(invocation.args.iter().filter(|a| *a == "--profile").count(), 1);
        assert_eq!(invocation.flag_value("--profile"), Some("promscale"));
    }

    #[test]
    fn test_max_connections_flag() {
        let invocation = InvocationBuilder::default().build(&spec(
            RawTuneRequest::new(4096, 8, "default", "14").with_max_connections(250),
        ));
        assert_eq!(invocation.flag_value("--max-conns"), Some("250"));
    }

    #[test]
    fn test_every_token_is_discrete() {
        let invocation = InvocationBuilder::default().build(&spec(
            RawTuneRequest::new(4096, 8, "promscale", "17").with_max_connections(100),
        ));

        // No token carries whitespace, so none can smuggle a second argument
        assert!(invocation.args.iter().all(|a| !a.contains(char::is_whitespace)));
        assert!(invocation.args.len() > 1);
    }

    #[test]
    fn test_custom_settings() {
        let builder = InvocationBuilder::new(OracleSettings {
            program: "/opt/tools/timescaledb-tune".to_string(),
            out_path: "/var/tmp/preview.conf".to_string(),
            ..OracleSettings::default()
        });
        let invocation = builder.build(&spec(RawTuneRequest::new(1024, 1, "default", "13")));

        assert_eq!(invocation.program, "/opt/tools/timescaledb-tune");
        assert_eq!(invocation.flag_value("--out-path"), Some("/var/tmp/preview.conf"));
        assert!(invocation.describe().starts_with("/opt/tools/timescaledb-tune --memory 1024MB"));
    }
}
