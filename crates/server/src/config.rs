//! Server configuration

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tuner_lib::invocation::{
    OracleSettings, DEFAULT_CONF_PATH, DEFAULT_ORACLE_PROGRAM, DEFAULT_OUT_PATH,
};
use tuner_lib::ValidationLimits;

/// Server configuration, read from `TUNER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name reported in structured logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Port for the tuning API and health/metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Oracle executable name or path
    #[serde(default = "default_oracle_program")]
    pub oracle_program: String,

    /// Seconds before a running oracle is killed
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_secs: u64,

    #[serde(default = "default_conf_path")]
    pub conf_path: String,

    #[serde(default = "default_out_path")]
    pub out_path: String,

    /// Largest accepted memory in MiB, below the built-in maximum
    #[serde(default)]
    pub max_memory_mb: Option<i64>,

    #[serde(default)]
    pub max_cpus: Option<i64>,

    /// Largest accepted maxConnections value
    #[serde(default)]
    pub max_connections_limit: Option<i64>,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "tuner".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_oracle_program() -> String {
    DEFAULT_ORACLE_PROGRAM.to_string()
}

fn default_oracle_timeout() -> u64 {
    10
}

fn default_conf_path() -> String {
    DEFAULT_CONF_PATH.to_string()
}

fn default_out_path() -> String {
    DEFAULT_OUT_PATH.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            oracle_program: default_oracle_program(),
            oracle_timeout_secs: default_oracle_timeout(),
            conf_path: default_conf_path(),
            out_path: default_out_path(),
            max_memory_mb: None,
            max_cpus: None,
            max_connections_limit: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from `vars` instead of the process environment
    pub fn load_from(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("TUNER").source(vars))
            .build()?;

        let loaded: ServerConfig = config.try_deserialize()?;
        if loaded.oracle_timeout_secs == 0 {
            anyhow::bail!("oracle_timeout_secs must be greater than zero");
        }
        loaded.validation_limits()?;
        Ok(loaded)
    }

    pub fn oracle_settings(&self) -> OracleSettings {
        OracleSettings {
            program: self.oracle_program.clone(),
            conf_path: self.conf_path.clone(),
            out_path: self.out_path.clone(),
            timeout: Duration::from_secs(self.oracle_timeout_secs),
        }
    }

    /// Request bounds, with any configured ceilings applied.
    ///
    /// Ceilings can only tighten the built-in bounds.
    pub fn validation_limits(&self) -> Result<ValidationLimits> {
        let defaults = ValidationLimits::default();
        Ok(ValidationLimits {
            memory_mb: tighten("max_memory_mb", defaults.memory_mb, self.max_memory_mb)?,
            cpus: tighten("max_cpus", defaults.cpus, self.max_cpus)?,
            max_connections: tighten(
                "max_connections_limit",
                defaults.max_connections,
                self.max_connections_limit,
            )?,
        })
    }
}

fn tighten(name: &str, (min, max): (i64, i64), ceiling: Option<i64>) -> Result<(i64, i64)> {
    match ceiling {
        None => Ok((min, max)),
        Some(ceiling) if (min..=max).contains(&ceiling) => Ok((min, ceiling)),
        Some(ceiling) => anyhow::bail!(
            "{} must be between {} and {}, got {}",
            name,
            min,
            max,
            ceiling
        ),
    }
}
