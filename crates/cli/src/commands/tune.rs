//! Configuration generation commands

use anyhow::Result;
use clap::{Args, ValueEnum};
use std::time::Duration;
use tuner_lib::{MemoryUnit, OracleSettings, RawTuneRequest, TuneResponse, TuningEngine};

use crate::client::ApiClient;
use crate::output::{print_tune_response, OutputFormat};

/// Unit of `--memory`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitArg {
    Mb,
    Gb,
}

impl From<UnitArg> for MemoryUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Mb => MemoryUnit::Megabytes,
            UnitArg::Gb => MemoryUnit::Gigabytes,
        }
    }
}

/// Resource description shared by `generate` and `request`
#[derive(Debug, Clone, Args)]
pub struct ResourceArgs {
    /// Available memory, in --memory-unit
    #[arg(long)]
    pub memory: f64,

    #[arg(long, value_enum, default_value_t = UnitArg::Gb)]
    pub memory_unit: UnitArg,

    /// Number of CPUs
    #[arg(long)]
    pub cpus: u32,

    /// Workload profile (default, promscale)
    #[arg(long, default_value = "default")]
    pub profile: String,

    /// PostgreSQL major version
    #[arg(long, default_value = "16")]
    pub pg_version: String,

    /// Maximum client connections
    #[arg(long)]
    pub max_connections: Option<u32>,
}

impl ResourceArgs {
    /// Request with memory still in the caller's unit
    pub fn to_raw(&self) -> RawTuneRequest {
        let raw = if self.memory.fract() == 0.0 && self.memory.abs() < i64::MAX as f64 {
            RawTuneRequest::new(self.memory as i64, self.cpus, &self.profile, &self.pg_version)
        } else {
            RawTuneRequest::new(self.memory, self.cpus, &self.profile, &self.pg_version)
        };

        match self.max_connections {
            Some(conns) => raw.with_max_connections(conns),
            None => raw,
        }
    }
}

/// Generate a configuration in-process
pub async fn generate(
    resources: &ResourceArgs,
    oracle: &str,
    timeout_secs: u64,
    format: OutputFormat,
) -> Result<bool> {
    let settings = OracleSettings {
        program: oracle.to_string(),
        timeout: Duration::from_secs(timeout_secs),
        ..OracleSettings::default()
    };
    let engine = TuningEngine::new(settings);

    let raw = resources.to_raw().in_unit(resources.memory_unit.into());
    let result = engine.generate(&raw).await;

    print_tune_response(&TuneResponse::from(&result), format)
}

/// Ask a running server for a configuration
pub async fn request(client: &ApiClient, resources: &ResourceArgs, format: OutputFormat) -> Result<bool> {
    let response = client
        .tune(&resources.to_raw(), resources.memory_unit.into())
        .await?;

    print_tune_response(&response, format)
}
