//! Validation of raw tuning requests into resource specs
//!
//! Turns a [`RawTuneRequest`] into a [`ResourceSpec`], checking every field
//! independently and collecting all problems before rejecting. The validator
//! is pure: construct it once and share it across requests.

use crate::error::{FieldIssue, ValidationError};
use crate::models::{PgVersion, Profile, RawTuneRequest, ResourceSpec};
use serde_json::Value;

/// Minimum memory in MiB (512 MiB)
pub const MIN_MEMORY_MB: i64 = 512;

/// Maximum memory in MiB (1 TiB)
pub const MAX_MEMORY_MB: i64 = 1_048_576;

pub const MIN_CPUS: i64 = 1;
pub const MAX_CPUS: i64 = 128;

pub const MIN_CONNECTIONS: i64 = 1;
pub const MAX_CONNECTIONS: i64 = 10_000;

/// Inclusive bounds applied by the validator
#[derive(Debug, Clone)]
pub struct ValidationLimits {
    pub memory_mb: (i64, i64),
    pub cpus: (i64, i64),
    pub max_connections: (i64, i64),
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            memory_mb: (MIN_MEMORY_MB, MAX_MEMORY_MB),
            cpus: (MIN_CPUS, MAX_CPUS),
            max_connections: (MIN_CONNECTIONS, MAX_CONNECTIONS),
        }
    }
}

/// Field-by-field validator for tuning requests
#[derive(Debug, Clone, Default)]
pub struct ResourceSpecValidator {
    limits: ValidationLimits,
}

impl ResourceSpecValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with tighter (or looser) bounds
    pub fn with_limits(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Validate a raw request, reporting every offending field
    pub fn validate(&self, raw: &RawTuneRequest) -> Result<ResourceSpec, ValidationError> {
        let mut issues = Vec::new();

        let memory = self.check_memory(raw.memory.as_ref());
        let cpus = self.check_cpus(raw.cpus.as_ref());
        let max_connections = self.check_max_connections(raw.max_connections.as_ref());
        let profile = check_profile(raw.profile.as_ref());
        let pg_version = check_pg_version(raw.pg_version.as_ref());

        let memory = memory.map_err(|i| issues.push(i)).ok();
        let cpus = cpus.map_err(|i| issues.push(i)).ok();
        let max_connections = max_connections.map_err(|i| issues.push(i)).ok();
        let profile = profile.map_err(|i| issues.push(i)).ok();
        let pg_version = pg_version.map_err(|i| issues.push(i)).ok();

        match (memory, cpus, max_connections, profile, pg_version) {
            (Some(memory_mb), Some(cpu_count), Some(max_connections), Some(profile), Some(pg_version))
                if issues.is_empty() =>
            {
                Ok(ResourceSpec {
                    memory_mb,
                    cpu_count,
                    max_connections,
                    profile,
                    pg_version,
                })
            }
            _ => Err(ValidationError { issues }),
        }
    }

    fn check_memory(&self, value: Option<&Value>) -> Result<u32, FieldIssue> {
        let (min, max) = self.limits.memory_mb;
        let mb = require_integer("memory", value, "Memory must be a whole number of MB")?;
        if mb < min {
            return Err(FieldIssue::new(
                "memory",
                format!("Memory must be at least {} MB", min),
            ));
        }
        if mb > max {
            return Err(FieldIssue::new(
                "memory",
                format!("Memory must not exceed {} MB", max),
            ));
        }
        to_u32("memory", mb)
    }

    fn check_cpus(&self, value: Option<&Value>) -> Result<u32, FieldIssue> {
        let (min, max) = self.limits.cpus;
        let cpus = require_integer("cpus", value, "CPU count must be a whole number")?;
        if cpus < min {
            return Err(FieldIssue::new(
                "cpus",
                format!("Must have at least {} CPU", min),
            ));
        }
        if cpus > max {
            return Err(FieldIssue::new(
                "cpus",
                format!("Cannot exceed {} CPUs", max),
            ));
        }
        to_u32("cpus", cpus)
    }

    fn check_max_connections(&self, value: Option<&Value>) -> Result<Option<u32>, FieldIssue> {
        // Absent and null both mean "let each strategy choose"
        let value = match value {
            None | Some(Value::Null) => return Ok(None),
            Some(v) => v,
        };

        let (min, max) = self.limits.max_connections;
        let conns = require_integer(
            "maxConnections",
            Some(value),
            "Max connections must be a whole number",
        )?;
        if conns < min {
            return Err(FieldIssue::new(
                "maxConnections",
                format!("Max connections must be at least {}", min),
            ));
        }
        if conns > max {
            return Err(FieldIssue::new(
                "maxConnections",
                format!("Max connections must not exceed {}", max),
            ));
        }
        to_u32("maxConnections", conns).map(Some)
    }
}

fn check_profile(value: Option<&Value>) -> Result<Profile, FieldIssue> {
    match value {
        None | Some(Value::Null) => Err(FieldIssue::new("profile", "Profile is required")),
        Some(Value::String(s)) => s.parse().map_err(|_| {
            FieldIssue::new(
                "profile",
                format!(
                    "Profile must be one of: {}",
                    Profile::ALL.map(|p| p.as_str()).join(", ")
                ),
            )
        }),
        Some(_) => Err(FieldIssue::new("profile", "Profile must be a string")),
    }
}

fn check_pg_version(value: Option<&Value>) -> Result<PgVersion, FieldIssue> {
    match value {
        None | Some(Value::Null) => Err(FieldIssue::new(
            "pgVersion",
            "PostgreSQL version is required",
        )),
        Some(Value::String(s)) => s.parse().map_err(|_| {
            FieldIssue::new(
                "pgVersion",
                format!(
                    "PostgreSQL version must be one of: {}",
                    PgVersion::ALL.map(|v| v.as_str()).join(", ")
                ),
            )
        }),
        Some(_) => Err(FieldIssue::new(
            "pgVersion",
            "PostgreSQL version must be a string",
        )),
    }
}

/// Interpret a JSON number or numeric string as a whole number.
///
/// "4" and 4.0 are accepted; "4.5", 4.5, "", "four" and non-scalars are not.
fn require_integer(field: &str, value: Option<&Value>, message: &str) -> Result<i64, FieldIssue> {
    let parsed = match value {
        None | Some(Value::Null) => {
            return Err(FieldIssue::new(field, format!("{} is required", field)))
        }
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(whole_number)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
        }
        Some(_) => None,
    };

    parsed.ok_or_else(|| FieldIssue::new(field, message))
}

fn whole_number(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn to_u32(field: &str, value: i64) -> Result<u32, FieldIssue> {
    u32::try_from(value).map_err(|_| FieldIssue::new(field, "value out of range"))
}
