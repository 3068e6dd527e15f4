//! Core data models for the tuning engine

use crate::error::FieldIssue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Workload profile understood by both tuning strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Default,
    Promscale,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Default, Profile::Promscale];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Default => "default",
            Profile::Promscale => "promscale",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown profile '{}'", s))
    }
}

/// Supported PostgreSQL major versions.
///
/// Kept as a closed set of string-named members; "9" or "10" never
/// coerce into the nearest supported release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PgVersion {
    V11,
    V12,
    V13,
    V14,
    V15,
    V16,
    V17,
    V18,
}

impl PgVersion {
    pub const ALL: [PgVersion; 8] = [
        PgVersion::V11,
        PgVersion::V12,
        PgVersion::V13,
        PgVersion::V14,
        PgVersion::V15,
        PgVersion::V16,
        PgVersion::V17,
        PgVersion::V18,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PgVersion::V11 => "11",
            PgVersion::V12 => "12",
            PgVersion::V13 => "13",
            PgVersion::V14 => "14",
            PgVersion::V15 => "15",
            PgVersion::V16 => "16",
            PgVersion::V17 => "17",
            PgVersion::V18 => "18",
        }
    }
}

impl fmt::Display for PgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PgVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PgVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("unsupported PostgreSQL version '{}'", s))
    }
}

impl Serialize for PgVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PgVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Canonical, validated description of the target instance.
///
/// Only [`crate::validator::ResourceSpecValidator`] builds one, so every
/// value in circulation satisfies the documented ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    pub(crate) memory_mb: u32,
    pub(crate) cpu_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_connections: Option<u32>,
    pub(crate) profile: Profile,
    pub(crate) pg_version: PgVersion,
}

impl ResourceSpec {
    /// Available memory in MiB
    pub fn memory_mb(&self) -> u32 {
        self.memory_mb
    }

    pub fn cpu_count(&self) -> u32 {
        self.cpu_count
    }

    pub fn max_connections(&self) -> Option<u32> {
        self.max_connections
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn pg_version(&self) -> PgVersion {
        self.pg_version
    }
}

/// Loosely-typed tuning request as received from an untrusted boundary.
///
/// Every field is kept as raw JSON so the validator can report on all of
/// them at once instead of failing on the first bad type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTuneRequest {
    #[serde(default)]
    pub memory: Option<Value>,
    #[serde(default)]
    pub cpus: Option<Value>,
    #[serde(default)]
    pub profile: Option<Value>,
    #[serde(default)]
    pub pg_version: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<Value>,
}

impl RawTuneRequest {
    /// Build a request from already-typed values (memory in MiB)
    pub fn new(
        memory_mb: impl Into<Value>,
        cpus: impl Into<Value>,
        profile: &str,
        pg_version: &str,
    ) -> Self {
        Self {
            memory: Some(memory_mb.into()),
            cpus: Some(cpus.into()),
            profile: Some(Value::from(profile)),
            pg_version: Some(Value::from(pg_version)),
            max_connections: None,
        }
    }

    pub fn with_max_connections(mut self, max_connections: impl Into<Value>) -> Self {
        self.max_connections = Some(max_connections.into());
        self
    }

    /// Rewrite `memory` from `unit` into MiB ahead of validation
    pub fn in_unit(mut self, unit: MemoryUnit) -> Self {
        self.memory = self.memory.map(|m| unit.to_mebibytes(&m));
        self
    }
}

/// Unit of the `memory` field, resolved by the caller before validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemoryUnit {
    #[default]
    #[serde(rename = "MB")]
    Megabytes,
    #[serde(rename = "GB")]
    Gigabytes,
}

impl FromStr for MemoryUnit {
    type Err = FieldIssue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MB" | "MIB" => Ok(MemoryUnit::Megabytes),
            "GB" | "GIB" => Ok(MemoryUnit::Gigabytes),
            _ => Err(FieldIssue::new(
                "memoryUnit",
                format!("unknown memory unit '{}', expected MB or GB", s),
            )),
        }
    }
}

impl MemoryUnit {
    /// Convert a raw memory value in this unit to MiB.
    ///
    /// Values that are not numeric are passed through untouched so the
    /// validator can report them against the `memory` field.
    pub fn to_mebibytes(&self, raw: &Value) -> Value {
        match self {
            MemoryUnit::Megabytes => raw.clone(),
            MemoryUnit::Gigabytes => {
                let gb = match raw {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                match gb.filter(|v| v.is_finite()) {
                    Some(gb) => {
                        let mb = gb_to_mb(gb);
                        if mb.abs() < i64::MAX as f64 {
                            Value::from(mb as i64)
                        } else {
                            Value::from(mb)
                        }
                    }
                    None => raw.clone(),
                }
            }
        }
    }
}

/// Convert GiB to MiB, rounding to the nearest whole MiB
pub fn gb_to_mb(gb: f64) -> f64 {
    (gb * 1024.0).round()
}

/// Convert MiB to GiB for display
pub fn mb_to_gb(mb: f64) -> f64 {
    mb / 1024.0
}
