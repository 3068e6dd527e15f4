//! Heuristic configuration calculator
//!
//! Produces a configuration snippet without the external oracle, using
//! fixed memory-partitioning rules. Pure and total: any valid
//! [`ResourceSpec`] yields output, and the same spec always yields the
//! same bytes.

use crate::models::ResourceSpec;
use serde::Serialize;

/// Share of memory given to shared_buffers (1/4)
pub const SHARED_BUFFERS_DIVISOR: u64 = 4;

/// Upper bound for maintenance_work_mem in MiB
pub const MAX_MAINTENANCE_WORK_MEM_MB: u64 = 2048;

/// Fixed wal_buffers size in MiB
pub const WAL_BUFFERS_MB: u64 = 16;

pub const CHECKPOINT_COMPLETION_TARGET: &str = "0.9";

/// Cap on parallel workers per gather node
pub const MAX_PARALLEL_PER_GATHER: u32 = 4;

/// Cap on TimescaleDB background workers
pub const MAX_TIMESCALE_BACKGROUND_WORKERS: u32 = 16;

/// Smallest value emitted for any memory setting, in MiB
pub const MIN_MEMORY_SETTING_MB: u64 = 1;

/// Computed parameter values, memory in MiB
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeuristicRecommendation {
    pub shared_buffers_mb: u64,
    pub effective_cache_size_mb: u64,
    pub maintenance_work_mem_mb: u64,
    pub work_mem_mb: u64,
    pub wal_buffers_mb: u64,
    pub max_worker_processes: u32,
    pub max_parallel_workers_per_gather: u32,
    pub max_parallel_workers: u32,
    pub timescaledb_max_background_workers: u32,
    pub max_connections: Option<u32>,
}

impl HeuristicRecommendation {
    /// Apply the partitioning rules to a spec
    pub fn for_spec(spec: &ResourceSpec) -> Self {
        let memory = u64::from(spec.memory_mb());
        let cpus = spec.cpu_count().max(1);

        let shared_buffers = memory / SHARED_BUFFERS_DIVISOR;
        let effective_cache = memory * 3 / 4;
        let maintenance = (memory / 16).min(MAX_MAINTENANCE_WORK_MEM_MB);
        let work_mem = memory / (4 * u64::from(cpus));

        Self {
            shared_buffers_mb: shared_buffers.max(MIN_MEMORY_SETTING_MB),
            effective_cache_size_mb: effective_cache.max(MIN_MEMORY_SETTING_MB),
            maintenance_work_mem_mb: maintenance.max(MIN_MEMORY_SETTING_MB),
            work_mem_mb: work_mem.max(MIN_MEMORY_SETTING_MB),
            wal_buffers_mb: WAL_BUFFERS_MB,
            max_worker_processes: cpus,
            max_parallel_workers_per_gather: cpus.min(MAX_PARALLEL_PER_GATHER),
            max_parallel_workers: cpus,
            timescaledb_max_background_workers: cpus
                .saturating_mul(2)
                .min(MAX_TIMESCALE_BACKGROUND_WORKERS),
            max_connections: spec.max_connections(),
        }
    }

    /// Parameter assignments in output order
    pub fn parameters(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("shared_buffers", format!("{}MB", self.shared_buffers_mb)),
            ("effective_cache_size", format!("{}MB", self.effective_cache_size_mb)),
            ("maintenance_work_mem", format!("{}MB", self.maintenance_work_mem_mb)),
            ("work_mem", format!("{}MB", self.work_mem_mb)),
            ("wal_buffers", format!("{}MB", self.wal_buffers_mb)),
            (
                "checkpoint_completion_target",
                CHECKPOINT_COMPLETION_TARGET.to_string(),
            ),
            ("max_worker_processes", self.max_worker_processes.to_string()),
            (
                "max_parallel_workers_per_gather",
                self.max_parallel_workers_per_gather.to_string(),
            ),
            ("max_parallel_workers", self.max_parallel_workers.to_string()),
            (
                "timescaledb.max_background_workers",
                self.timescaledb_max_background_workers.to_string(),
            ),
        ];

        if let Some(conns) = self.max_connections {
            params.push(("max_connections", conns.to_string()));
        }

        params
    }
}

/// Renders heuristic recommendations as a configuration snippet
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCalculator;

impl HeuristicCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn recommend(&self, spec: &ResourceSpec) -> HeuristicRecommendation {
        HeuristicRecommendation::for_spec(spec)
    }

    /// Configuration text: provenance comments, then one `key = value` per line
    pub fn render(&self, spec: &ResourceSpec) -> String {
        let header = [
            format!(
                "# Heuristic estimate for PostgreSQL {} (profile: {}, memory: {}MB, cpus: {})",
                spec.pg_version(),
                spec.profile(),
                spec.memory_mb(),
                spec.cpu_count()
            ),
            "# These values are estimates, not verified by timescaledb-tune.".to_string(),
        ];
        let assignments = self
            .recommend(spec)
            .parameters()
            .into_iter()
            .map(|(key, value)| format!("{} = {}", key, value));

        header
            .into_iter()
            .chain(assignments)
            .map(|line| line + "\n")
            .collect()
    }
}
