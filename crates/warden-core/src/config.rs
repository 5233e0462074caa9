//! Top-level configuration for the Warden report-storage engine.

use serde::{Deserialize, Serialize};

/// Configuration shared by ingestion, storage and the task manager.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WardenConfig {
    /// Maximum accepted bundle size in bytes, checked before decompression.
    pub bundle_size_limit_bytes: Option<u64>,
    /// Default connection pool size for a newly opened product database.
    pub pool_size_default: Option<u32>,
    /// How often a running task must refresh its heartbeat. Default: 30s.
    pub task_heartbeat_interval_secs: Option<u64>,
    /// How long since the last heartbeat before the reaper drops a task. Default: 120s.
    pub task_heartbeat_timeout_secs: Option<u64>,
    /// Upper bound on `limit` for any paginated query. Default: 500.
    pub max_query_size: Option<u32>,
    /// Number of background ingestion workers. 0 = auto-detect via core count.
    pub task_worker_threads: Option<usize>,
}

impl WardenConfig {
    /// Effective bundle size limit, defaulting to 500 MiB.
    pub fn effective_bundle_size_limit_bytes(&self) -> u64 {
        self.bundle_size_limit_bytes.unwrap_or(500 * 1024 * 1024)
    }

    /// Effective default pool size, defaulting to 8 connections.
    pub fn effective_pool_size_default(&self) -> u32 {
        self.pool_size_default.unwrap_or(8)
    }

    /// Effective heartbeat interval, defaulting to 30 seconds.
    pub fn effective_task_heartbeat_interval_secs(&self) -> u64 {
        self.task_heartbeat_interval_secs.unwrap_or(30)
    }

    /// Effective heartbeat timeout, defaulting to 120 seconds.
    pub fn effective_task_heartbeat_timeout_secs(&self) -> u64 {
        self.task_heartbeat_timeout_secs.unwrap_or(120)
    }

    /// Effective max query size, defaulting to 500 (spec hard ceiling).
    pub fn effective_max_query_size(&self) -> u32 {
        self.max_query_size.unwrap_or(500).min(500)
    }

    /// Effective worker thread count, defaulting to the available core count.
    pub fn effective_task_worker_threads(&self) -> usize {
        match self.task_worker_threads {
            Some(0) | None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            Some(n) => n,
        }
    }

    /// Load configuration from a TOML file, falling back to defaults for
    /// any field the file omits.
    pub fn load_from_str(contents: &str) -> Result<Self, crate::WardenError> {
        toml::from_str(contents)
            .map_err(|e| crate::WardenError::general(format!("invalid config: {e}")))
    }
}
