//! Product, Run, RunHistory, File and FileContent — the tenant-owned
//! object graph above a Report.

use serde::{Deserialize, Serialize};

/// A tenant. Owns exactly one database schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub endpoint: String,
    pub displayed_name: String,
    pub description: Option<String>,
    pub db_connection_spec: String,
    pub run_limit: Option<u32>,
    pub review_status_change_disabled: bool,
}

/// A named stream of analyses over time, never shared between products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub created_at: i64,
    pub latest_duration: Option<i64>,
}

/// One storage event (snapshot) of a Run. The newest row by `stored_at`
/// is the current state of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHistory {
    pub id: i64,
    pub run_id: i64,
    pub version_tag: Option<String>,
    pub stored_at: i64,
    pub user: String,
    pub cc_client_version: Option<String>,
    pub description: Option<String>,
    pub counters: DetectionStatusCounters,
}

/// Per-status aggregate counts attached to a RunHistory row, refreshed at
/// the end of every ingestion (§4.4 step 8).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DetectionStatusCounters {
    pub new: i64,
    pub resolved: i64,
    pub unresolved: i64,
    pub reopened: i64,
    pub off: i64,
    pub unavailable: i64,
}

/// A logical path within a run-history, pointing at a FileContent by hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: i64,
    pub run_id: i64,
    pub filepath: String,
    pub content_hash: String,
}

/// A content-addressed, immutable blob. Identical hashes share storage
/// within one product's database but not across products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContent {
    pub content_hash: String,
    pub bytes: Vec<u8>,
    pub blame: Option<Vec<u8>>,
}

/// A named path-glob filter used by queries and UI grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceComponent {
    pub id: i64,
    pub name: String,
    /// Newline-separated `{+pattern|-pattern}` entries.
    pub value: String,
}

/// Per-analyzer run statistics from the bundle's optional `statistics/`
/// tree (§3 supplement — the distillation describes the bundle format but
/// not the read path back out).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerStatistics {
    pub run_history_id: i64,
    pub analyzer_type: String,
    pub version: Option<String>,
    pub successful: bool,
    pub failed_file_paths: Vec<String>,
}
