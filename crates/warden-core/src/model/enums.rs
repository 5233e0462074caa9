//! Closed enums shared across the data model.

use serde::{Deserialize, Serialize};

/// Automated per-ingestion state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionStatus {
    New,
    Resolved,
    Unresolved,
    Reopened,
    Off,
    Unavailable,
}

impl DetectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Resolved => "RESOLVED",
            Self::Unresolved => "UNRESOLVED",
            Self::Reopened => "REOPENED",
            Self::Off => "OFF",
            Self::Unavailable => "UNAVAILABLE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "NEW" => Self::New,
            "RESOLVED" => Self::Resolved,
            "UNRESOLVED" => Self::Unresolved,
            "REOPENED" => Self::Reopened,
            "OFF" => Self::Off,
            "UNAVAILABLE" => Self::Unavailable,
            _ => return None,
        })
    }
}

/// Human triage verdict on a report hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    Unreviewed,
    Confirmed,
    FalsePositive,
    Intentional,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreviewed => "UNREVIEWED",
            Self::Confirmed => "CONFIRMED",
            Self::FalsePositive => "FALSE_POSITIVE",
            Self::Intentional => "INTENTIONAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "UNREVIEWED" => Self::Unreviewed,
            "CONFIRMED" => Self::Confirmed,
            "FALSE_POSITIVE" => Self::FalsePositive,
            "INTENTIONAL" => Self::Intentional,
            _ => return None,
        })
    }
}

impl Default for ReviewStatus {
    fn default() -> Self {
        Self::Unreviewed
    }
}

/// Analyzer-reported severity. Ordered `Critical` (highest) to `Style`
/// (lowest) so sort modes can compare by discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Style,
    Unspecified,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Style => "STYLE",
            Self::Unspecified => "UNSPECIFIED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "CRITICAL" => Self::Critical,
            "HIGH" => Self::High,
            "MEDIUM" => Self::Medium,
            "LOW" => Self::Low,
            "STYLE" => Self::Style,
            _ => Self::Unspecified,
        }
    }
}

/// Tag on an extended-report-data entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtendedDataKind {
    Note,
    Macro,
    Fixit,
}

impl ExtendedDataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "NOTE",
            Self::Macro => "MACRO",
            Self::Fixit => "FIXIT",
        }
    }
}

/// Kind of comment attached to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentKind {
    User,
    System,
}

/// `get_diff_results_hash` comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffType {
    New,
    Resolved,
    Unresolved,
}

/// Result of comparing a product's code schema revision against the
/// persisted one (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbStatus {
    Ok,
    Missing,
    SchemaMismatchOk,
    SchemaMismatchNo,
    SchemaMissing,
    SchemaInitError,
    SchemaUpgradeFailed,
    FailedToConnect,
}

impl DbStatus {
    /// Whether queries may be served against a product in this state.
    pub fn servable(&self) -> bool {
        matches!(self, Self::Ok | Self::SchemaMismatchOk)
    }
}

/// Lifecycle state of a background task (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Allocated,
    Enqueued,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Left `Running` across a service restart; the reaper marks these on
    /// startup since no worker is left alive to finish them.
    Dropped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allocated => "ALLOCATED",
            Self::Enqueued => "ENQUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Dropped => "DROPPED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "ALLOCATED" => Self::Allocated,
            "ENQUEUED" => Self::Enqueued,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            "DROPPED" => Self::Dropped,
            _ => return None,
        })
    }

    /// True once a task will never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::Dropped)
    }
}

/// Kind of work a task record tracks — used to key the FIFO-per-kind
/// worker pool (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    Store,
    Cleanup,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "STORE",
            Self::Cleanup => "CLEANUP",
        }
    }
}
