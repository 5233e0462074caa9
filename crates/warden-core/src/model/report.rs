//! Report and its bug path — the core finding entity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::{DetectionStatus, ExtendedDataKind, ReviewStatus, Severity};

/// A finding produced by an analyzer against one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub run_id: i64,
    pub file_id: i64,
    pub line: i64,
    pub column: i64,
    pub checker_id: String,
    pub analyzer_name: String,
    pub checker_msg: String,
    pub severity: Severity,
    pub report_hash: String,
    pub bug_path_length: i64,
    pub detected_at: i64,
    pub fixed_at: Option<i64>,
    pub detection_status: DetectionStatus,
    pub review_status: ReviewStatus,
    /// Set when the review status came from an in-source comment on the
    /// warning line rather than a stored `ReviewStatusRule` — in-source
    /// comments take precedence during reconciliation (§4.4 step 7).
    pub review_status_is_in_source: bool,
    pub annotations: BTreeMap<String, String>,
}

/// One position in a bug path — a span plus the file it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugPathPosition {
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub file_id: i64,
}

impl BugPathPosition {
    /// A span is empty when start and end coincide — the canonicalizer
    /// drops these before building the canonical bug path.
    pub fn is_empty_span(&self) -> bool {
        self.start_line == self.end_line
            && self.start_col == self.end_col
    }
}

/// One step in the ordered bug path event sequence attached to a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugPathEvent {
    pub position: BugPathPosition,
    pub msg: String,
}

/// An extended-data entry (note, macro expansion, or fixit) attached to a
/// report, tagged with its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedReportData {
    pub position: BugPathPosition,
    pub msg: String,
    pub kind: ExtendedDataKind,
}

/// The canonical bug path produced by the canonicalizer: the ordered event
/// list plus any extended data, already filtered to non-empty spans.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BugPath {
    pub events: Vec<BugPathEvent>,
    pub extended_data: Vec<ExtendedReportData>,
}

impl BugPath {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
