//! Structured filter, sort and compare value types shared by the query,
//! triage and task crates. Closed field sets — every filterable dimension
//! is a named, typed field rather than an open key/value bag.

use serde::{Deserialize, Serialize};

use crate::model::{DetectionStatus, DiffType, ReviewStatus, Severity, TaskKind, TaskStatus};

/// A `(start, end)` inclusive range over `bug_path_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range<T> {
    pub start: T,
    pub end: T,
}

/// One annotation constraint: values under the same key are OR'd, distinct
/// keys are AND'd (enforced by grouping in `ReportFilter::annotations`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationMatch {
    pub key: String,
    pub values: Vec<String>,
}

/// Filter applied by `get_run_results` and the `get_*_counts` aggregations.
/// Fields form an AND; list-valued fields form an OR within the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilter {
    pub filepath: Vec<String>,
    pub checker_msg: Vec<String>,
    pub checker_name: Vec<String>,
    pub report_hash: Vec<String>,
    pub severity: Vec<Severity>,
    pub review_status: Vec<ReviewStatus>,
    pub detection_status: Vec<DetectionStatus>,
    pub run_name: Vec<String>,
    pub run_tag: Vec<String>,
    pub component_names: Vec<String>,
    pub bug_path_length_range: Option<Range<i64>>,
    pub date_detected: Option<Range<i64>>,
    pub date_fixed: Option<Range<i64>>,
    pub analyzer_names: Vec<String>,
    /// "As-of" wall time used only when evaluating `open_reports_date`
    /// against the RunHistory timeline — server wall time, no attempt at
    /// client clock-skew correction (§9 open question, resolved in spec.md).
    pub open_reports_date: Option<i64>,
    pub cleanup_plan_names: Vec<String>,
    pub file_matches_any_point: Vec<String>,
    pub component_matches_any_point: Vec<String>,
    pub annotations: Vec<AnnotationMatch>,
    /// Collapse rows by `report_hash`, keeping the lowest `id` per hash.
    pub is_unique: bool,
}

/// A single dimension `get_run_results` can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    Filename,
    CheckerName,
    Severity,
    ReviewStatus,
    DetectionStatus,
    BugPathLength,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One key in a stable multi-key sort. Applied in list order; ties broken
/// by `report_id ASC` after the last key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SortMode {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Dimension for one of the seven `get_*_counts` aggregations (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountDimension {
    Severity,
    CheckerMsg,
    ReviewStatus,
    DetectionStatus,
    File,
    Checker,
    AnalyzerName,
    RunHistoryTag,
}

/// Specifies the second run set and comparison mode for a diff query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareData {
    pub run_ids: Vec<i64>,
    pub diff_type: DiffType,
    pub open_reports_date: Option<i64>,
}

/// Filter for `get_review_status_rules`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewStatusRuleFilter {
    pub report_hashes: Vec<String>,
    pub review_statuses: Vec<ReviewStatus>,
    pub authors: Vec<String>,
    pub no_associated_reports: bool,
}

/// Filter for task listing/management operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub kinds: Vec<TaskKind>,
    pub statuses: Vec<TaskStatus>,
    pub product_id: Option<i64>,
    pub usernames: Vec<String>,
}

/// Upper bound on any single page of results, regardless of requested
/// `limit` — the query layer clamps to this.
pub const MAX_QUERY_SIZE: u32 = 500;
