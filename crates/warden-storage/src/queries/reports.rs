//! `reports` table: the finding entity, plus the dynamic filtered/sorted
//! listing used by `get_run_results` and `get_run_result_count`.

use std::collections::{BTreeMap, HashSet};

use rusqlite::{params, Connection};
use warden_core::filter::{CompareData, CountDimension, ReportFilter, SortMode};
use warden_core::model::{DetectionStatus, DiffType, Report, ReviewStatus, Severity};
use warden_core::WardenError;

use super::report_filter_sql;
use crate::sqe;

#[derive(Debug, Clone)]
pub struct NewReport {
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
    pub detection_status: DetectionStatus,
}

pub fn insert_report(conn: &Connection, r: &NewReport) -> Result<i64, WardenError> {
    conn.execute(
        "INSERT INTO reports
            (run_id, file_id, line, column, checker_id, analyzer_name, checker_msg,
             severity, report_hash, bug_path_length, detected_at, detection_status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            r.run_id,
            r.file_id,
            r.line,
            r.column,
            r.checker_id,
            r.analyzer_name,
            r.checker_msg,
            r.severity.as_str(),
            r.report_hash,
            r.bug_path_length,
            r.detected_at,
            r.detection_status.as_str(),
        ],
    )
    .map_err(sqe)?;
    Ok(conn.last_insert_rowid())
}

/// Re-point an existing report row at a fresh ingestion's location and
/// status — used when a `report_hash` already had a row for this run
/// (§4.4 step 6: `UNRESOLVED`/`REOPENED` transitions update in place
/// rather than inserting a second row for the same hash).
#[allow(clippy::too_many_arguments)]
pub fn update_for_reingestion(
    conn: &Connection,
    report_id: i64,
    file_id: i64,
    line: i64,
    column: i64,
    checker_msg: &str,
    severity: Severity,
    bug_path_length: i64,
    detection_status: DetectionStatus,
) -> Result<(), WardenError> {
    conn.execute(
        "UPDATE reports SET
            file_id = ?2, line = ?3, column = ?4, checker_msg = ?5,
            severity = ?6, bug_path_length = ?7, detection_status = ?8, fixed_at = NULL
         WHERE id = ?1",
        params![
            report_id,
            file_id,
            line,
            column,
            checker_msg,
            severity.as_str(),
            bug_path_length,
            detection_status.as_str(),
        ],
    )
    .map_err(sqe)?;
    Ok(())
}

pub fn set_detection_status(conn: &Connection, report_id: i64, status: DetectionStatus, fixed_at: Option<i64>) -> Result<(), WardenError> {
    conn.execute(
        "UPDATE reports SET detection_status = ?2, fixed_at = ?3 WHERE id = ?1",
        params![report_id, status.as_str(), fixed_at],
    )
    .map_err(sqe)?;
    Ok(())
}

pub fn set_review_status(conn: &Connection, report_id: i64, status: ReviewStatus, is_in_source: bool) -> Result<(), WardenError> {
    conn.execute(
        "UPDATE reports SET review_status = ?2, is_in_source = ?3 WHERE id = ?1",
        params![report_id, status.as_str(), is_in_source],
    )
    .map_err(sqe)?;
    Ok(())
}

/// Delete a report row outright (bug path events / extended data cascade
/// via the FK). Used by a `force` ingestion to replace a candidate report
/// that the new bundle didn't reproduce, rather than transitioning it to
/// `RESOLVED` (spec §4.4 step 4).
pub fn delete_report(conn: &Connection, report_id: i64) -> Result<(), WardenError> {
    conn.execute("DELETE FROM reports WHERE id = ?1", params![report_id]).map_err(sqe)?;
    Ok(())
}

/// Every report ever recorded for `run_id`, one row per `report_hash`
/// (the engine updates rows in place rather than duplicating them across
/// ingestions) — the "previous state" snapshot reconciliation diffs the
/// freshly canonicalized reports against.
pub fn list_for_run(conn: &Connection, run_id: i64) -> Result<Vec<Report>, WardenError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, run_id, file_id, line, column, checker_id, analyzer_name, checker_msg,
                    severity, report_hash, bug_path_length, detected_at, fixed_at,
                    detection_status, review_status, is_in_source, annotations
             FROM reports WHERE run_id = ?1",
        )
        .map_err(sqe)?;
    let rows = stmt.query_map(params![run_id], map_report_row).map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)?);
    }
    Ok(out)
}

/// Propagate a review status to every report sharing `bug_hash` — the
/// mechanism behind triage propagation. Reports carrying an in-source
/// review comment are skipped: in-source always outranks a stored rule
/// (spec §4.4 step 7 / §9 open question, resolved "in-source wins").
pub fn set_review_status_by_hash(conn: &Connection, bug_hash: &str, status: ReviewStatus) -> Result<u64, WardenError> {
    let affected = conn
        .execute(
            "UPDATE reports SET review_status = ?2 WHERE report_hash = ?1 AND is_in_source = 0",
            params![bug_hash, status.as_str()],
        )
        .map_err(sqe)?;
    Ok(affected as u64)
}

pub fn get_report(conn: &Connection, report_id: i64) -> Result<Option<Report>, WardenError> {
    conn.query_row(
        "SELECT id, run_id, file_id, line, column, checker_id, analyzer_name, checker_msg,
                severity, report_hash, bug_path_length, detected_at, fixed_at,
                detection_status, review_status, is_in_source, annotations
         FROM reports WHERE id = ?1",
        params![report_id],
        map_report_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

pub fn get_run_results(
    conn: &Connection,
    run_ids: &[i64],
    limit: u32,
    offset: u32,
    sort_modes: &[SortMode],
    filter: &ReportFilter,
    cmp_data: Option<&CompareData>,
) -> Result<Vec<Report>, WardenError> {
    let built = report_filter_sql::build(conn, run_ids, filter, cmp_data, sort_modes)?;
    let unique_clause = if filter.is_unique {
        "GROUP BY reports.report_hash HAVING reports.id = MIN(reports.id)"
    } else {
        ""
    };
    let sql = format!(
        "SELECT reports.id, reports.run_id, reports.file_id, reports.line, reports.column,
                reports.checker_id, reports.analyzer_name, reports.checker_msg,
                reports.severity, reports.report_hash, reports.bug_path_length,
                reports.detected_at, reports.fixed_at, reports.detection_status,
                reports.review_status, reports.is_in_source, reports.annotations
         FROM reports JOIN files ON files.id = reports.file_id
         WHERE {where_clause}
         {unique_clause}
         ORDER BY {order_clause}
         LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
        where_clause = built.where_clause,
        unique_clause = unique_clause,
        order_clause = built.order_clause,
        limit_idx = built.params.len() + 1,
        offset_idx = built.params.len() + 2,
    );

    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let mut bound = built.params;
    bound.push(rusqlite::types::Value::from(limit as i64));
    bound.push(rusqlite::types::Value::from(offset as i64));

    let rows = stmt
        .query_map(rusqlite::params_from_iter(bound.iter()), map_report_row)
        .map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)?);
    }
    Ok(out)
}

pub fn get_run_result_count(
    conn: &Connection,
    run_ids: &[i64],
    filter: &ReportFilter,
    cmp_data: Option<&CompareData>,
) -> Result<i64, WardenError> {
    let built = report_filter_sql::build(conn, run_ids, filter, cmp_data, &[])?;
    let sql = if filter.is_unique {
        format!(
            "SELECT COUNT(DISTINCT reports.report_hash) FROM reports
             JOIN files ON files.id = reports.file_id WHERE {}",
            built.where_clause
        )
    } else {
        format!(
            "SELECT COUNT(*) FROM reports JOIN files ON files.id = reports.file_id WHERE {}",
            built.where_clause
        )
    };
    conn.query_row(&sql, rusqlite::params_from_iter(built.params.iter()), |row| row.get(0))
        .map_err(sqe)
}

/// One of the seven `get_*_counts` aggregations (§4.5). Groups the filtered
/// report set by `dimension` and counts rows (or distinct hashes, under
/// `filter.is_unique`) per group value.
pub fn get_counts(
    conn: &Connection,
    run_ids: &[i64],
    dimension: CountDimension,
    filter: &ReportFilter,
    cmp_data: Option<&CompareData>,
) -> Result<BTreeMap<String, i64>, WardenError> {
    let built = report_filter_sql::build(conn, run_ids, filter, cmp_data, &[])?;
    let dim_expr = match dimension {
        CountDimension::Severity => "reports.severity",
        CountDimension::CheckerMsg => "reports.checker_msg",
        CountDimension::ReviewStatus => "reports.review_status",
        CountDimension::DetectionStatus => "reports.detection_status",
        CountDimension::File => "files.filepath",
        CountDimension::Checker => "reports.checker_id",
        CountDimension::AnalyzerName => "reports.analyzer_name",
        CountDimension::RunHistoryTag => {
            "(SELECT rh.version_tag FROM run_history rh WHERE rh.run_id = reports.run_id ORDER BY rh.stored_at DESC LIMIT 1)"
        }
    };
    let count_expr = if filter.is_unique { "DISTINCT reports.report_hash" } else { "*" };
    let sql = format!(
        "SELECT COALESCE({dim_expr}, ''), COUNT({count_expr})
         FROM reports JOIN files ON files.id = reports.file_id
         WHERE {where_clause}
         GROUP BY 1",
        dim_expr = dim_expr,
        count_expr = count_expr,
        where_clause = built.where_clause,
    );
    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(built.params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(sqe)?;
    let mut out = BTreeMap::new();
    for row in rows {
        let (key, count) = row.map_err(sqe)?;
        out.insert(key, count);
    }
    Ok(out)
}

/// `get_diff_results_hash`: of `hashes`, which satisfy `diff_type` between
/// `run_ids` (left) and `cmp_run_ids` (right)? Implemented as two set
/// fetches plus a set operation rather than a single dynamic query, since
/// the "which side is restricted by what" rules fall out more directly
/// that way than folding everything into one WHERE clause.
#[allow(clippy::too_many_arguments)]
pub fn get_diff_results_hash(
    conn: &Connection,
    run_ids: &[i64],
    cmp_run_ids: &[i64],
    hashes: &[String],
    diff_type: DiffType,
    skip_statuses: &[DetectionStatus],
    tag_ids: &[i64],
) -> Result<Vec<String>, WardenError> {
    if hashes.is_empty() {
        return Ok(Vec::new());
    }
    let lhs = fetch_hash_set(conn, run_ids, tag_ids, skip_statuses, hashes)?;
    let rhs = fetch_hash_set(conn, cmp_run_ids, tag_ids, skip_statuses, hashes)?;
    let result_set: HashSet<String> = match diff_type {
        DiffType::New => rhs.difference(&lhs).cloned().collect(),
        DiffType::Resolved => lhs.difference(&rhs).cloned().collect(),
        DiffType::Unresolved => lhs.intersection(&rhs).cloned().collect(),
    };
    Ok(hashes.iter().filter(|h| result_set.contains(h.as_str())).cloned().collect())
}

fn fetch_hash_set(
    conn: &Connection,
    run_ids: &[i64],
    tag_ids: &[i64],
    skip_statuses: &[DetectionStatus],
    hashes: &[String],
) -> Result<HashSet<String>, WardenError> {
    if run_ids.is_empty() {
        return Ok(HashSet::new());
    }
    let mut clauses = vec![format!("run_id IN ({})", std::iter::repeat("?").take(run_ids.len()).collect::<Vec<_>>().join(", "))];
    let mut params: Vec<rusqlite::types::Value> = run_ids.iter().map(|v| rusqlite::types::Value::from(*v)).collect();

    if !tag_ids.is_empty() {
        clauses.push(format!(
            "run_id IN (SELECT run_id FROM run_history WHERE id IN ({}))",
            std::iter::repeat("?").take(tag_ids.len()).collect::<Vec<_>>().join(", ")
        ));
        params.extend(tag_ids.iter().map(|v| rusqlite::types::Value::from(*v)));
    }
    if !skip_statuses.is_empty() {
        clauses.push(format!(
            "detection_status NOT IN ({})",
            std::iter::repeat("?").take(skip_statuses.len()).collect::<Vec<_>>().join(", ")
        ));
        params.extend(skip_statuses.iter().map(|s| rusqlite::types::Value::from(s.as_str().to_string())));
    }
    clauses.push(format!(
        "report_hash IN ({})",
        std::iter::repeat("?").take(hashes.len()).collect::<Vec<_>>().join(", ")
    ));
    params.extend(hashes.iter().map(|h| rusqlite::types::Value::from(h.clone())));

    let sql = format!("SELECT DISTINCT report_hash FROM reports WHERE {}", clauses.join(" AND "));
    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| row.get::<_, String>(0))
        .map_err(sqe)?;
    let mut out = HashSet::new();
    for row in rows {
        out.insert(row.map_err(sqe)?);
    }
    Ok(out)
}

fn map_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    let severity: String = row.get(8)?;
    let detection_status: String = row.get(13)?;
    let review_status: String = row.get(14)?;
    let is_in_source: bool = row.get(15)?;
    let annotations_json: String = row.get(16)?;
    let annotations: BTreeMap<String, String> = serde_json::from_str(&annotations_json).unwrap_or_default();

    Ok(Report {
        id: row.get(0)?,
        run_id: row.get(1)?,
        file_id: row.get(2)?,
        line: row.get(3)?,
        column: row.get(4)?,
        checker_id: row.get(5)?,
        analyzer_name: row.get(6)?,
        checker_msg: row.get(7)?,
        severity: Severity::parse(&severity),
        report_hash: row.get(9)?,
        bug_path_length: row.get(10)?,
        detected_at: row.get(11)?,
        fixed_at: row.get(12)?,
        detection_status: DetectionStatus::parse(&detection_status).unwrap_or(DetectionStatus::Unavailable),
        review_status: ReviewStatus::parse(&review_status).unwrap_or_default(),
        review_status_is_in_source: is_in_source,
        annotations,
    })
}
