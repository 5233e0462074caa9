//! `review_status_rules` table: per-bug-hash triage verdicts.

use rusqlite::{params, Connection};
use warden_core::filter::ReviewStatusRuleFilter;
use warden_core::model::{ReviewStatus, ReviewStatusRule};
use warden_core::WardenError;

use crate::sqe;

pub fn upsert(
    conn: &Connection,
    bug_hash: &str,
    status: ReviewStatus,
    message: Option<&str>,
    author: &str,
    created_at: i64,
) -> Result<ReviewStatusRule, WardenError> {
    conn.execute(
        "INSERT INTO review_status_rules (bug_hash, status, message, author, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(bug_hash) DO UPDATE SET
            status = excluded.status, message = excluded.message,
            author = excluded.author, created_at = excluded.created_at",
        params![bug_hash, status.as_str(), message, author, created_at],
    )
    .map_err(sqe)?;

    get_by_hash(conn, bug_hash)?.ok_or_else(|| WardenError::database("rule vanished after upsert"))
}

pub fn get_by_hash(conn: &Connection, bug_hash: &str) -> Result<Option<ReviewStatusRule>, WardenError> {
    conn.query_row(
        "SELECT id, bug_hash, status, message, author, created_at FROM review_status_rules WHERE bug_hash = ?1",
        params![bug_hash],
        map_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

pub fn list(conn: &Connection, filter: &ReviewStatusRuleFilter, limit: u32, offset: u32) -> Result<Vec<ReviewStatusRule>, WardenError> {
    let mut clauses = Vec::new();
    let mut params: Vec<rusqlite::types::Value> = Vec::new();

    if !filter.report_hashes.is_empty() {
        let ph: Vec<String> = (0..filter.report_hashes.len()).map(|_| "?".to_string()).collect();
        clauses.push(format!("bug_hash IN ({})", ph.join(", ")));
        params.extend(filter.report_hashes.iter().map(|h| rusqlite::types::Value::from(h.clone())));
    }
    if !filter.review_statuses.is_empty() {
        let ph: Vec<String> = (0..filter.review_statuses.len()).map(|_| "?".to_string()).collect();
        clauses.push(format!("status IN ({})", ph.join(", ")));
        params.extend(filter.review_statuses.iter().map(|s| rusqlite::types::Value::from(s.as_str().to_string())));
    }
    if !filter.authors.is_empty() {
        let ph: Vec<String> = (0..filter.authors.len()).map(|_| "?".to_string()).collect();
        clauses.push(format!("author IN ({})", ph.join(", ")));
        params.extend(filter.authors.iter().map(|a| rusqlite::types::Value::from(a.clone())));
    }

    let where_clause = if clauses.is_empty() { "1=1".to_string() } else { clauses.join(" AND ") };
    let sql = format!(
        "SELECT id, bug_hash, status, message, author, created_at FROM review_status_rules
         WHERE {where_clause} ORDER BY id LIMIT ? OFFSET ?"
    );
    params.push(rusqlite::types::Value::from(limit as i64));
    params.push(rusqlite::types::Value::from(offset as i64));

    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), map_row).map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)?);
    }
    Ok(out)
}

pub fn remove_matching(conn: &Connection, filter: &ReviewStatusRuleFilter) -> Result<u64, WardenError> {
    // `no_associated_reports` and large result sets are evaluated in Rust
    // against `list`, then deleted by id — bulk delete by dynamic filter
    // alone can't express the "no matching report" join cheaply here.
    let rules = list(conn, filter, u32::MAX, 0)?;
    let mut removed = 0u64;
    for rule in rules {
        if filter.no_associated_reports {
            let has_report: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM reports WHERE report_hash = ?1)",
                    params![rule.bug_hash],
                    |row| row.get(0),
                )
                .map_err(sqe)?;
            if has_report {
                continue;
            }
        }
        conn.execute("DELETE FROM review_status_rules WHERE id = ?1", params![rule.id])
            .map_err(sqe)?;
        removed += 1;
    }
    Ok(removed)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewStatusRule> {
    let status: String = row.get(2)?;
    Ok(ReviewStatusRule {
        id: row.get(0)?,
        bug_hash: row.get(1)?,
        status: ReviewStatus::parse(&status).unwrap_or_default(),
        message: row.get(3)?,
        author: row.get(4)?,
        created_at: row.get(5)?,
    })
}
