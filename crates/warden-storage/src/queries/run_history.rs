//! `run_history` table: one storage event (snapshot) of a run.

use rusqlite::{params, Connection};
use warden_core::model::{DetectionStatusCounters, RunHistory};
use warden_core::WardenError;

use crate::sqe;

#[derive(Debug, Clone)]
pub struct RunHistoryRecord {
    pub id: i64,
    pub run_id: i64,
    pub version_tag: Option<String>,
    pub stored_at: i64,
    pub user: String,
    pub cc_client_version: Option<String>,
    pub description: Option<String>,
    pub counters: DetectionStatusCounters,
}

impl From<RunHistoryRecord> for RunHistory {
    fn from(r: RunHistoryRecord) -> Self {
        RunHistory {
            id: r.id,
            run_id: r.run_id,
            version_tag: r.version_tag,
            stored_at: r.stored_at,
            user: r.user,
            cc_client_version: r.cc_client_version,
            description: r.description,
            counters: r.counters,
        }
    }
}

pub fn insert_run_history(
    conn: &Connection,
    run_id: i64,
    version_tag: Option<&str>,
    stored_at: i64,
    user: &str,
    cc_client_version: Option<&str>,
    description: Option<&str>,
) -> Result<i64, WardenError> {
    conn.execute(
        "INSERT INTO run_history (run_id, version_tag, stored_at, user, cc_client_version, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![run_id, version_tag, stored_at, user, cc_client_version, description],
    )
    .map_err(sqe)?;
    Ok(conn.last_insert_rowid())
}

pub fn update_counters(conn: &Connection, run_history_id: i64, counters: &DetectionStatusCounters) -> Result<(), WardenError> {
    conn.execute(
        "UPDATE run_history SET
            count_new = ?2, count_resolved = ?3, count_unresolved = ?4,
            count_reopened = ?5, count_off = ?6, count_unavailable = ?7
         WHERE id = ?1",
        params![
            run_history_id,
            counters.new,
            counters.resolved,
            counters.unresolved,
            counters.reopened,
            counters.off,
            counters.unavailable,
        ],
    )
    .map_err(sqe)?;
    Ok(())
}

pub fn latest_for_run(conn: &Connection, run_id: i64) -> Result<Option<RunHistoryRecord>, WardenError> {
    conn.query_row(
        "SELECT id, run_id, version_tag, stored_at, user, cc_client_version, description,
                count_new, count_resolved, count_unresolved, count_reopened, count_off, count_unavailable
         FROM run_history WHERE run_id = ?1 ORDER BY stored_at DESC LIMIT 1",
        params![run_id],
        map_run_history_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

/// The run-history row in effect as of a given wall-clock time — the
/// newest row with `stored_at <= as_of`, used for `open_reports_date`
/// "as-of" snapshot semantics.
pub fn as_of(conn: &Connection, run_id: i64, as_of: i64) -> Result<Option<RunHistoryRecord>, WardenError> {
    conn.query_row(
        "SELECT id, run_id, version_tag, stored_at, user, cc_client_version, description,
                count_new, count_resolved, count_unresolved, count_reopened, count_off, count_unavailable
         FROM run_history WHERE run_id = ?1 AND stored_at <= ?2 ORDER BY stored_at DESC LIMIT 1",
        params![run_id, as_of],
        map_run_history_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

fn map_run_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunHistoryRecord> {
    Ok(RunHistoryRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        version_tag: row.get(2)?,
        stored_at: row.get(3)?,
        user: row.get(4)?,
        cc_client_version: row.get(5)?,
        description: row.get(6)?,
        counters: DetectionStatusCounters {
            new: row.get(7)?,
            resolved: row.get(8)?,
            unresolved: row.get(9)?,
            reopened: row.get(10)?,
            off: row.get(11)?,
            unavailable: row.get(12)?,
        },
    })
}
