//! `tasks` table: persisted background task records.

use rusqlite::{params, Connection};
use warden_core::filter::TaskFilter;
use warden_core::model::{Task, TaskKind, TaskStatus};
use warden_core::WardenError;

use crate::sqe;

pub fn allocate(conn: &Connection, kind: TaskKind, product_id: Option<i64>, summary: &str, username: &str, enqueued_at: i64) -> Result<Task, WardenError> {
    conn.execute(
        "INSERT INTO tasks (kind, product_id, status, summary, username, enqueued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![kind.as_str(), product_id, TaskStatus::Allocated.as_str(), summary, username, enqueued_at],
    )
    .map_err(sqe)?;
    let id = conn.last_insert_rowid();
    get(conn, id)?.ok_or_else(|| WardenError::database("task vanished after insert"))
}

pub fn set_status(conn: &Connection, task_id: i64, status: TaskStatus, at: i64) -> Result<(), WardenError> {
    match status {
        TaskStatus::Running => {
            conn.execute(
                "UPDATE tasks SET status = ?2, started_at = ?3, last_heartbeat_at = ?3 WHERE id = ?1",
                params![task_id, status.as_str(), at],
            )
        }
        s if s.is_terminal() => {
            conn.execute(
                "UPDATE tasks SET status = ?2, finished_at = ?3 WHERE id = ?1",
                params![task_id, status.as_str(), at],
            )
        }
        _ => conn.execute("UPDATE tasks SET status = ?2 WHERE id = ?1", params![task_id, status.as_str()]),
    }
    .map_err(sqe)?;
    Ok(())
}

pub fn heartbeat(conn: &Connection, task_id: i64, at: i64) -> Result<(), WardenError> {
    conn.execute("UPDATE tasks SET last_heartbeat_at = ?2 WHERE id = ?1", params![task_id, at])
        .map_err(sqe)?;
    Ok(())
}

pub fn set_cancel_flag(conn: &Connection, task_id: i64) -> Result<(), WardenError> {
    conn.execute("UPDATE tasks SET cancel_flag_set = 1 WHERE id = ?1", params![task_id])
        .map_err(sqe)?;
    Ok(())
}

pub fn set_consumed_flag(conn: &Connection, task_id: i64) -> Result<(), WardenError> {
    conn.execute("UPDATE tasks SET consumed_flag_set = 1 WHERE id = ?1", params![task_id])
        .map_err(sqe)?;
    Ok(())
}

pub fn set_comment(conn: &Connection, task_id: i64, comment: &str) -> Result<(), WardenError> {
    conn.execute("UPDATE tasks SET comment = ?2 WHERE id = ?1", params![task_id, comment])
        .map_err(sqe)?;
    Ok(())
}

pub fn get(conn: &Connection, task_id: i64) -> Result<Option<Task>, WardenError> {
    conn.query_row(
        "SELECT id, kind, product_id, status, summary, comment, username,
                enqueued_at, started_at, finished_at, last_heartbeat_at, cancel_flag_set, consumed_flag_set
         FROM tasks WHERE id = ?1",
        params![task_id],
        map_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

pub fn list(conn: &Connection, filter: &TaskFilter, limit: u32, offset: u32) -> Result<Vec<Task>, WardenError> {
    let mut clauses = Vec::new();
    let mut params: Vec<rusqlite::types::Value> = Vec::new();

    if !filter.kinds.is_empty() {
        let ph: Vec<String> = (0..filter.kinds.len()).map(|_| "?".to_string()).collect();
        clauses.push(format!("kind IN ({})", ph.join(", ")));
        params.extend(filter.kinds.iter().map(|k| rusqlite::types::Value::from(k.as_str().to_string())));
    }
    if !filter.statuses.is_empty() {
        let ph: Vec<String> = (0..filter.statuses.len()).map(|_| "?".to_string()).collect();
        clauses.push(format!("status IN ({})", ph.join(", ")));
        params.extend(filter.statuses.iter().map(|s| rusqlite::types::Value::from(s.as_str().to_string())));
    }
    if let Some(product_id) = filter.product_id {
        clauses.push("product_id = ?".to_string());
        params.push(rusqlite::types::Value::from(product_id));
    }
    if !filter.usernames.is_empty() {
        let ph: Vec<String> = (0..filter.usernames.len()).map(|_| "?".to_string()).collect();
        clauses.push(format!("username IN ({})", ph.join(", ")));
        params.extend(filter.usernames.iter().map(|u| rusqlite::types::Value::from(u.clone())));
    }

    let where_clause = if clauses.is_empty() { "1=1".to_string() } else { clauses.join(" AND ") };
    let sql = format!(
        "SELECT id, kind, product_id, status, summary, comment, username,
                enqueued_at, started_at, finished_at, last_heartbeat_at, cancel_flag_set, consumed_flag_set
         FROM tasks WHERE {where_clause} ORDER BY enqueued_at, id LIMIT ? OFFSET ?"
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

/// Dequeue the oldest enqueued task for `kind`, FIFO.
pub fn dequeue_next(conn: &Connection, kind: TaskKind) -> Result<Option<Task>, WardenError> {
    conn.query_row(
        "SELECT id, kind, product_id, status, summary, comment, username,
                enqueued_at, started_at, finished_at, last_heartbeat_at, cancel_flag_set, consumed_flag_set
         FROM tasks WHERE kind = ?1 AND status = ?2 ORDER BY enqueued_at, id LIMIT 1",
        params![kind.as_str(), TaskStatus::Enqueued.as_str()],
        map_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

/// Drop `RUNNING` rows whose heartbeat is older than `stale_before`. Safe
/// to call on any periodic timer tick.
pub fn reap_stale_heartbeats(conn: &Connection, stale_before: i64) -> Result<u64, WardenError> {
    let affected = conn
        .execute(
            "UPDATE tasks SET status = ?1
             WHERE status = ?2 AND (last_heartbeat_at IS NULL OR last_heartbeat_at < ?3)",
            params![TaskStatus::Dropped.as_str(), TaskStatus::Running.as_str(), stale_before],
        )
        .map_err(sqe)?;
    Ok(affected as u64)
}

/// Drop every `RUNNING`/`ENQUEUED` row outright — only correct immediately
/// after process startup, when any such row necessarily belongs to a
/// prior process lifetime with no worker left alive to finish it.
pub fn reap_all_in_flight(conn: &Connection) -> Result<u64, WardenError> {
    let affected = conn
        .execute(
            "UPDATE tasks SET status = ?1 WHERE status IN (?2, ?3)",
            params![
                TaskStatus::Dropped.as_str(),
                TaskStatus::Running.as_str(),
                TaskStatus::Enqueued.as_str(),
            ],
        )
        .map_err(sqe)?;
    Ok(affected as u64)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let kind: String = row.get(1)?;
    let status: String = row.get(3)?;
    Ok(Task {
        id: row.get(0)?,
        kind: if kind == "CLEANUP" { TaskKind::Cleanup } else { TaskKind::Store },
        product_id: row.get(2)?,
        status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Dropped),
        summary: row.get(4)?,
        comment: row.get(5)?,
        username: row.get(6)?,
        enqueued_at: row.get(7)?,
        started_at: row.get(8)?,
        finished_at: row.get(9)?,
        last_heartbeat_at: row.get(10)?,
        cancel_flag_set: row.get::<_, i64>(11)? != 0,
        consumed_flag_set: row.get::<_, i64>(12)? != 0,
    })
}
