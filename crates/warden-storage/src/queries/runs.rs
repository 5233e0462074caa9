//! `runs` table: a named stream of analyses, never shared between products.

use rusqlite::{params, Connection};
use warden_core::model::Run;
use warden_core::WardenError;

use crate::sqe;

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub latest_duration: Option<i64>,
}

impl RunRecord {
    /// `runs` rows don't carry `product_id` (each database already belongs
    /// to exactly one product), so the caller supplies it when lifting a
    /// record into the public `Run` model.
    pub fn into_run(self, product_id: i64) -> Run {
        Run {
            id: self.id,
            product_id,
            name: self.name,
            created_at: self.created_at,
            latest_duration: self.latest_duration,
        }
    }
}

pub fn get_or_create_run(conn: &Connection, name: &str, created_at: i64) -> Result<RunRecord, WardenError> {
    if let Some(existing) = get_run_by_name(conn, name)? {
        return Ok(existing);
    }
    conn.execute(
        "INSERT INTO runs (name, created_at) VALUES (?1, ?2)",
        params![name, created_at],
    )
    .map_err(sqe)?;
    let id = conn.last_insert_rowid();
    Ok(RunRecord {
        id,
        name: name.to_string(),
        created_at,
        latest_duration: None,
    })
}

pub fn get_run(conn: &Connection, run_id: i64) -> Result<Option<RunRecord>, WardenError> {
    conn.query_row(
        "SELECT id, name, created_at, latest_duration FROM runs WHERE id = ?1",
        params![run_id],
        map_run_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

pub fn get_run_by_name(conn: &Connection, name: &str) -> Result<Option<RunRecord>, WardenError> {
    conn.query_row(
        "SELECT id, name, created_at, latest_duration FROM runs WHERE name = ?1",
        params![name],
        map_run_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

pub fn list_runs(conn: &Connection, name_filter: &[String]) -> Result<Vec<RunRecord>, WardenError> {
    if name_filter.is_empty() {
        let mut stmt = conn
            .prepare_cached("SELECT id, name, created_at, latest_duration FROM runs ORDER BY id")
            .map_err(sqe)?;
        let rows = stmt.query_map([], map_run_row).map_err(sqe)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sqe)?);
        }
        return Ok(out);
    }

    let placeholders: Vec<String> = (1..=name_filter.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT id, name, created_at, latest_duration FROM runs WHERE name IN ({}) ORDER BY id",
        placeholders.join(", ")
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(sqe)?;
    let params = rusqlite::params_from_iter(name_filter.iter());
    let rows = stmt.query_map(params, map_run_row).map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)?);
    }
    Ok(out)
}

pub fn set_latest_duration(conn: &Connection, run_id: i64, duration: i64) -> Result<(), WardenError> {
    conn.execute(
        "UPDATE runs SET latest_duration = ?2 WHERE id = ?1",
        params![run_id, duration],
    )
    .map_err(sqe)?;
    Ok(())
}

fn map_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        latest_duration: row.get(3)?,
    })
}
