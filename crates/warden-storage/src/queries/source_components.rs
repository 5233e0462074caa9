//! `source_components` table: named path-glob filters used by `component_names`.

use rusqlite::{params, Connection};
use warden_core::model::SourceComponent;
use warden_core::WardenError;

use crate::sqe;

pub fn add(conn: &Connection, name: &str, value: &str) -> Result<SourceComponent, WardenError> {
    conn.execute(
        "INSERT INTO source_components (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        params![name, value],
    )
    .map_err(sqe)?;
    get_by_name(conn, name)?.ok_or_else(|| WardenError::database("component vanished after insert"))
}

pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<SourceComponent>, WardenError> {
    conn.query_row(
        "SELECT id, name, value FROM source_components WHERE name = ?1",
        params![name],
        map_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

pub fn list(conn: &Connection) -> Result<Vec<SourceComponent>, WardenError> {
    let mut stmt = conn
        .prepare_cached("SELECT id, name, value FROM source_components ORDER BY name")
        .map_err(sqe)?;
    let rows = stmt.query_map([], map_row).map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)?);
    }
    Ok(out)
}

pub fn remove(conn: &Connection, name: &str) -> Result<(), WardenError> {
    conn.execute("DELETE FROM source_components WHERE name = ?1", params![name]).map_err(sqe)?;
    Ok(())
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceComponent> {
    Ok(SourceComponent {
        id: row.get(0)?,
        name: row.get(1)?,
        value: row.get(2)?,
    })
}
