//! `files` table: a logical path within a run, pointing at a content blob.

use rusqlite::{params, Connection};
use warden_core::model::File;
use warden_core::WardenError;

use crate::sqe;

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub run_id: i64,
    pub filepath: String,
    pub content_hash: String,
}

impl From<FileRecord> for File {
    fn from(r: FileRecord) -> Self {
        File {
            id: r.id,
            run_id: r.run_id,
            filepath: r.filepath,
            content_hash: r.content_hash,
        }
    }
}

pub fn insert_file(conn: &Connection, run_id: i64, filepath: &str, content_hash: &str) -> Result<i64, WardenError> {
    conn.execute(
        "INSERT INTO files (run_id, filepath, content_hash) VALUES (?1, ?2, ?3)",
        params![run_id, filepath, content_hash],
    )
    .map_err(sqe)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_file(conn: &Connection, file_id: i64) -> Result<Option<FileRecord>, WardenError> {
    conn.query_row(
        "SELECT id, run_id, filepath, content_hash FROM files WHERE id = ?1",
        params![file_id],
        map_file_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

pub fn get_file_by_path(conn: &Connection, run_id: i64, filepath: &str) -> Result<Option<FileRecord>, WardenError> {
    conn.query_row(
        "SELECT id, run_id, filepath, content_hash FROM files WHERE run_id = ?1 AND filepath = ?2",
        params![run_id, filepath],
        map_file_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

pub fn list_files_for_run(conn: &Connection, run_id: i64) -> Result<Vec<FileRecord>, WardenError> {
    let mut stmt = conn
        .prepare_cached("SELECT id, run_id, filepath, content_hash FROM files WHERE run_id = ?1")
        .map_err(sqe)?;
    let rows = stmt.query_map(params![run_id], map_file_row).map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)?);
    }
    Ok(out)
}

pub fn count_files_for_run(conn: &Connection, run_id: i64) -> Result<i64, WardenError> {
    conn.query_row("SELECT COUNT(*) FROM files WHERE run_id = ?1", params![run_id], |row| row.get(0))
        .map_err(sqe)
}

fn map_file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        filepath: row.get(2)?,
        content_hash: row.get(3)?,
    })
}
