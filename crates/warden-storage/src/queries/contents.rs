//! `file_contents` table: content-addressed, ref-counted blob storage.

use rusqlite::{params, Connection};
use warden_core::WardenError;

use crate::sqe;

#[derive(Debug, Clone)]
pub struct ContentRecord {
    pub content_hash: String,
    pub bytes: Vec<u8>,
    pub blame: Option<Vec<u8>>,
}

/// Of `hashes`, return those with no row in `file_contents`.
pub fn missing_hashes(conn: &Connection, hashes: &[String]) -> Result<Vec<String>, WardenError> {
    let mut missing = Vec::new();
    let mut stmt = conn
        .prepare_cached("SELECT 1 FROM file_contents WHERE content_hash = ?1")
        .map_err(sqe)?;
    for hash in hashes {
        let exists = stmt.exists(params![hash]).map_err(sqe)?;
        if !exists {
            missing.push(hash.clone());
        }
    }
    Ok(missing)
}

/// Of `hashes`, return those whose stored row has no `blame` blob yet.
pub fn missing_blame_hashes(conn: &Connection, hashes: &[String]) -> Result<Vec<String>, WardenError> {
    let mut missing = Vec::new();
    let mut stmt = conn
        .prepare_cached("SELECT blame FROM file_contents WHERE content_hash = ?1")
        .map_err(sqe)?;
    for hash in hashes {
        let blame: Option<Option<Vec<u8>>> = stmt
            .query_row(params![hash], |row| row.get(0))
            .map(Some)
            .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
            .map_err(sqe)?;
        match blame {
            None | Some(None) => missing.push(hash.clone()),
            Some(Some(_)) => {}
        }
    }
    Ok(missing)
}

/// Insert a new blob or bump the ref count of an existing one.
pub fn put_content(conn: &Connection, hash: &str, bytes: &[u8], blame: Option<&[u8]>) -> Result<(), WardenError> {
    conn.execute(
        "INSERT INTO file_contents (content_hash, bytes, blame, ref_count)
         VALUES (?1, ?2, ?3, 1)
         ON CONFLICT(content_hash) DO UPDATE SET
            ref_count = ref_count + 1,
            blame = COALESCE(excluded.blame, file_contents.blame)",
        params![hash, bytes, blame],
    )
    .map_err(sqe)?;
    Ok(())
}

pub fn get_content(conn: &Connection, hash: &str) -> Result<Option<ContentRecord>, WardenError> {
    conn.query_row(
        "SELECT content_hash, bytes, blame FROM file_contents WHERE content_hash = ?1",
        params![hash],
        map_content_row,
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
    .map_err(sqe)
}

/// Drop one reference; deletes the row once the count reaches zero.
pub fn release(conn: &Connection, hash: &str) -> Result<(), WardenError> {
    conn.execute(
        "UPDATE file_contents SET ref_count = ref_count - 1 WHERE content_hash = ?1",
        params![hash],
    )
    .map_err(sqe)?;
    conn.execute(
        "DELETE FROM file_contents WHERE content_hash = ?1 AND ref_count <= 0",
        params![hash],
    )
    .map_err(sqe)?;
    Ok(())
}

fn map_content_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContentRecord> {
    Ok(ContentRecord {
        content_hash: row.get(0)?,
        bytes: row.get(1)?,
        blame: row.get(2)?,
    })
}
