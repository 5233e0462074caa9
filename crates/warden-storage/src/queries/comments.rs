//! `comments` table: free-text notes keyed by bug hash.

use rusqlite::{params, Connection};
use warden_core::model::{Comment, CommentKind};
use warden_core::WardenError;

use crate::sqe;

pub fn insert(conn: &Connection, bug_hash: &str, author: &str, message: &str, kind: CommentKind, created_at: i64) -> Result<Comment, WardenError> {
    let kind_str = match kind {
        CommentKind::User => "USER",
        CommentKind::System => "SYSTEM",
    };
    conn.execute(
        "INSERT INTO comments (bug_hash, author, message, kind, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![bug_hash, author, message, kind_str, created_at],
    )
    .map_err(sqe)?;
    let id = conn.last_insert_rowid();
    Ok(Comment {
        id,
        bug_hash: bug_hash.to_string(),
        author: author.to_string(),
        message: message.to_string(),
        kind,
        created_at,
    })
}

pub fn list_for_hash(conn: &Connection, bug_hash: &str) -> Result<Vec<Comment>, WardenError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, bug_hash, author, message, kind, created_at
             FROM comments WHERE bug_hash = ?1 ORDER BY created_at",
        )
        .map_err(sqe)?;
    let rows = stmt.query_map(params![bug_hash], map_row).map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)?);
    }
    Ok(out)
}

pub fn count_for_hash(conn: &Connection, bug_hash: &str) -> Result<i64, WardenError> {
    conn.query_row("SELECT COUNT(*) FROM comments WHERE bug_hash = ?1", params![bug_hash], |row| row.get(0))
        .map_err(sqe)
}

/// Edit a comment's text, refusing if it's `SYSTEM`-authored or not owned
/// by `requested_by`.
pub fn update(conn: &Connection, comment_id: i64, message: &str, requested_by: &str) -> Result<Comment, WardenError> {
    let (author, kind): (String, String) = conn
        .query_row(
            "SELECT author, kind FROM comments WHERE id = ?1",
            params![comment_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(sqe)?;
    if kind == "SYSTEM" {
        return Err(WardenError::general("SYSTEM comments cannot be edited"));
    }
    if author != requested_by {
        return Err(WardenError::Unauthorized {
            scope: "COMMENT_EDIT".to_string(),
            product_id: None,
        });
    }
    conn.execute("UPDATE comments SET message = ?1 WHERE id = ?2", params![message, comment_id])
        .map_err(sqe)?;
    conn.query_row(
        "SELECT id, bug_hash, author, message, kind, created_at FROM comments WHERE id = ?1",
        params![comment_id],
        map_row,
    )
    .map_err(sqe)
}

/// Delete a comment, refusing if it's `SYSTEM`-authored or not owned by
/// `requested_by`.
pub fn remove(conn: &Connection, comment_id: i64, requested_by: &str) -> Result<(), WardenError> {
    let (author, kind): (String, String) = conn
        .query_row(
            "SELECT author, kind FROM comments WHERE id = ?1",
            params![comment_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(sqe)?;
    if kind == "SYSTEM" {
        return Err(WardenError::general("SYSTEM comments cannot be deleted"));
    }
    if author != requested_by {
        return Err(WardenError::Unauthorized {
            scope: "COMMENT_DELETE".to_string(),
            product_id: None,
        });
    }
    conn.execute("DELETE FROM comments WHERE id = ?1", params![comment_id]).map_err(sqe)?;
    Ok(())
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let kind: String = row.get(4)?;
    Ok(Comment {
        id: row.get(0)?,
        bug_hash: row.get(1)?,
        author: row.get(2)?,
        message: row.get(3)?,
        kind: if kind == "SYSTEM" { CommentKind::System } else { CommentKind::User },
        created_at: row.get(5)?,
    })
}
