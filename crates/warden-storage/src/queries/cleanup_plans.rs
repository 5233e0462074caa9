//! `cleanup_plans` / `cleanup_plan_members` tables.

use rusqlite::{params, Connection};
use warden_core::model::CleanupPlan;
use warden_core::WardenError;

use crate::sqe;

pub fn create(conn: &Connection, name: &str, description: Option<&str>, due_date: Option<i64>, created_at: i64) -> Result<CleanupPlan, WardenError> {
    conn.execute(
        "INSERT INTO cleanup_plans (name, description, due_date, closed, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
        params![name, description, due_date, created_at],
    )
    .map_err(sqe)?;
    Ok(CleanupPlan {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        description: description.map(str::to_string),
        due_date,
        closed: false,
        created_at,
        bug_hashes: Vec::new(),
    })
}

pub fn list(conn: &Connection) -> Result<Vec<CleanupPlan>, WardenError> {
    let mut stmt = conn
        .prepare_cached("SELECT id, name, description, due_date, closed, created_at FROM cleanup_plans ORDER BY id")
        .map_err(sqe)?;
    let plans: Vec<(i64, String, Option<String>, Option<i64>, bool, i64)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get::<_, i64>(4)? != 0, row.get(5)?))
        })
        .map_err(sqe)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqe)?;

    let mut out = Vec::with_capacity(plans.len());
    for (id, name, description, due_date, closed, created_at) in plans {
        out.push(CleanupPlan {
            id,
            name,
            description,
            due_date,
            closed,
            created_at,
            bug_hashes: members(conn, id)?,
        });
    }
    Ok(out)
}

pub fn get(conn: &Connection, plan_id: i64) -> Result<Option<CleanupPlan>, WardenError> {
    let row: Option<(i64, String, Option<String>, Option<i64>, bool, i64)> = conn
        .query_row(
            "SELECT id, name, description, due_date, closed, created_at FROM cleanup_plans WHERE id = ?1",
            params![plan_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get::<_, i64>(4)? != 0, row.get(5)?)),
        )
        .map(Some)
        .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
        .map_err(sqe)?;
    let Some((id, name, description, due_date, closed, created_at)) = row else {
        return Ok(None);
    };
    Ok(Some(CleanupPlan {
        id,
        name,
        description,
        due_date,
        closed,
        created_at,
        bug_hashes: members(conn, id)?,
    }))
}

pub fn members(conn: &Connection, plan_id: i64) -> Result<Vec<String>, WardenError> {
    let mut stmt = conn
        .prepare_cached("SELECT bug_hash FROM cleanup_plan_members WHERE plan_id = ?1 ORDER BY bug_hash")
        .map_err(sqe)?;
    let rows = stmt.query_map(params![plan_id], |row| row.get(0)).map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)?);
    }
    Ok(out)
}

pub fn add_members(conn: &Connection, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError> {
    let mut stmt = conn
        .prepare_cached("INSERT OR IGNORE INTO cleanup_plan_members (plan_id, bug_hash) VALUES (?1, ?2)")
        .map_err(sqe)?;
    for hash in bug_hashes {
        stmt.execute(params![plan_id, hash]).map_err(sqe)?;
    }
    Ok(())
}

pub fn remove_members(conn: &Connection, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError> {
    let mut stmt = conn
        .prepare_cached("DELETE FROM cleanup_plan_members WHERE plan_id = ?1 AND bug_hash = ?2")
        .map_err(sqe)?;
    for hash in bug_hashes {
        stmt.execute(params![plan_id, hash]).map_err(sqe)?;
    }
    Ok(())
}

/// Renames, redescribes or reschedules a plan in place; `None` leaves the
/// corresponding field untouched.
pub fn update(
    conn: &Connection,
    plan_id: i64,
    name: Option<&str>,
    description: Option<Option<&str>>,
    due_date: Option<Option<i64>>,
) -> Result<CleanupPlan, WardenError> {
    if let Some(name) = name {
        conn.execute("UPDATE cleanup_plans SET name = ?1 WHERE id = ?2", params![name, plan_id])
            .map_err(sqe)?;
    }
    if let Some(description) = description {
        conn.execute("UPDATE cleanup_plans SET description = ?1 WHERE id = ?2", params![description, plan_id])
            .map_err(sqe)?;
    }
    if let Some(due_date) = due_date {
        conn.execute("UPDATE cleanup_plans SET due_date = ?1 WHERE id = ?2", params![due_date, plan_id])
            .map_err(sqe)?;
    }
    get(conn, plan_id)?.ok_or_else(|| WardenError::general(format!("no such cleanup plan {plan_id}")))
}

pub fn remove(conn: &Connection, plan_id: i64) -> Result<(), WardenError> {
    let affected = conn.execute("DELETE FROM cleanup_plans WHERE id = ?1", params![plan_id]).map_err(sqe)?;
    if affected == 0 {
        return Err(WardenError::general(format!("no such cleanup plan {plan_id}")));
    }
    Ok(())
}

pub fn set_closed(conn: &Connection, plan_id: i64, closed: bool) -> Result<CleanupPlan, WardenError> {
    let affected = conn
        .execute("UPDATE cleanup_plans SET closed = ?1 WHERE id = ?2", params![closed as i64, plan_id])
        .map_err(sqe)?;
    if affected == 0 {
        return Err(WardenError::general(format!("no such cleanup plan {plan_id}")));
    }
    get(conn, plan_id)?.ok_or_else(|| WardenError::general(format!("no such cleanup plan {plan_id}")))
}
