//! Forward-only schema migrations for a single product database.
//!
//! Each revision is a plain `up_sql` string; `migrate` applies every
//! revision not yet recorded in `schema_migrations`, in one transaction,
//! and bumps `PRAGMA user_version` to the latest applied revision.

use rusqlite::Connection;
use warden_core::WardenError;

use crate::sqe;

pub struct Migration {
    pub revision: u32,
    pub up_sql: &'static str,
}

pub const LATEST_REVISION: u32 = 4;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        revision: 1,
        up_sql: include_str!("schema_v1.sql"),
    },
    Migration {
        revision: 2,
        up_sql: include_str!("schema_v2.sql"),
    },
    Migration {
        revision: 3,
        up_sql: include_str!("schema_v3.sql"),
    },
    Migration {
        revision: 4,
        up_sql: include_str!("schema_v4.sql"),
    },
];

/// Apply every migration newer than the database's recorded revision.
/// Returns the revision the database ends up at.
pub fn migrate(conn: &Connection) -> Result<u32, WardenError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            revision INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        ) STRICT;",
    )
    .map_err(sqe)?;

    let applied: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(revision), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(sqe)?;

    let tx = conn.unchecked_transaction().map_err(sqe)?;
    let mut current = applied;
    for migration in MIGRATIONS.iter().filter(|m| m.revision > applied) {
        tx.execute_batch(migration.up_sql).map_err(sqe)?;
        tx.execute(
            "INSERT INTO schema_migrations (revision, applied_at) VALUES (?1, strftime('%s', 'now'))",
            [migration.revision],
        )
        .map_err(sqe)?;
        current = migration.revision;
    }
    tx.pragma_update(None, "user_version", current).map_err(sqe)?;
    tx.commit().map_err(sqe)?;
    Ok(current)
}

/// Current `PRAGMA user_version` without attempting any upgrade — used by
/// the registry to classify a product's `DbStatus` before deciding whether
/// to run `migrate`.
pub fn current_revision(conn: &Connection) -> Result<u32, WardenError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(sqe)
}
