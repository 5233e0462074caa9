//! `ProductDatabase` — one write connection plus a pooled set of read
//! connections for a single product's SQLite file.
//!
//! No `r2d2`: a fixed-size pool of idle connections handed out over a
//! bounded `crossbeam_channel`, matching the hand-rolled style the rest of
//! this workspace uses for its other bounded queues.

use std::path::{Path, PathBuf};

use crossbeam_channel::{bounded, Receiver, Sender};
use rusqlite::Connection;
use warden_core::WardenError;

use crate::sqe;

const BUSY_TIMEOUT_MS: u32 = 5_000;
const CACHE_SIZE_PAGES: i32 = -8_000; // ~8MiB, negative = KiB per sqlite docs
const MMAP_SIZE_BYTES: i64 = 256 * 1024 * 1024;

/// A pooled read connection. Returned to the pool on drop.
pub struct PooledConnection<'a> {
    conn: Option<Connection>,
    return_to: &'a Sender<Connection>,
}

impl<'a> std::ops::Deref for PooledConnection<'a> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken before drop")
    }
}

impl<'a> Drop for PooledConnection<'a> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = self.return_to.send(conn);
        }
    }
}

/// Owns every connection to one product's database file (or an in-memory
/// database for tests): a bounded pool of readers plus one dedicated
/// writer, both opened with the same PRAGMA set.
pub struct ProductDatabase {
    path: Option<PathBuf>,
    readers_tx: Sender<Connection>,
    readers_rx: Receiver<Connection>,
    writer: std::sync::Mutex<Connection>,
    pool_size: u32,
}

impl ProductDatabase {
    /// Open (creating if absent) a file-backed database with `pool_size`
    /// pooled read connections plus one write connection.
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, WardenError> {
        let writer = open_connection(Some(path))?;
        let (readers_tx, readers_rx) = bounded(pool_size as usize);
        for _ in 0..pool_size {
            readers_tx
                .send(open_connection(Some(path))?)
                .map_err(|_| WardenError::database("reader pool channel closed during init"))?;
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            readers_tx,
            readers_rx,
            writer: std::sync::Mutex::new(writer),
            pool_size,
        })
    }

    /// Open an in-memory database — used by tests and by the property
    /// suite that exercises the engine without touching disk.
    pub fn open_in_memory(pool_size: u32) -> Result<Self, WardenError> {
        let writer = open_connection(None)?;
        let (readers_tx, readers_rx) = bounded(pool_size as usize);
        for _ in 0..pool_size {
            readers_tx
                .send(open_connection(None)?)
                .map_err(|_| WardenError::database("reader pool channel closed during init"))?;
        }
        Ok(Self {
            path: None,
            readers_tx,
            readers_rx,
            writer: std::sync::Mutex::new(writer),
            pool_size,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// Borrow a pooled reader, blocking until one is available.
    pub fn with_reader<F, T>(&self, f: F) -> Result<T, WardenError>
    where
        F: FnOnce(&Connection) -> Result<T, WardenError>,
    {
        let conn = self
            .readers_rx
            .recv()
            .map_err(|_| WardenError::database("reader pool exhausted: channel closed"))?;
        let guard = PooledConnection {
            conn: Some(conn),
            return_to: &self.readers_tx,
        };
        f(&guard)
    }

    /// Borrow the single write connection, serializing all callers.
    pub fn with_writer<F, T>(&self, f: F) -> Result<T, WardenError>
    where
        F: FnOnce(&Connection) -> Result<T, WardenError>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|_| WardenError::database("writer connection mutex poisoned"))?;
        f(&conn)
    }

    pub fn checkpoint(&self) -> Result<(), WardenError> {
        self.with_writer(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(sqe)
        })
    }
}

fn open_connection(path: Option<&Path>) -> Result<Connection, WardenError> {
    let conn = match path {
        Some(p) => Connection::open(p).map_err(sqe)?,
        None => Connection::open_in_memory().map_err(sqe)?,
    };
    conn.pragma_update(None, "journal_mode", "WAL").map_err(sqe)?;
    conn.pragma_update(None, "synchronous", "NORMAL").map_err(sqe)?;
    conn.pragma_update(None, "foreign_keys", "ON").map_err(sqe)?;
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)
        .map_err(sqe)?;
    conn.pragma_update(None, "cache_size", CACHE_SIZE_PAGES)
        .map_err(sqe)?;
    conn.pragma_update(None, "mmap_size", MMAP_SIZE_BYTES)
        .map_err(sqe)?;
    Ok(conn)
}
