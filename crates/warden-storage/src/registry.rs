//! `SqliteProductRegistry` — owns one `ProductDatabase` per product,
//! computing and tracking each product's `DbStatus`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::{info, warn};
use warden_core::model::{DbStatus, Product};
use warden_core::traits::ProductRegistry;
use warden_core::WardenError;

use crate::connection::ProductDatabase;
use crate::migrations::{self, LATEST_REVISION};

struct ProductEntry {
    db: ProductDatabase,
    accessible: AtomicBool,
}

/// Maps `product_id` to its open database. Registered once by the
/// embedding binary and shared (via `Arc`) with `warden-ingest`,
/// `warden-query`, `warden-triage` and `warden-tasks`.
pub struct SqliteProductRegistry {
    entries: RwLock<HashMap<i64, ProductEntry>>,
    statuses: Mutex<HashMap<i64, DbStatus>>,
    default_pool_size: u32,
}

impl SqliteProductRegistry {
    pub fn new(default_pool_size: u32) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
            default_pool_size,
        }
    }

    fn record_status(&self, product_id: i64, status: DbStatus) -> DbStatus {
        self.statuses
            .lock()
            .expect("status map mutex poisoned")
            .insert(product_id, status);
        status
    }
}

impl ProductRegistry for SqliteProductRegistry {
    fn open(&self, product: &Product) -> Result<DbStatus, WardenError> {
        let pool_size = product.run_limit.map(|_| self.default_pool_size).unwrap_or(self.default_pool_size);
        let path = PathBuf::from(&product.db_connection_spec);

        let db = match ProductDatabase::open(&path, pool_size) {
            Ok(db) => db,
            Err(_) => return Ok(self.record_status(product.id, DbStatus::FailedToConnect)),
        };

        let status = db
            .with_writer(|conn| {
                let before = migrations::current_revision(conn)?;
                if before == 0 {
                    migrations::migrate(conn)?;
                    return Ok(DbStatus::Ok);
                }
                if before == LATEST_REVISION {
                    return Ok(DbStatus::Ok);
                }
                if before < LATEST_REVISION {
                    match migrations::migrate(conn) {
                        Ok(_) => Ok(DbStatus::SchemaMismatchOk),
                        Err(_) => Ok(DbStatus::SchemaUpgradeFailed),
                    }
                } else {
                    Ok(DbStatus::SchemaMismatchNo)
                }
            })
            .unwrap_or(DbStatus::SchemaInitError);

        self.entries.write().expect("registry lock poisoned").insert(
            product.id,
            ProductEntry {
                db,
                accessible: AtomicBool::new(status.servable()),
            },
        );
        if status.servable() {
            info!(product_id = product.id, ?status, "product database opened");
        } else {
            warn!(product_id = product.id, ?status, "product database not servable");
        }
        Ok(self.record_status(product.id, status))
    }

    fn status(&self, product_id: i64) -> Result<DbStatus, WardenError> {
        Ok(self
            .statuses
            .lock()
            .expect("status map mutex poisoned")
            .get(&product_id)
            .copied()
            .unwrap_or(DbStatus::Missing))
    }

    fn retire(&self, product_id: i64) -> Result<(), WardenError> {
        if let Some(entry) = self.entries.read().expect("registry lock poisoned").get(&product_id) {
            entry.accessible.store(false, Ordering::SeqCst);
        }
        self.record_status(product_id, DbStatus::Missing);
        info!(product_id, "product retired");
        Ok(())
    }

    fn with_reader(&self, product_id: i64, f: &mut dyn FnMut(&rusqlite::Connection) -> Result<(), WardenError>) -> Result<(), WardenError> {
        let entries = self.entries.read().expect("registry lock poisoned");
        let entry = entries
            .get(&product_id)
            .ok_or_else(|| WardenError::database(format!("product {product_id} not open")))?;
        if !entry.accessible.load(Ordering::SeqCst) {
            return Err(WardenError::database(format!("product {product_id} is not servable")));
        }
        entry.db.with_reader(|conn| f(conn))
    }

    fn with_writer(&self, product_id: i64, f: &mut dyn FnMut(&rusqlite::Connection) -> Result<(), WardenError>) -> Result<(), WardenError> {
        let entries = self.entries.read().expect("registry lock poisoned");
        let entry = entries
            .get(&product_id)
            .ok_or_else(|| WardenError::database(format!("product {product_id} not open")))?;
        if !entry.accessible.load(Ordering::SeqCst) {
            return Err(WardenError::database(format!("product {product_id} is not servable")));
        }
        entry.db.with_writer(|conn| f(conn))
    }
}
