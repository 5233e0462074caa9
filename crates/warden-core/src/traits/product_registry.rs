//! `ProductRegistry` — per-product database lifecycle and connection
//! access, the seam `warden-query`/`warden-triage`/`warden-ingest` borrow
//! connections through.

use std::sync::Arc;

use crate::errors::WardenError;
use crate::model::{DbStatus, Product};

pub trait ProductRegistry: Send + Sync {
    /// Open (or reopen) a product's database, running migrations as
    /// needed, and report the resulting status.
    fn open(&self, product: &Product) -> Result<DbStatus, WardenError>;

    fn status(&self, product_id: i64) -> Result<DbStatus, WardenError>;

    /// Mark a product inaccessible; in-flight borrows finish, new
    /// acquisitions fail fast.
    fn retire(&self, product_id: i64) -> Result<(), WardenError>;

    /// Run `f` with a pooled read connection. Fails fast if the product's
    /// status is not servable.
    fn with_reader(&self, product_id: i64, f: &mut dyn FnMut(&rusqlite::Connection) -> Result<(), WardenError>) -> Result<(), WardenError>;

    /// Run `f` with the product's single dedicated write connection.
    fn with_writer(&self, product_id: i64, f: &mut dyn FnMut(&rusqlite::Connection) -> Result<(), WardenError>) -> Result<(), WardenError>;
}

impl<T: ProductRegistry + ?Sized> ProductRegistry for Arc<T> {
    fn open(&self, product: &Product) -> Result<DbStatus, WardenError> {
        (**self).open(product)
    }

    fn status(&self, product_id: i64) -> Result<DbStatus, WardenError> {
        (**self).status(product_id)
    }

    fn retire(&self, product_id: i64) -> Result<(), WardenError> {
        (**self).retire(product_id)
    }

    fn with_reader(&self, product_id: i64, f: &mut dyn FnMut(&rusqlite::Connection) -> Result<(), WardenError>) -> Result<(), WardenError> {
        (**self).with_reader(product_id, f)
    }

    fn with_writer(&self, product_id: i64, f: &mut dyn FnMut(&rusqlite::Connection) -> Result<(), WardenError>) -> Result<(), WardenError> {
        (**self).with_writer(product_id, f)
    }
}
