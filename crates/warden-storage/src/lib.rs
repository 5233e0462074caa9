//! # warden-storage
//!
//! SQLite persistence layer for the Warden report-storage engine.
//! WAL mode, one write connection plus a pooled read set per product,
//! forward-only migrations, and one query module per entity.

pub mod connection;
pub mod content;
mod hashing_check;
pub mod migrations;
pub mod pagination;
pub mod queries;
pub mod registry;
pub mod report_store;
pub mod task_store;
pub mod triage_store;

pub use connection::ProductDatabase;
pub use content::SqliteContentStore;
pub use registry::SqliteProductRegistry;
pub use report_store::SqliteReportStore;
pub use task_store::SqliteTaskStore;
pub use triage_store::SqliteTriageStore;

/// Map a `rusqlite::Error` into the shared error taxonomy. Every query
/// module funnels its SQL errors through this one function.
pub(crate) fn sqe(e: impl std::fmt::Display) -> warden_core::WardenError {
    warden_core::WardenError::database(e.to_string())
}
