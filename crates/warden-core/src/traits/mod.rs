//! Storage-facing trait seams. `warden-query`, `warden-triage` and
//! `warden-tasks` depend on these, never on `warden-storage` directly —
//! constructor-injected, so a test double can stand in for SQLite.

mod content_store;
mod product_registry;
mod report_store;
mod task_store;
mod triage_store;

pub use content_store::ContentStore;
pub use product_registry::ProductRegistry;
pub use report_store::ReportStore;
pub use task_store::TaskStore;
pub use triage_store::TriageStore;
