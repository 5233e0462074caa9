//! # warden-ingest
//!
//! Bundle ingestion: unpack, canonicalize and reconcile a run's reports
//! against prior state, inside one atomic transaction per run (§4.3/§4.4).

pub mod bundle;
pub mod canon;
pub mod engine;
pub mod locks;
pub mod source_comments;

pub use engine::{store_run, StoreRunOutcome, StoreRunRequest, StoreRunResult};
pub use locks::{RunLockGuard, RunLockRegistry};
