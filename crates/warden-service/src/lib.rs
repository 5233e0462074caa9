//! # warden-service
//!
//! The Service Façade (C9): a thin dispatch layer, one method per RPC
//! operation named in spec §6, each opening with an API-version check and
//! a permission check before delegating to `warden-query`, `warden-triage`,
//! `warden-ingest` or `warden-tasks`. No HTTP/RPC transport lives here —
//! that framing, and authentication itself, are external collaborators
//! this crate only ever sees through an already-resolved `Identity` and an
//! injected `PermissionPredicate`.

mod facade;
mod version;

pub use facade::WardenService;
pub use version::ApiVersion;
