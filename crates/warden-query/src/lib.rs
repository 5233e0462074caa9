//! # warden-query
//!
//! The Query Engine (C5): filter/sort/paginate/diff/aggregate reads over a
//! product's report corpus. Every operation here is a thin, permission-
//! agnostic layer over `warden_core::traits::{ReportStore, ContentStore,
//! TriageStore}` — it clamps pagination, validates dimension/encoding
//! arguments, and composes the few reads that span more than one store
//! (report details, source file retrieval) that no single trait method
//! covers on its own.

mod details;
mod engine;
mod source;

pub use details::ReportDetails;
pub use engine::QueryEngine;
pub use source::{ContentEncoding, SourceFileData};
