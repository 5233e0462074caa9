//! `ContentStore` — content-addressed blob storage, shared across
//! ingestion and query (source file retrieval).

use std::sync::Arc;

use crate::errors::WardenError;
use crate::model::FileContent;

pub trait ContentStore: Send + Sync {
    /// Of `hashes`, return those not yet present in the store.
    fn missing_content_hashes(&self, product_id: i64, hashes: &[String]) -> Result<Vec<String>, WardenError>;

    /// Of `hashes`, return those whose blame blob is not yet present.
    fn missing_blame_hashes(&self, product_id: i64, hashes: &[String]) -> Result<Vec<String>, WardenError>;

    /// Store a blob, verifying `sha256(bytes) == hash` first. Increments
    /// the ref count if the hash already exists rather than rewriting it.
    fn put_content(&self, product_id: i64, hash: &str, bytes: &[u8], blame: Option<&[u8]>) -> Result<(), WardenError>;

    fn get_content(&self, product_id: i64, hash: &str) -> Result<Option<FileContent>, WardenError>;

    /// Drop one reference; garbage-collects the row once the count reaches
    /// zero.
    fn release_content(&self, product_id: i64, hash: &str) -> Result<(), WardenError>;
}

impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    fn missing_content_hashes(&self, product_id: i64, hashes: &[String]) -> Result<Vec<String>, WardenError> {
        (**self).missing_content_hashes(product_id, hashes)
    }

    fn missing_blame_hashes(&self, product_id: i64, hashes: &[String]) -> Result<Vec<String>, WardenError> {
        (**self).missing_blame_hashes(product_id, hashes)
    }

    fn put_content(&self, product_id: i64, hash: &str, bytes: &[u8], blame: Option<&[u8]>) -> Result<(), WardenError> {
        (**self).put_content(product_id, hash, bytes, blame)
    }

    fn get_content(&self, product_id: i64, hash: &str) -> Result<Option<FileContent>, WardenError> {
        (**self).get_content(product_id, hash)
    }

    fn release_content(&self, product_id: i64, hash: &str) -> Result<(), WardenError> {
        (**self).release_content(product_id, hash)
    }
}
