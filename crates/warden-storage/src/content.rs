//! `SqliteContentStore` — `ContentStore` over a `SqliteProductRegistry`.

use std::sync::Arc;

use warden_core::model::FileContent;
use warden_core::traits::{ContentStore, ProductRegistry};
use warden_core::WardenError;

use crate::hashing_check::verify_hash;
use crate::queries::contents;
use crate::registry::SqliteProductRegistry;

pub struct SqliteContentStore {
    registry: Arc<SqliteProductRegistry>,
}

impl SqliteContentStore {
    pub fn new(registry: Arc<SqliteProductRegistry>) -> Self {
        Self { registry }
    }
}

impl ContentStore for SqliteContentStore {
    fn missing_content_hashes(&self, product_id: i64, hashes: &[String]) -> Result<Vec<String>, WardenError> {
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = contents::missing_hashes(conn, hashes)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn missing_blame_hashes(&self, product_id: i64, hashes: &[String]) -> Result<Vec<String>, WardenError> {
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = contents::missing_blame_hashes(conn, hashes)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn put_content(&self, product_id: i64, hash: &str, bytes: &[u8], blame: Option<&[u8]>) -> Result<(), WardenError> {
        verify_hash(hash, bytes)?;
        self.registry.with_writer(product_id, &mut |conn| contents::put_content(conn, hash, bytes, blame))
    }

    fn get_content(&self, product_id: i64, hash: &str) -> Result<Option<FileContent>, WardenError> {
        let mut result = None;
        self.registry.with_reader(product_id, &mut |conn| {
            result = contents::get_content(conn, hash)?.map(|r| FileContent {
                content_hash: r.content_hash,
                bytes: r.bytes,
                blame: r.blame,
            });
            Ok(())
        })?;
        Ok(result)
    }

    fn release_content(&self, product_id: i64, hash: &str) -> Result<(), WardenError> {
        self.registry.with_writer(product_id, &mut |conn| contents::release(conn, hash))
    }
}

#[cfg(test)]
mod tests {
    use warden_core::hashing::sha256_hex;
    use warden_core::model::Product;

    use super::*;
    use crate::registry::SqliteProductRegistry;

    fn store_over_empty_product() -> (SqliteContentStore, i64, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SqliteProductRegistry::new(2));
        let product = Product {
            id: 1,
            endpoint: "demo".to_string(),
            displayed_name: "Demo".to_string(),
            description: None,
            db_connection_spec: dir.path().join("demo.sqlite").to_string_lossy().into_owned(),
            run_limit: None,
            review_status_change_disabled: false,
        };
        let status = registry.open(&product).unwrap();
        assert!(status.servable());
        (SqliteContentStore::new(registry), product.id, dir)
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(20))]
        /// P3: `put_content` is idempotent — after any number of successful
        /// calls with the same `(hash, bytes)`, exactly one blob is stored
        /// (`content_hash` is the table's primary key) and it holds the
        /// original bytes.
        #[test]
        fn put_content_is_idempotent(
            bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..200),
            repeats in 1usize..5,
        ) {
            let (store, product_id, _dir) = store_over_empty_product();
            let hash = sha256_hex(&bytes);
            for _ in 0..repeats {
                store.put_content(product_id, &hash, &bytes, None).unwrap();
            }
            let fetched = store.get_content(product_id, &hash).unwrap().unwrap();
            proptest::prop_assert_eq!(fetched.bytes, bytes);
            proptest::prop_assert!(store.missing_content_hashes(product_id, &[hash]).unwrap().is_empty());
        }
    }
}
