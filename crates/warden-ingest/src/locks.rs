//! Per-`(product_id, run_name)` exclusive lock (spec §4.4 step 1 / §5):
//! two concurrent `mass_store_run` calls for the same run are serialized,
//! the second one failing fast with `ALREADY_RUNNING` rather than queuing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use warden_core::WardenError;

#[derive(Default)]
pub struct RunLockRegistry {
    held: Mutex<HashSet<(i64, String)>>,
}

impl RunLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `(product_id, run_name)`, or fail immediately
    /// with `ALREADY_RUNNING` if another ingestion already holds it.
    pub fn acquire(self: &Arc<Self>, product_id: i64, run_name: &str) -> Result<RunLockGuard, WardenError> {
        let key = (product_id, run_name.to_string());
        let mut held = self.held.lock().expect("run lock registry mutex poisoned");
        if !held.insert(key.clone()) {
            return Err(WardenError::already_running(product_id, run_name));
        }
        Ok(RunLockGuard {
            registry: Arc::clone(self),
            key: Some(key),
        })
    }
}

/// RAII guard releasing the lock on drop — including on a panicking or
/// early-returning ingestion, so a crashed worker never wedges a run name.
pub struct RunLockGuard {
    registry: Arc<RunLockRegistry>,
    key: Option<(i64, String)>,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.registry.held.lock().expect("run lock registry mutex poisoned").remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_run_fails_fast() {
        let registry = Arc::new(RunLockRegistry::new());
        let _guard = registry.acquire(1, "my-run").unwrap();
        let err = registry.acquire(1, "my-run").unwrap_err();
        assert!(matches!(err, WardenError::AlreadyRunning { .. }));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let registry = Arc::new(RunLockRegistry::new());
        {
            let _guard = registry.acquire(1, "my-run").unwrap();
        }
        assert!(registry.acquire(1, "my-run").is_ok());
    }

    #[test]
    fn different_runs_do_not_contend() {
        let registry = Arc::new(RunLockRegistry::new());
        let _a = registry.acquire(1, "run-a").unwrap();
        let _b = registry.acquire(1, "run-b").unwrap();
        let _c = registry.acquire(2, "run-a").unwrap();
    }
}
