//! Explicit clock seam — replaces ambient `SystemTime::now()` calls so
//! ingestion and task-manager timing logic stays deterministically testable.

/// Returns the current time as epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

use std::sync::atomic::{AtomicI64, Ordering};

/// A clock with a settable, monotonically-advanceable value. Exposed
/// (not `#[cfg(test)]`-gated) so downstream crates can use it in their own
/// test suites without depending on this crate's dev-dependencies.
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(initial: i64) -> Self {
        Self(AtomicI64::new(initial))
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}
