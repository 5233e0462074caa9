use std::sync::Arc;

use warden_core::clock::Clock;
use warden_core::traits::TaskStore;
use warden_core::WardenError;

/// Passed to a running job so it can report progress and observe
/// cancellation without reaching for ambient state. Mirrors the
/// `is_cancelled: &dyn Fn() -> bool` polling shape `warden_ingest::engine`
/// already uses between its own transaction steps.
pub struct TaskHandle {
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) task_id: i64,
}

impl TaskHandle {
    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    /// Refresh `last_heartbeat_at`. Must be called at least every 30s
    /// while a job runs, or the reaper will eventually mark it `DROPPED`.
    pub fn heartbeat(&self) -> Result<(), WardenError> {
        self.store.heartbeat(self.task_id, self.clock.now())
    }

    /// Poll the persisted cancel flag. Jobs that run longer than a single
    /// step should check this between steps and unwind cleanly when set.
    pub fn is_cancelled(&self) -> bool {
        self.store
            .get_task(self.task_id)
            .ok()
            .flatten()
            .map(|t| t.cancel_flag_set)
            .unwrap_or(false)
    }
}
