//! `SqliteTaskStore` — `TaskStore` over a dedicated server-level database.
//!
//! Tasks are not scoped to any one product's database (a `CLEANUP` task can
//! span products, and the task list itself is a server-wide view), so this
//! owns its own `ProductDatabase` rather than going through the per-product
//! `SqliteProductRegistry` the other store types use.

use std::path::Path;
use std::sync::Arc;

use warden_core::clock::Clock;
use warden_core::filter::TaskFilter;
use warden_core::model::{Task, TaskKind, TaskStatus};
use warden_core::traits::TaskStore;
use warden_core::WardenError;

use crate::connection::ProductDatabase;
use crate::migrations;
use crate::queries::tasks;

pub struct SqliteTaskStore {
    db: Arc<ProductDatabase>,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskStore {
    /// Open (creating and migrating if absent) the task-tracking database
    /// at `path` with a `pool_size`-deep reader pool.
    pub fn open(path: &Path, pool_size: u32, clock: Arc<dyn Clock>) -> Result<Self, WardenError> {
        let db = ProductDatabase::open(path, pool_size)?;
        db.with_writer(|conn| migrations::migrate(conn).map(|_| ()))?;
        Ok(Self { db: Arc::new(db), clock })
    }

    pub fn open_in_memory(pool_size: u32, clock: Arc<dyn Clock>) -> Result<Self, WardenError> {
        let db = ProductDatabase::open_in_memory(pool_size)?;
        db.with_writer(|conn| migrations::migrate(conn).map(|_| ()))?;
        Ok(Self { db: Arc::new(db), clock })
    }

    pub fn from_database(db: Arc<ProductDatabase>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

impl TaskStore for SqliteTaskStore {
    fn allocate_task(&self, kind: TaskKind, product_id: Option<i64>, summary: &str, username: &str) -> Result<Task, WardenError> {
        let now = self.clock.now();
        self.db.with_writer(|conn| tasks::allocate(conn, kind, product_id, summary, username, now))
    }

    fn set_status(&self, task_id: i64, status: TaskStatus) -> Result<(), WardenError> {
        let now = self.clock.now();
        self.db.with_writer(|conn| tasks::set_status(conn, task_id, status, now))
    }

    fn heartbeat(&self, task_id: i64, at: i64) -> Result<(), WardenError> {
        self.db.with_writer(|conn| tasks::heartbeat(conn, task_id, at))
    }

    fn set_cancel_flag(&self, task_id: i64) -> Result<(), WardenError> {
        self.db.with_writer(|conn| tasks::set_cancel_flag(conn, task_id))
    }

    fn set_consumed_flag(&self, task_id: i64) -> Result<(), WardenError> {
        self.db.with_writer(|conn| tasks::set_consumed_flag(conn, task_id))
    }

    fn set_comment(&self, task_id: i64, comment: &str) -> Result<(), WardenError> {
        self.db.with_writer(|conn| tasks::set_comment(conn, task_id, comment))
    }

    fn get_task(&self, task_id: i64) -> Result<Option<Task>, WardenError> {
        self.db.with_reader(|conn| tasks::get(conn, task_id))
    }

    fn list_tasks(&self, filter: &TaskFilter, limit: u32, offset: u32) -> Result<Vec<Task>, WardenError> {
        self.db.with_reader(|conn| tasks::list(conn, filter, limit, offset))
    }

    fn reap_dropped_tasks(&self, stale_before: i64) -> Result<u64, WardenError> {
        self.db.with_writer(|conn| tasks::reap_stale_heartbeats(conn, stale_before))
    }

    fn reap_all_in_flight(&self) -> Result<u64, WardenError> {
        self.db.with_writer(tasks::reap_all_in_flight)
    }

    fn dequeue_next(&self, kind: TaskKind) -> Result<Option<Task>, WardenError> {
        let now = self.clock.now();
        self.db.with_writer(|conn| {
            let task = match tasks::dequeue_next(conn, kind)? {
                Some(t) => t,
                None => return Ok(None),
            };
            tasks::set_status(conn, task.id, TaskStatus::Running, now)?;
            tasks::get(conn, task.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::clock::FixedClock;

    #[test]
    fn allocate_then_fetch_roundtrips() {
        let store = SqliteTaskStore::open_in_memory(2, Arc::new(FixedClock::new(1_000))).unwrap();
        let task = store.allocate_task(TaskKind::Store, Some(7), "ingest run", "alice").unwrap();
        assert_eq!(task.status, TaskStatus::Allocated);

        store.set_status(task.id, TaskStatus::Running).unwrap();
        let fetched = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Running);
        assert_eq!(fetched.started_at, Some(1_000));
    }

    #[test]
    fn reap_dropped_tasks_marks_stale_running_rows() {
        let store = SqliteTaskStore::open_in_memory(2, Arc::new(FixedClock::new(1_000))).unwrap();
        let task = store.allocate_task(TaskKind::Cleanup, None, "plan sweep", "bob").unwrap();
        store.set_status(task.id, TaskStatus::Running).unwrap();
        store.heartbeat(task.id, 1_000).unwrap();

        let affected = store.reap_dropped_tasks(2_000).unwrap();
        assert_eq!(affected, 1);
        let fetched = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Dropped);
    }
}
