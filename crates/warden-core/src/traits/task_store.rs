//! `TaskStore` — task persistence, the seam `warden-tasks` implements so
//! task records survive a process restart.

use std::sync::Arc;

use crate::errors::WardenError;
use crate::filter::TaskFilter;
use crate::model::{Task, TaskKind, TaskStatus};

pub trait TaskStore: Send + Sync {
    fn allocate_task(&self, kind: TaskKind, product_id: Option<i64>, summary: &str, username: &str) -> Result<Task, WardenError>;

    fn set_status(&self, task_id: i64, status: TaskStatus) -> Result<(), WardenError>;

    fn heartbeat(&self, task_id: i64, at: i64) -> Result<(), WardenError>;

    fn set_cancel_flag(&self, task_id: i64) -> Result<(), WardenError>;

    fn set_consumed_flag(&self, task_id: i64) -> Result<(), WardenError>;

    /// Record a human-readable outcome (an error message, or a one-line
    /// success summary) on a task's `comment` column.
    fn set_comment(&self, task_id: i64, comment: &str) -> Result<(), WardenError>;

    fn get_task(&self, task_id: i64) -> Result<Option<Task>, WardenError>;

    fn list_tasks(&self, filter: &TaskFilter, limit: u32, offset: u32) -> Result<Vec<Task>, WardenError>;

    /// Mark `RUNNING` rows whose heartbeat is older than `stale_before` as
    /// `DROPPED`. Returns the number of rows affected.
    fn reap_dropped_tasks(&self, stale_before: i64) -> Result<u64, WardenError>;

    /// Drop every `RUNNING`/`ENQUEUED` row outright — called once at
    /// startup, before any worker begins dequeuing, since such a row
    /// necessarily belongs to a prior process lifetime.
    fn reap_all_in_flight(&self) -> Result<u64, WardenError>;

    /// Claim the oldest `ENQUEUED` task of `kind`, FIFO, transitioning it
    /// to `RUNNING`. Returns `None` when the queue for that kind is empty.
    fn dequeue_next(&self, kind: TaskKind) -> Result<Option<Task>, WardenError>;
}

impl<T: TaskStore + ?Sized> TaskStore for Arc<T> {
    fn allocate_task(&self, kind: TaskKind, product_id: Option<i64>, summary: &str, username: &str) -> Result<Task, WardenError> {
        (**self).allocate_task(kind, product_id, summary, username)
    }

    fn set_status(&self, task_id: i64, status: TaskStatus) -> Result<(), WardenError> {
        (**self).set_status(task_id, status)
    }

    fn heartbeat(&self, task_id: i64, at: i64) -> Result<(), WardenError> {
        (**self).heartbeat(task_id, at)
    }

    fn set_cancel_flag(&self, task_id: i64) -> Result<(), WardenError> {
        (**self).set_cancel_flag(task_id)
    }

    fn set_consumed_flag(&self, task_id: i64) -> Result<(), WardenError> {
        (**self).set_consumed_flag(task_id)
    }

    fn set_comment(&self, task_id: i64, comment: &str) -> Result<(), WardenError> {
        (**self).set_comment(task_id, comment)
    }

    fn get_task(&self, task_id: i64) -> Result<Option<Task>, WardenError> {
        (**self).get_task(task_id)
    }

    fn list_tasks(&self, filter: &TaskFilter, limit: u32, offset: u32) -> Result<Vec<Task>, WardenError> {
        (**self).list_tasks(filter, limit, offset)
    }

    fn reap_dropped_tasks(&self, stale_before: i64) -> Result<u64, WardenError> {
        (**self).reap_dropped_tasks(stale_before)
    }

    fn reap_all_in_flight(&self) -> Result<u64, WardenError> {
        (**self).reap_all_in_flight()
    }

    fn dequeue_next(&self, kind: TaskKind) -> Result<Option<Task>, WardenError> {
        (**self).dequeue_next(kind)
    }
}
