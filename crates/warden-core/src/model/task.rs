//! Background task records — persisted so a restart can see what was in
//! flight (§4.6).

use serde::{Deserialize, Serialize};

use super::enums::{TaskKind, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub kind: TaskKind,
    pub product_id: Option<i64>,
    pub status: TaskStatus,
    pub summary: String,
    pub comment: Option<String>,
    pub username: String,
    pub enqueued_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub last_heartbeat_at: Option<i64>,
    /// Set by a cooperating worker to request cancellation; read by the
    /// task's own code between steps.
    pub cancel_flag_set: bool,
    /// Set the first time a terminal task is read back through
    /// `get_task_info`; marks the row eligible for later garbage
    /// collection.
    pub consumed_flag_set: bool,
}

impl Task {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
