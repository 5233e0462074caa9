//! Human triage state: review status rules, comments, and cleanup plans.

use serde::{Deserialize, Serialize};

use super::enums::{CommentKind, ReviewStatus};

/// A bug-hash-keyed rule that sets the default review status for any
/// report matching that hash, independent of any one run (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewStatusRule {
    pub id: i64,
    pub bug_hash: String,
    pub status: ReviewStatus,
    pub message: Option<String>,
    pub author: String,
    pub created_at: i64,
}

/// A comment attached to a report hash. `SYSTEM` comments are written by
/// the service itself (e.g. recording a status change) and cannot be
/// edited or deleted by users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub bug_hash: String,
    pub author: String,
    pub message: String,
    pub kind: CommentKind,
    pub created_at: i64,
}

/// A named, ordered set of report hashes slated for removal in a future
/// cleanup pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupPlan {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub due_date: Option<i64>,
    pub closed: bool,
    pub created_at: i64,
    pub bug_hashes: Vec<String>,
}
