//! `get_report_details` (§4.5): a report plus its bug path and comments,
//! none of which any single `ReportStore`/`TriageStore` method returns on
//! its own.

use serde::{Deserialize, Serialize};

use warden_core::model::{BugPath, Comment, Report};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDetails {
    pub report: Report,
    pub bug_path: BugPath,
    pub comments: Vec<Comment>,
}
