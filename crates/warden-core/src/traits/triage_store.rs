//! `TriageStore` — review status rules, comments and cleanup plans, the
//! seam `warden-triage` implements and `warden-query`/`warden-service`
//! consume.

use std::sync::Arc;

use crate::errors::WardenError;
use crate::filter::ReviewStatusRuleFilter;
use crate::model::{CleanupPlan, Comment, ReviewStatus, ReviewStatusRule};

pub trait TriageStore: Send + Sync {
    fn upsert_review_status_rule(
        &self,
        product_id: i64,
        bug_hash: &str,
        status: ReviewStatus,
        message: Option<&str>,
        author: &str,
    ) -> Result<ReviewStatusRule, WardenError>;

    fn get_review_status_rules(
        &self,
        product_id: i64,
        filter: &ReviewStatusRuleFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ReviewStatusRule>, WardenError>;

    fn remove_review_status_rules(&self, product_id: i64, filter: &ReviewStatusRuleFilter) -> Result<u64, WardenError>;

    fn add_comment(&self, product_id: i64, bug_hash: &str, author: &str, message: &str) -> Result<Comment, WardenError>;

    /// Write a `SYSTEM`-kind comment — used to record an automatic event
    /// (a review-status transition) rather than an author's own note.
    /// Unlike `add_comment`, the result can never be edited or removed by
    /// a user (§4.6).
    fn add_system_comment(&self, product_id: i64, bug_hash: &str, message: &str) -> Result<Comment, WardenError>;

    fn get_comments(&self, product_id: i64, bug_hash: &str) -> Result<Vec<Comment>, WardenError>;

    fn get_comment_count(&self, product_id: i64, bug_hash: &str) -> Result<i64, WardenError>;

    fn update_comment(&self, product_id: i64, comment_id: i64, message: &str, requested_by: &str) -> Result<Comment, WardenError>;

    fn remove_comment(&self, product_id: i64, comment_id: i64, requested_by: &str) -> Result<(), WardenError>;

    fn create_cleanup_plan(&self, product_id: i64, name: &str, description: Option<&str>, due_date: Option<i64>) -> Result<CleanupPlan, WardenError>;

    fn get_cleanup_plans(&self, product_id: i64) -> Result<Vec<CleanupPlan>, WardenError>;

    /// Rename/redescribe/reschedule a plan. `None` for `name` leaves it
    /// untouched; `description`/`due_date` use `Some(None)` to clear the
    /// field and `None` to leave it untouched.
    fn update_cleanup_plan(
        &self,
        product_id: i64,
        plan_id: i64,
        name: Option<&str>,
        description: Option<Option<&str>>,
        due_date: Option<Option<i64>>,
    ) -> Result<CleanupPlan, WardenError>;

    fn remove_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<(), WardenError>;

    fn close_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<CleanupPlan, WardenError>;

    fn reopen_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<CleanupPlan, WardenError>;

    fn set_cleanup_plan(&self, product_id: i64, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError>;

    fn unset_cleanup_plan(&self, product_id: i64, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError>;
}

impl<T: TriageStore + ?Sized> TriageStore for Arc<T> {
    fn upsert_review_status_rule(
        &self,
        product_id: i64,
        bug_hash: &str,
        status: ReviewStatus,
        message: Option<&str>,
        author: &str,
    ) -> Result<ReviewStatusRule, WardenError> {
        (**self).upsert_review_status_rule(product_id, bug_hash, status, message, author)
    }

    fn get_review_status_rules(
        &self,
        product_id: i64,
        filter: &ReviewStatusRuleFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ReviewStatusRule>, WardenError> {
        (**self).get_review_status_rules(product_id, filter, limit, offset)
    }

    fn remove_review_status_rules(&self, product_id: i64, filter: &ReviewStatusRuleFilter) -> Result<u64, WardenError> {
        (**self).remove_review_status_rules(product_id, filter)
    }

    fn add_comment(&self, product_id: i64, bug_hash: &str, author: &str, message: &str) -> Result<Comment, WardenError> {
        (**self).add_comment(product_id, bug_hash, author, message)
    }

    fn add_system_comment(&self, product_id: i64, bug_hash: &str, message: &str) -> Result<Comment, WardenError> {
        (**self).add_system_comment(product_id, bug_hash, message)
    }

    fn get_comments(&self, product_id: i64, bug_hash: &str) -> Result<Vec<Comment>, WardenError> {
        (**self).get_comments(product_id, bug_hash)
    }

    fn get_comment_count(&self, product_id: i64, bug_hash: &str) -> Result<i64, WardenError> {
        (**self).get_comment_count(product_id, bug_hash)
    }

    fn update_comment(&self, product_id: i64, comment_id: i64, message: &str, requested_by: &str) -> Result<Comment, WardenError> {
        (**self).update_comment(product_id, comment_id, message, requested_by)
    }

    fn remove_comment(&self, product_id: i64, comment_id: i64, requested_by: &str) -> Result<(), WardenError> {
        (**self).remove_comment(product_id, comment_id, requested_by)
    }

    fn create_cleanup_plan(&self, product_id: i64, name: &str, description: Option<&str>, due_date: Option<i64>) -> Result<CleanupPlan, WardenError> {
        (**self).create_cleanup_plan(product_id, name, description, due_date)
    }

    fn get_cleanup_plans(&self, product_id: i64) -> Result<Vec<CleanupPlan>, WardenError> {
        (**self).get_cleanup_plans(product_id)
    }

    fn update_cleanup_plan(
        &self,
        product_id: i64,
        plan_id: i64,
        name: Option<&str>,
        description: Option<Option<&str>>,
        due_date: Option<Option<i64>>,
    ) -> Result<CleanupPlan, WardenError> {
        (**self).update_cleanup_plan(product_id, plan_id, name, description, due_date)
    }

    fn remove_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<(), WardenError> {
        (**self).remove_cleanup_plan(product_id, plan_id)
    }

    fn close_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<CleanupPlan, WardenError> {
        (**self).close_cleanup_plan(product_id, plan_id)
    }

    fn reopen_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<CleanupPlan, WardenError> {
        (**self).reopen_cleanup_plan(product_id, plan_id)
    }

    fn set_cleanup_plan(&self, product_id: i64, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError> {
        (**self).set_cleanup_plan(product_id, plan_id, bug_hashes)
    }

    fn unset_cleanup_plan(&self, product_id: i64, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError> {
        (**self).unset_cleanup_plan(product_id, plan_id, bug_hashes)
    }
}
