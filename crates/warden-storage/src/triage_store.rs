//! `SqliteTriageStore` — `TriageStore` over a `SqliteProductRegistry`.

use std::sync::Arc;

use warden_core::clock::Clock;
use warden_core::filter::ReviewStatusRuleFilter;
use warden_core::model::{CleanupPlan, Comment, CommentKind, ReviewStatus, ReviewStatusRule};
use warden_core::traits::{ProductRegistry, TriageStore};
use warden_core::WardenError;

use crate::queries::{cleanup_plans, comments, reports, review_rules};
use crate::registry::SqliteProductRegistry;

pub struct SqliteTriageStore {
    registry: Arc<SqliteProductRegistry>,
    clock: Arc<dyn Clock>,
}

impl SqliteTriageStore {
    pub fn new(registry: Arc<SqliteProductRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }
}

impl TriageStore for SqliteTriageStore {
    fn upsert_review_status_rule(
        &self,
        product_id: i64,
        bug_hash: &str,
        status: ReviewStatus,
        message: Option<&str>,
        author: &str,
    ) -> Result<ReviewStatusRule, WardenError> {
        let now = self.clock.now();
        let mut result = None;
        self.registry.with_writer(product_id, &mut |conn| {
            let rule = review_rules::upsert(conn, bug_hash, status, message, author, now)?;
            reports::set_review_status_by_hash(conn, bug_hash, status)?;
            result = Some(rule);
            Ok(())
        })?;
        result.ok_or_else(|| WardenError::database("review status rule upsert produced no row"))
    }

    fn get_review_status_rules(
        &self,
        product_id: i64,
        filter: &ReviewStatusRuleFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ReviewStatusRule>, WardenError> {
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = review_rules::list(conn, filter, limit, offset)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn remove_review_status_rules(&self, product_id: i64, filter: &ReviewStatusRuleFilter) -> Result<u64, WardenError> {
        let mut removed = 0;
        self.registry.with_writer(product_id, &mut |conn| {
            removed = review_rules::remove_matching(conn, filter)?;
            Ok(())
        })?;
        Ok(removed)
    }

    fn add_comment(&self, product_id: i64, bug_hash: &str, author: &str, message: &str) -> Result<Comment, WardenError> {
        let now = self.clock.now();
        let mut result = None;
        self.registry.with_writer(product_id, &mut |conn| {
            result = Some(comments::insert(conn, bug_hash, author, message, CommentKind::User, now)?);
            Ok(())
        })?;
        result.ok_or_else(|| WardenError::database("comment insert produced no row"))
    }

    fn add_system_comment(&self, product_id: i64, bug_hash: &str, message: &str) -> Result<Comment, WardenError> {
        let now = self.clock.now();
        let mut result = None;
        self.registry.with_writer(product_id, &mut |conn| {
            result = Some(comments::insert(conn, bug_hash, "system", message, CommentKind::System, now)?);
            Ok(())
        })?;
        result.ok_or_else(|| WardenError::database("system comment insert produced no row"))
    }

    fn get_comments(&self, product_id: i64, bug_hash: &str) -> Result<Vec<Comment>, WardenError> {
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = comments::list_for_hash(conn, bug_hash)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn get_comment_count(&self, product_id: i64, bug_hash: &str) -> Result<i64, WardenError> {
        let mut result = 0;
        self.registry.with_reader(product_id, &mut |conn| {
            result = comments::count_for_hash(conn, bug_hash)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn update_comment(&self, product_id: i64, comment_id: i64, message: &str, requested_by: &str) -> Result<Comment, WardenError> {
        let mut result = None;
        self.registry.with_writer(product_id, &mut |conn| {
            result = Some(comments::update(conn, comment_id, message, requested_by)?);
            Ok(())
        })?;
        result.ok_or_else(|| WardenError::database("comment update produced no row"))
    }

    fn remove_comment(&self, product_id: i64, comment_id: i64, requested_by: &str) -> Result<(), WardenError> {
        self.registry.with_writer(product_id, &mut |conn| comments::remove(conn, comment_id, requested_by))
    }

    fn create_cleanup_plan(&self, product_id: i64, name: &str, description: Option<&str>, due_date: Option<i64>) -> Result<CleanupPlan, WardenError> {
        let now = self.clock.now();
        let mut result = None;
        self.registry.with_writer(product_id, &mut |conn| {
            result = Some(cleanup_plans::create(conn, name, description, due_date, now)?);
            Ok(())
        })?;
        result.ok_or_else(|| WardenError::database("cleanup plan insert produced no row"))
    }

    fn get_cleanup_plans(&self, product_id: i64) -> Result<Vec<CleanupPlan>, WardenError> {
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = cleanup_plans::list(conn)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn update_cleanup_plan(
        &self,
        product_id: i64,
        plan_id: i64,
        name: Option<&str>,
        description: Option<Option<&str>>,
        due_date: Option<Option<i64>>,
    ) -> Result<CleanupPlan, WardenError> {
        let mut result = None;
        self.registry.with_writer(product_id, &mut |conn| {
            result = Some(cleanup_plans::update(conn, plan_id, name, description, due_date)?);
            Ok(())
        })?;
        result.ok_or_else(|| WardenError::database("cleanup plan update produced no row"))
    }

    fn remove_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<(), WardenError> {
        self.registry.with_writer(product_id, &mut |conn| cleanup_plans::remove(conn, plan_id))
    }

    fn close_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<CleanupPlan, WardenError> {
        let mut result = None;
        self.registry.with_writer(product_id, &mut |conn| {
            result = Some(cleanup_plans::set_closed(conn, plan_id, true)?);
            Ok(())
        })?;
        result.ok_or_else(|| WardenError::database("cleanup plan close produced no row"))
    }

    fn reopen_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<CleanupPlan, WardenError> {
        let mut result = None;
        self.registry.with_writer(product_id, &mut |conn| {
            result = Some(cleanup_plans::set_closed(conn, plan_id, false)?);
            Ok(())
        })?;
        result.ok_or_else(|| WardenError::database("cleanup plan reopen produced no row"))
    }

    fn set_cleanup_plan(&self, product_id: i64, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError> {
        self.registry.with_writer(product_id, &mut |conn| cleanup_plans::add_members(conn, plan_id, bug_hashes))
    }

    fn unset_cleanup_plan(&self, product_id: i64, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError> {
        self.registry.with_writer(product_id, &mut |conn| cleanup_plans::remove_members(conn, plan_id, bug_hashes))
    }
}
