//! `TriageManager` — the one entry point `warden-service` calls into for
//! every triage mutation named in spec §4.6.

use std::sync::Arc;

use warden_core::filter::ReviewStatusRuleFilter;
use warden_core::model::{CleanupPlan, Comment, ReviewStatus, ReviewStatusRule};
use tracing::info;
use warden_core::traits::{ReportStore, TriageStore};
use warden_core::WardenError;

pub struct TriageManager {
    triage: Arc<dyn TriageStore>,
    reports: Arc<dyn ReportStore>,
}

impl TriageManager {
    pub fn new(triage: Arc<dyn TriageStore>, reports: Arc<dyn ReportStore>) -> Self {
        Self { triage, reports }
    }

    /// `change_review_status` (§4.6): writes a rule keyed by the report's
    /// hash, so the verdict propagates to every report sharing it, then
    /// records the observed transition as a `SYSTEM` comment. Rejected
    /// with `Disabled` when the product has disabled review-status
    /// changes and the caller isn't a product admin — the façade resolves
    /// both inputs (it owns the `Product` row and the permission check)
    /// and passes them through rather than this crate reaching for either
    /// itself (§9: explicit constructor-injected dependencies, not
    /// ambient lookups).
    pub fn change_review_status(
        &self,
        product_id: i64,
        report_id: i64,
        status: ReviewStatus,
        message: Option<&str>,
        author: &str,
        change_disabled_for_product: bool,
        caller_is_product_admin: bool,
    ) -> Result<ReviewStatusRule, WardenError> {
        if change_disabled_for_product && !caller_is_product_admin {
            return Err(WardenError::disabled(product_id));
        }

        let report = self
            .reports
            .get_report(product_id, report_id)?
            .ok_or_else(|| WardenError::general(format!("no report {report_id}")))?;

        let prior_status = self
            .triage
            .get_review_status_rules(
                product_id,
                &ReviewStatusRuleFilter {
                    report_hashes: vec![report.report_hash.clone()],
                    ..Default::default()
                },
                1,
                0,
            )?
            .into_iter()
            .next()
            .map(|r| r.status)
            .unwrap_or_default();

        let rule = self
            .triage
            .upsert_review_status_rule(product_id, &report.report_hash, status, message, author)?;

        if prior_status != status {
            self.triage.add_system_comment(
                product_id,
                &report.report_hash,
                &format!("{} → {} by {author}", prior_status.as_str(), status.as_str()),
            )?;
            info!(product_id, report_hash = %report.report_hash, from = prior_status.as_str(), to = status.as_str(), author, "review status changed");
        }

        Ok(rule)
    }

    pub fn get_review_status_rules(
        &self,
        product_id: i64,
        filter: &ReviewStatusRuleFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ReviewStatusRule>, WardenError> {
        self.triage.get_review_status_rules(product_id, filter, limit, offset)
    }

    pub fn remove_review_status_rules(&self, product_id: i64, filter: &ReviewStatusRuleFilter) -> Result<u64, WardenError> {
        self.triage.remove_review_status_rules(product_id, filter)
    }

    pub fn add_comment(&self, product_id: i64, bug_hash: &str, author: &str, message: &str) -> Result<Comment, WardenError> {
        self.triage.add_comment(product_id, bug_hash, author, message)
    }

    pub fn update_comment(&self, product_id: i64, comment_id: i64, message: &str, requested_by: &str) -> Result<Comment, WardenError> {
        self.triage.update_comment(product_id, comment_id, message, requested_by)
    }

    pub fn remove_comment(&self, product_id: i64, comment_id: i64, requested_by: &str) -> Result<(), WardenError> {
        self.triage.remove_comment(product_id, comment_id, requested_by)
    }

    pub fn get_comments(&self, product_id: i64, bug_hash: &str) -> Result<Vec<Comment>, WardenError> {
        self.triage.get_comments(product_id, bug_hash)
    }

    pub fn get_comment_count(&self, product_id: i64, bug_hash: &str) -> Result<i64, WardenError> {
        self.triage.get_comment_count(product_id, bug_hash)
    }

    pub fn create_cleanup_plan(&self, product_id: i64, name: &str, description: Option<&str>, due_date: Option<i64>) -> Result<CleanupPlan, WardenError> {
        self.triage.create_cleanup_plan(product_id, name, description, due_date)
    }

    pub fn get_cleanup_plans(&self, product_id: i64) -> Result<Vec<CleanupPlan>, WardenError> {
        self.triage.get_cleanup_plans(product_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_cleanup_plan(
        &self,
        product_id: i64,
        plan_id: i64,
        name: Option<&str>,
        description: Option<Option<&str>>,
        due_date: Option<Option<i64>>,
    ) -> Result<CleanupPlan, WardenError> {
        self.triage.update_cleanup_plan(product_id, plan_id, name, description, due_date)
    }

    pub fn remove_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<(), WardenError> {
        self.triage.remove_cleanup_plan(product_id, plan_id)
    }

    pub fn close_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<CleanupPlan, WardenError> {
        self.triage.close_cleanup_plan(product_id, plan_id)
    }

    pub fn reopen_cleanup_plan(&self, product_id: i64, plan_id: i64) -> Result<CleanupPlan, WardenError> {
        self.triage.reopen_cleanup_plan(product_id, plan_id)
    }

    pub fn set_cleanup_plan(&self, product_id: i64, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError> {
        self.triage.set_cleanup_plan(product_id, plan_id, bug_hashes)
    }

    pub fn unset_cleanup_plan(&self, product_id: i64, plan_id: i64, bug_hashes: &[String]) -> Result<(), WardenError> {
        self.triage.unset_cleanup_plan(product_id, plan_id, bug_hashes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_core::clock::FixedClock;
    use warden_core::model::Product;
    use warden_storage::{SqliteProductRegistry, SqliteReportStore, SqliteTriageStore};

    use super::*;

    fn manager_over_product(pool_size: u32) -> (TriageManager, Arc<SqliteProductRegistry>, i64, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SqliteProductRegistry::new(pool_size));
        let product = Product {
            id: 1,
            endpoint: "demo".to_string(),
            displayed_name: "Demo".to_string(),
            description: None,
            db_connection_spec: dir.path().join("demo.sqlite").to_string_lossy().into_owned(),
            run_limit: None,
            review_status_change_disabled: false,
        };
        registry.open(&product).unwrap();

        let reports = Arc::new(SqliteReportStore::new(registry.clone()));
        let triage = Arc::new(SqliteTriageStore::new(registry.clone(), Arc::new(FixedClock::new(1_000))));
        (TriageManager::new(triage, reports), registry, product.id, dir)
    }

    fn insert_test_report(registry: &SqliteProductRegistry, product_id: i64) -> i64 {
        use warden_core::model::{DetectionStatus, Severity};
        use warden_core::traits::ProductRegistry;
        use warden_storage::queries::{contents, files, reports, runs};

        let mut report_id = 0;
        registry
            .with_writer(product_id, &mut |conn| {
                let run = runs::get_or_create_run(conn, "r1", 1_000)?;
                contents::put_content(conn, "content-hash-1", b"int x = 1;", None)?;
                let file_id = files::insert_file(conn, run.id, "main.c", "content-hash-1")?;
                report_id = reports::insert_report(
                    conn,
                    &reports::NewReport {
                        run_id: run.id,
                        file_id,
                        line: 10,
                        column: 1,
                        checker_id: "core.X".to_string(),
                        analyzer_name: "clangsa".to_string(),
                        checker_msg: "leak".to_string(),
                        severity: Severity::High,
                        report_hash: "hash-1".to_string(),
                        bug_path_length: 0,
                        detected_at: 1_000,
                        detection_status: DetectionStatus::New,
                    },
                )?;
                Ok(())
            })
            .unwrap();
        report_id
    }

    #[test]
    fn change_review_status_propagates_and_emits_system_comment() {
        let (manager, registry, product_id, _dir) = manager_over_product(2);
        let report_id = insert_test_report(&registry, product_id);

        manager
            .change_review_status(product_id, report_id, ReviewStatus::FalsePositive, Some("not a bug"), "alice", false, false)
            .unwrap();

        let rules = manager
            .get_review_status_rules(product_id, &ReviewStatusRuleFilter::default(), 10, 0)
            .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].status, ReviewStatus::FalsePositive);

        let comments = manager.get_comments(product_id, "hash-1").unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].message.contains("UNREVIEWED → FALSE_POSITIVE"));
    }

    #[test]
    fn change_review_status_rejected_when_disabled_for_non_admin() {
        let (manager, registry, product_id, _dir) = manager_over_product(2);
        let report_id = insert_test_report(&registry, product_id);

        let err = manager
            .change_review_status(product_id, report_id, ReviewStatus::Confirmed, None, "alice", true, false)
            .unwrap_err();
        assert!(matches!(err, WardenError::Disabled { .. }));
    }

    #[test]
    fn change_review_status_allowed_for_admin_even_when_disabled() {
        let (manager, registry, product_id, _dir) = manager_over_product(2);
        let report_id = insert_test_report(&registry, product_id);

        manager
            .change_review_status(product_id, report_id, ReviewStatus::Confirmed, None, "admin", true, true)
            .unwrap();
    }

    #[test]
    fn repeating_the_same_status_does_not_duplicate_the_system_comment() {
        let (manager, registry, product_id, _dir) = manager_over_product(2);
        let report_id = insert_test_report(&registry, product_id);

        manager
            .change_review_status(product_id, report_id, ReviewStatus::Confirmed, None, "alice", false, false)
            .unwrap();
        manager
            .change_review_status(product_id, report_id, ReviewStatus::Confirmed, None, "alice", false, false)
            .unwrap();

        assert_eq!(manager.get_comments(product_id, "hash-1").unwrap().len(), 1);
    }

    #[test]
    fn cleanup_plan_lifecycle() {
        let (manager, _registry, product_id, _dir) = manager_over_product(2);

        let plan = manager.create_cleanup_plan(product_id, "Q3 cleanup", Some("burn down the backlog"), Some(2_000)).unwrap();
        assert!(!plan.closed);
        assert_eq!(plan.due_date, Some(2_000));

        manager.set_cleanup_plan(product_id, plan.id, &["hash-1".to_string(), "hash-2".to_string()]).unwrap();
        let plans = manager.get_cleanup_plans(product_id).unwrap();
        assert_eq!(plans[0].bug_hashes, vec!["hash-1".to_string(), "hash-2".to_string()]);

        manager.unset_cleanup_plan(product_id, plan.id, &["hash-2".to_string()]).unwrap();
        let plans = manager.get_cleanup_plans(product_id).unwrap();
        assert_eq!(plans[0].bug_hashes, vec!["hash-1".to_string()]);

        let renamed = manager
            .update_cleanup_plan(product_id, plan.id, Some("Q3 cleanup (extended)"), None, Some(Some(3_000)))
            .unwrap();
        assert_eq!(renamed.name, "Q3 cleanup (extended)");
        assert_eq!(renamed.due_date, Some(3_000));
        assert_eq!(renamed.description.as_deref(), Some("burn down the backlog"));

        let closed = manager.close_cleanup_plan(product_id, plan.id).unwrap();
        assert!(closed.closed);
        let reopened = manager.reopen_cleanup_plan(product_id, plan.id).unwrap();
        assert!(!reopened.closed);

        manager.remove_cleanup_plan(product_id, plan.id).unwrap();
        assert!(manager.get_cleanup_plans(product_id).unwrap().is_empty());
    }

    #[test]
    fn removing_a_missing_cleanup_plan_errors() {
        let (manager, _registry, product_id, _dir) = manager_over_product(2);
        assert!(manager.remove_cleanup_plan(product_id, 999).is_err());
    }
}
