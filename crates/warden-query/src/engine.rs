//! `QueryEngine` — the one entry point `warden-service` calls into for
//! every read-only report operation named in spec §4.5.

use std::collections::BTreeMap;
use std::sync::Arc;

use warden_core::filter::{CompareData, CountDimension, ReportFilter, SortMode, MAX_QUERY_SIZE};
use warden_core::model::{AnalyzerStatistics, DetectionStatus, DiffType, File, Report, Run, RunHistory, SourceComponent};
use warden_core::traits::{ContentStore, ReportStore, TriageStore};
use warden_core::WardenError;

use crate::details::ReportDetails;
use crate::source::{encode, ContentEncoding, SourceFileData};

/// Clamps every `limit` it's handed to `WardenConfig::effective_max_query_size`
/// (itself never above the spec's hard `MAX_QUERY_SIZE = 500`), so callers
/// never need to re-derive the ceiling themselves.
pub struct QueryEngine {
    reports: Arc<dyn ReportStore>,
    content: Arc<dyn ContentStore>,
    triage: Arc<dyn TriageStore>,
    max_query_size: u32,
}

impl QueryEngine {
    pub fn new(reports: Arc<dyn ReportStore>, content: Arc<dyn ContentStore>, triage: Arc<dyn TriageStore>, max_query_size: u32) -> Self {
        Self {
            reports,
            content,
            triage,
            max_query_size: max_query_size.min(MAX_QUERY_SIZE),
        }
    }

    fn clamp(&self, limit: u32) -> u32 {
        warden_storage_clamp(limit, self.max_query_size)
    }

    pub fn get_run(&self, product_id: i64, run_id: i64) -> Result<Option<Run>, WardenError> {
        self.reports.get_run(product_id, run_id)
    }

    pub fn get_runs(&self, product_id: i64, run_name_filter: &[String]) -> Result<Vec<Run>, WardenError> {
        self.reports.get_runs(product_id, run_name_filter)
    }

    pub fn latest_run_history(&self, product_id: i64, run_id: i64) -> Result<Option<RunHistory>, WardenError> {
        self.reports.latest_run_history(product_id, run_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_run_results(
        &self,
        product_id: i64,
        run_ids: &[i64],
        limit: u32,
        offset: u32,
        sort_modes: &[SortMode],
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<Vec<Report>, WardenError> {
        self.reports
            .get_run_results(product_id, run_ids, self.clamp(limit), offset, sort_modes, filter, cmp_data)
    }

    pub fn get_run_result_count(
        &self,
        product_id: i64,
        run_ids: &[i64],
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<i64, WardenError> {
        self.reports.get_run_result_count(product_id, run_ids, filter, cmp_data)
    }

    /// One of the seven `get_*_counts` aggregations — `dimension` selects
    /// which (severity, checker message, review status, detection status,
    /// file, checker, analyzer name, or run-history tag).
    pub fn get_counts(
        &self,
        product_id: i64,
        run_ids: &[i64],
        dimension: CountDimension,
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<BTreeMap<String, i64>, WardenError> {
        self.reports.get_counts(product_id, run_ids, dimension, filter, cmp_data)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_diff_results_hash(
        &self,
        product_id: i64,
        run_ids: &[i64],
        cmp_run_ids: &[i64],
        hashes: &[String],
        diff_type: DiffType,
        skip_statuses: &[DetectionStatus],
        tag_ids: &[i64],
    ) -> Result<Vec<String>, WardenError> {
        self.reports
            .get_diff_results_hash(product_id, run_ids, cmp_run_ids, hashes, diff_type, skip_statuses, tag_ids)
    }

    /// `get_report_details`: the report itself, its bug path, and its
    /// comments (comments are keyed by `report_hash`, not `report_id`,
    /// since triage state is shared across every report with that hash —
    /// §3 ownership rule).
    pub fn get_report_details(&self, product_id: i64, report_id: i64) -> Result<Option<ReportDetails>, WardenError> {
        let Some(report) = self.reports.get_report(product_id, report_id)? else {
            return Ok(None);
        };
        let bug_path = self.reports.get_bug_path(product_id, report_id)?;
        let comments = self.triage.get_comments(product_id, &report.report_hash)?;
        Ok(Some(ReportDetails { report, bug_path, comments }))
    }

    pub fn get_file(&self, product_id: i64, file_id: i64) -> Result<Option<File>, WardenError> {
        self.reports.get_file(product_id, file_id)
    }

    /// `get_source_file_data`: a file's path and, when `include_content` is
    /// set, its blob from the content store, encoded per `encoding`.
    pub fn get_source_file_data(
        &self,
        product_id: i64,
        file_id: i64,
        include_content: bool,
        encoding: ContentEncoding,
    ) -> Result<Option<SourceFileData>, WardenError> {
        let Some(file) = self.reports.get_file(product_id, file_id)? else {
            return Ok(None);
        };
        let content = if include_content {
            self.content
                .get_content(product_id, &file.content_hash)?
                .map(|c| encode(&c.bytes, encoding))
        } else {
            None
        };
        Ok(Some(SourceFileData {
            file_id: file.id,
            path: file.filepath,
            content,
        }))
    }

    pub fn get_analysis_statistics(&self, product_id: i64, run_history_id: i64) -> Result<Vec<AnalyzerStatistics>, WardenError> {
        self.reports.get_analyzer_statistics(product_id, run_history_id)
    }

    pub fn list_source_components(&self, product_id: i64) -> Result<Vec<SourceComponent>, WardenError> {
        self.reports.list_source_components(product_id)
    }

    pub fn upsert_source_component(&self, product_id: i64, name: &str, value: &str) -> Result<SourceComponent, WardenError> {
        self.reports.upsert_source_component(product_id, name, value)
    }

    pub fn remove_source_component(&self, product_id: i64, name: &str) -> Result<(), WardenError> {
        self.reports.remove_source_component(product_id, name)
    }
}

/// Inlined rather than depending on `warden-storage` (that crate is one of
/// this one's *implementors*, not a dependency — `warden-query` only ever
/// sees `warden_core` trait objects).
fn warden_storage_clamp(requested: u32, max: u32) -> u32 {
    if requested == 0 {
        max
    } else {
        requested.min(max)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_core::clock::FixedClock;
    use warden_core::model::Product;
    use warden_storage::{SqliteContentStore, SqliteProductRegistry, SqliteReportStore, SqliteTriageStore};

    use super::*;

    fn engine_over_empty_product() -> (QueryEngine, i64, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SqliteProductRegistry::new(2));
        let product = Product {
            id: 1,
            endpoint: "demo".to_string(),
            displayed_name: "Demo".to_string(),
            description: None,
            db_connection_spec: dir.path().join("demo.sqlite").to_string_lossy().into_owned(),
            run_limit: None,
            review_status_change_disabled: false,
        };
        let status = registry.open(&product).unwrap();
        assert!(status.servable());

        let reports = Arc::new(SqliteReportStore::new(registry.clone()));
        let content = Arc::new(SqliteContentStore::new(registry.clone()));
        let clock = Arc::new(FixedClock::new(1_000));
        let triage = Arc::new(SqliteTriageStore::new(registry, clock));
        (QueryEngine::new(reports, content, triage, 500), product.id, dir)
    }

    #[test]
    fn limit_zero_means_the_configured_max() {
        let engine = QueryEngine::new(
            Arc::new(NoopStore),
            Arc::new(NoopStore),
            Arc::new(NoopStore),
            50,
        );
        assert_eq!(engine.clamp(0), 50);
        assert_eq!(engine.clamp(10_000), 50);
        assert_eq!(engine.clamp(10), 10);
    }

    #[test]
    fn new_clamps_its_own_ceiling_to_the_spec_maximum() {
        let engine = QueryEngine::new(Arc::new(NoopStore), Arc::new(NoopStore), Arc::new(NoopStore), 5_000);
        assert_eq!(engine.clamp(0), MAX_QUERY_SIZE);
    }

    #[test]
    fn get_runs_against_a_freshly_opened_product_is_empty() {
        let (engine, product_id, _dir) = engine_over_empty_product();
        let runs = engine.get_runs(product_id, &[]).unwrap();
        assert!(runs.is_empty());
    }

    #[test]
    fn get_report_details_on_a_missing_report_is_none() {
        let (engine, product_id, _dir) = engine_over_empty_product();
        assert!(engine.get_report_details(product_id, 999).unwrap().is_none());
    }

    /// A store stub used only to exercise `clamp()` without touching SQL.
    struct NoopStore;

    impl ReportStore for NoopStore {
        fn get_run(&self, _: i64, _: i64) -> Result<Option<Run>, WardenError> {
            unimplemented!()
        }
        fn get_runs(&self, _: i64, _: &[String]) -> Result<Vec<Run>, WardenError> {
            unimplemented!()
        }
        fn latest_run_history(&self, _: i64, _: i64) -> Result<Option<RunHistory>, WardenError> {
            unimplemented!()
        }
        fn get_run_results(
            &self,
            _: i64,
            _: &[i64],
            _: u32,
            _: u32,
            _: &[SortMode],
            _: &ReportFilter,
            _: Option<&CompareData>,
        ) -> Result<Vec<Report>, WardenError> {
            unimplemented!()
        }
        fn get_run_result_count(&self, _: i64, _: &[i64], _: &ReportFilter, _: Option<&CompareData>) -> Result<i64, WardenError> {
            unimplemented!()
        }
        fn get_report(&self, _: i64, _: i64) -> Result<Option<Report>, WardenError> {
            unimplemented!()
        }
        fn get_bug_path(&self, _: i64, _: i64) -> Result<warden_core::model::BugPath, WardenError> {
            unimplemented!()
        }
        fn get_file(&self, _: i64, _: i64) -> Result<Option<File>, WardenError> {
            unimplemented!()
        }
        fn get_counts(&self, _: i64, _: &[i64], _: CountDimension, _: &ReportFilter, _: Option<&CompareData>) -> Result<BTreeMap<String, i64>, WardenError> {
            unimplemented!()
        }
        fn get_diff_results_hash(&self, _: i64, _: &[i64], _: &[i64], _: &[String], _: DiffType, _: &[DetectionStatus], _: &[i64]) -> Result<Vec<String>, WardenError> {
            unimplemented!()
        }
        fn get_analyzer_statistics(&self, _: i64, _: i64) -> Result<Vec<AnalyzerStatistics>, WardenError> {
            unimplemented!()
        }
        fn list_source_components(&self, _: i64) -> Result<Vec<SourceComponent>, WardenError> {
            unimplemented!()
        }
        fn upsert_source_component(&self, _: i64, _: &str, _: &str) -> Result<SourceComponent, WardenError> {
            unimplemented!()
        }
        fn remove_source_component(&self, _: i64, _: &str) -> Result<(), WardenError> {
            unimplemented!()
        }
    }

    impl ContentStore for NoopStore {
        fn missing_content_hashes(&self, _: i64, _: &[String]) -> Result<Vec<String>, WardenError> {
            unimplemented!()
        }
        fn missing_blame_hashes(&self, _: i64, _: &[String]) -> Result<Vec<String>, WardenError> {
            unimplemented!()
        }
        fn put_content(&self, _: i64, _: &str, _: &[u8], _: Option<&[u8]>) -> Result<(), WardenError> {
            unimplemented!()
        }
        fn get_content(&self, _: i64, _: &str) -> Result<Option<warden_core::model::FileContent>, WardenError> {
            unimplemented!()
        }
        fn release_content(&self, _: i64, _: &str) -> Result<(), WardenError> {
            unimplemented!()
        }
    }

    impl TriageStore for NoopStore {
        fn upsert_review_status_rule(
            &self,
            _: i64,
            _: &str,
            _: warden_core::model::ReviewStatus,
            _: Option<&str>,
            _: &str,
        ) -> Result<warden_core::model::ReviewStatusRule, WardenError> {
            unimplemented!()
        }
        fn get_review_status_rules(
            &self,
            _: i64,
            _: &warden_core::filter::ReviewStatusRuleFilter,
            _: u32,
            _: u32,
        ) -> Result<Vec<warden_core::model::ReviewStatusRule>, WardenError> {
            unimplemented!()
        }
        fn remove_review_status_rules(&self, _: i64, _: &warden_core::filter::ReviewStatusRuleFilter) -> Result<u64, WardenError> {
            unimplemented!()
        }
        fn add_comment(&self, _: i64, _: &str, _: &str, _: &str) -> Result<warden_core::model::Comment, WardenError> {
            unimplemented!()
        }
        fn add_system_comment(&self, _: i64, _: &str, _: &str) -> Result<warden_core::model::Comment, WardenError> {
            unimplemented!()
        }
        fn get_comments(&self, _: i64, _: &str) -> Result<Vec<warden_core::model::Comment>, WardenError> {
            unimplemented!()
        }
        fn get_comment_count(&self, _: i64, _: &str) -> Result<i64, WardenError> {
            unimplemented!()
        }
        fn update_comment(&self, _: i64, _: i64, _: &str, _: &str) -> Result<warden_core::model::Comment, WardenError> {
            unimplemented!()
        }
        fn remove_comment(&self, _: i64, _: i64, _: &str) -> Result<(), WardenError> {
            unimplemented!()
        }
        fn create_cleanup_plan(&self, _: i64, _: &str, _: Option<&str>, _: Option<i64>) -> Result<warden_core::model::CleanupPlan, WardenError> {
            unimplemented!()
        }
        fn get_cleanup_plans(&self, _: i64) -> Result<Vec<warden_core::model::CleanupPlan>, WardenError> {
            unimplemented!()
        }
        fn update_cleanup_plan(
            &self,
            _: i64,
            _: i64,
            _: Option<&str>,
            _: Option<Option<&str>>,
            _: Option<Option<i64>>,
        ) -> Result<warden_core::model::CleanupPlan, WardenError> {
            unimplemented!()
        }
        fn remove_cleanup_plan(&self, _: i64, _: i64) -> Result<(), WardenError> {
            unimplemented!()
        }
        fn close_cleanup_plan(&self, _: i64, _: i64) -> Result<warden_core::model::CleanupPlan, WardenError> {
            unimplemented!()
        }
        fn reopen_cleanup_plan(&self, _: i64, _: i64) -> Result<warden_core::model::CleanupPlan, WardenError> {
            unimplemented!()
        }
        fn set_cleanup_plan(&self, _: i64, _: i64, _: &[String]) -> Result<(), WardenError> {
            unimplemented!()
        }
        fn unset_cleanup_plan(&self, _: i64, _: i64, _: &[String]) -> Result<(), WardenError> {
            unimplemented!()
        }
    }
}
