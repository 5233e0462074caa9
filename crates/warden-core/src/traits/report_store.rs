//! `ReportStore` — read/write access to runs, reports and bug paths,
//! the seam `warden-query` and `warden-ingest` depend on.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::WardenError;
use crate::filter::{CompareData, CountDimension, ReportFilter, SortMode};
use crate::model::{AnalyzerStatistics, BugPath, DetectionStatus, DiffType, File, Report, Run, RunHistory, SourceComponent};

pub trait ReportStore: Send + Sync {
    fn get_run(&self, product_id: i64, run_id: i64) -> Result<Option<Run>, WardenError>;

    fn get_runs(&self, product_id: i64, run_name_filter: &[String]) -> Result<Vec<Run>, WardenError>;

    fn latest_run_history(&self, product_id: i64, run_id: i64) -> Result<Option<RunHistory>, WardenError>;

    fn get_run_results(
        &self,
        product_id: i64,
        run_ids: &[i64],
        limit: u32,
        offset: u32,
        sort_modes: &[SortMode],
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<Vec<Report>, WardenError>;

    fn get_run_result_count(
        &self,
        product_id: i64,
        run_ids: &[i64],
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<i64, WardenError>;

    fn get_report(&self, product_id: i64, report_id: i64) -> Result<Option<Report>, WardenError>;

    fn get_bug_path(&self, product_id: i64, report_id: i64) -> Result<BugPath, WardenError>;

    fn get_file(&self, product_id: i64, file_id: i64) -> Result<Option<File>, WardenError>;

    /// One of the seven `get_*_counts` aggregations named in §4.5, keyed by
    /// `dimension`. Returns a map from the dimension's string value to the
    /// number of matching reports (or unique hashes, under `filter.is_unique`).
    fn get_counts(
        &self,
        product_id: i64,
        run_ids: &[i64],
        dimension: CountDimension,
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<BTreeMap<String, i64>, WardenError>;

    /// `get_diff_results_hash`: of `hashes`, return those satisfying
    /// `diff_type` between `run_ids` (left) and `cmp_run_ids` (right), after
    /// excluding any report whose detection status is in `skip_statuses`.
    /// `tag_ids` restricts each side to RunHistory rows with those ids when
    /// non-empty.
    #[allow(clippy::too_many_arguments)]
    fn get_diff_results_hash(
        &self,
        product_id: i64,
        run_ids: &[i64],
        cmp_run_ids: &[i64],
        hashes: &[String],
        diff_type: DiffType,
        skip_statuses: &[DetectionStatus],
        tag_ids: &[i64],
    ) -> Result<Vec<String>, WardenError>;

    fn get_analyzer_statistics(&self, product_id: i64, run_history_id: i64) -> Result<Vec<AnalyzerStatistics>, WardenError>;

    fn list_source_components(&self, product_id: i64) -> Result<Vec<SourceComponent>, WardenError>;

    fn upsert_source_component(&self, product_id: i64, name: &str, value: &str) -> Result<SourceComponent, WardenError>;

    fn remove_source_component(&self, product_id: i64, name: &str) -> Result<(), WardenError>;
}

impl<T: ReportStore + ?Sized> ReportStore for Arc<T> {
    fn get_run(&self, product_id: i64, run_id: i64) -> Result<Option<Run>, WardenError> {
        (**self).get_run(product_id, run_id)
    }

    fn get_runs(&self, product_id: i64, run_name_filter: &[String]) -> Result<Vec<Run>, WardenError> {
        (**self).get_runs(product_id, run_name_filter)
    }

    fn latest_run_history(&self, product_id: i64, run_id: i64) -> Result<Option<RunHistory>, WardenError> {
        (**self).latest_run_history(product_id, run_id)
    }

    fn get_run_results(
        &self,
        product_id: i64,
        run_ids: &[i64],
        limit: u32,
        offset: u32,
        sort_modes: &[SortMode],
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<Vec<Report>, WardenError> {
        (**self).get_run_results(product_id, run_ids, limit, offset, sort_modes, filter, cmp_data)
    }

    fn get_run_result_count(
        &self,
        product_id: i64,
        run_ids: &[i64],
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<i64, WardenError> {
        (**self).get_run_result_count(product_id, run_ids, filter, cmp_data)
    }

    fn get_report(&self, product_id: i64, report_id: i64) -> Result<Option<Report>, WardenError> {
        (**self).get_report(product_id, report_id)
    }

    fn get_bug_path(&self, product_id: i64, report_id: i64) -> Result<BugPath, WardenError> {
        (**self).get_bug_path(product_id, report_id)
    }

    fn get_file(&self, product_id: i64, file_id: i64) -> Result<Option<File>, WardenError> {
        (**self).get_file(product_id, file_id)
    }

    fn get_counts(
        &self,
        product_id: i64,
        run_ids: &[i64],
        dimension: CountDimension,
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<BTreeMap<String, i64>, WardenError> {
        (**self).get_counts(product_id, run_ids, dimension, filter, cmp_data)
    }

    fn get_diff_results_hash(
        &self,
        product_id: i64,
        run_ids: &[i64],
        cmp_run_ids: &[i64],
        hashes: &[String],
        diff_type: DiffType,
        skip_statuses: &[DetectionStatus],
        tag_ids: &[i64],
    ) -> Result<Vec<String>, WardenError> {
        (**self).get_diff_results_hash(product_id, run_ids, cmp_run_ids, hashes, diff_type, skip_statuses, tag_ids)
    }

    fn get_analyzer_statistics(&self, product_id: i64, run_history_id: i64) -> Result<Vec<AnalyzerStatistics>, WardenError> {
        (**self).get_analyzer_statistics(product_id, run_history_id)
    }

    fn list_source_components(&self, product_id: i64) -> Result<Vec<SourceComponent>, WardenError> {
        (**self).list_source_components(product_id)
    }

    fn upsert_source_component(&self, product_id: i64, name: &str, value: &str) -> Result<SourceComponent, WardenError> {
        (**self).upsert_source_component(product_id, name, value)
    }

    fn remove_source_component(&self, product_id: i64, name: &str) -> Result<(), WardenError> {
        (**self).remove_source_component(product_id, name)
    }
}
