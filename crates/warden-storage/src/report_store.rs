//! `SqliteReportStore` — `ReportStore` over a `SqliteProductRegistry`.

use std::collections::BTreeMap;
use std::sync::Arc;

use warden_core::filter::{CompareData, CountDimension, ReportFilter, SortMode};
use warden_core::model::{AnalyzerStatistics, BugPath, DetectionStatus, DiffType, File, Report, Run, RunHistory, SourceComponent};
use warden_core::traits::{ProductRegistry, ReportStore};
use warden_core::WardenError;

use crate::queries::{analyzer_statistics, bug_paths, files, reports, run_history, runs, source_components};
use crate::registry::SqliteProductRegistry;

pub struct SqliteReportStore {
    registry: Arc<SqliteProductRegistry>,
}

impl SqliteReportStore {
    pub fn new(registry: Arc<SqliteProductRegistry>) -> Self {
        Self { registry }
    }
}

impl ReportStore for SqliteReportStore {
    fn get_run(&self, product_id: i64, run_id: i64) -> Result<Option<Run>, WardenError> {
        let mut result = None;
        self.registry.with_reader(product_id, &mut |conn| {
            result = runs::get_run(conn, run_id)?;
            Ok(())
        })?;
        Ok(result.map(|r| r.into_run(product_id)))
    }

    fn get_runs(&self, product_id: i64, run_name_filter: &[String]) -> Result<Vec<Run>, WardenError> {
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = runs::list_runs(conn, run_name_filter)?;
            Ok(())
        })?;
        Ok(result.into_iter().map(|r| r.into_run(product_id)).collect())
    }

    fn latest_run_history(&self, product_id: i64, run_id: i64) -> Result<Option<RunHistory>, WardenError> {
        let mut result = None;
        self.registry.with_reader(product_id, &mut |conn| {
            result = run_history::latest_for_run(conn, run_id)?.map(Into::into);
            Ok(())
        })?;
        Ok(result)
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
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = reports::get_run_results(conn, run_ids, limit, offset, sort_modes, filter, cmp_data)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn get_run_result_count(
        &self,
        product_id: i64,
        run_ids: &[i64],
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<i64, WardenError> {
        let mut result = 0;
        self.registry.with_reader(product_id, &mut |conn| {
            result = reports::get_run_result_count(conn, run_ids, filter, cmp_data)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn get_report(&self, product_id: i64, report_id: i64) -> Result<Option<Report>, WardenError> {
        let mut result = None;
        self.registry.with_reader(product_id, &mut |conn| {
            result = reports::get_report(conn, report_id)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn get_bug_path(&self, product_id: i64, report_id: i64) -> Result<BugPath, WardenError> {
        let mut result = BugPath::default();
        self.registry.with_reader(product_id, &mut |conn| {
            result = bug_paths::get_bug_path(conn, report_id)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn get_file(&self, product_id: i64, file_id: i64) -> Result<Option<File>, WardenError> {
        let mut result = None;
        self.registry.with_reader(product_id, &mut |conn| {
            result = files::get_file(conn, file_id)?;
            Ok(())
        })?;
        Ok(result.map(Into::into))
    }

    fn get_counts(
        &self,
        product_id: i64,
        run_ids: &[i64],
        dimension: CountDimension,
        filter: &ReportFilter,
        cmp_data: Option<&CompareData>,
    ) -> Result<BTreeMap<String, i64>, WardenError> {
        let mut result = BTreeMap::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = reports::get_counts(conn, run_ids, dimension, filter, cmp_data)?;
            Ok(())
        })?;
        Ok(result)
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
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = reports::get_diff_results_hash(conn, run_ids, cmp_run_ids, hashes, diff_type, skip_statuses, tag_ids)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn get_analyzer_statistics(&self, product_id: i64, run_history_id: i64) -> Result<Vec<AnalyzerStatistics>, WardenError> {
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = analyzer_statistics::get_for_run_history(conn, run_history_id)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn list_source_components(&self, product_id: i64) -> Result<Vec<SourceComponent>, WardenError> {
        let mut result = Vec::new();
        self.registry.with_reader(product_id, &mut |conn| {
            result = source_components::list(conn)?;
            Ok(())
        })?;
        Ok(result)
    }

    fn upsert_source_component(&self, product_id: i64, name: &str, value: &str) -> Result<SourceComponent, WardenError> {
        let mut result = None;
        self.registry.with_writer(product_id, &mut |conn| {
            result = Some(source_components::add(conn, name, value)?);
            Ok(())
        })?;
        result.ok_or_else(|| WardenError::database("source component upsert produced no row"))
    }

    fn remove_source_component(&self, product_id: i64, name: &str) -> Result<(), WardenError> {
        self.registry.with_writer(product_id, &mut |conn| source_components::remove(conn, name))
    }
}
