//! `analyzer_statistics` table: per-analyzer counters from a bundle's
//! optional `statistics/` tree.

use rusqlite::{params, Connection};
use warden_core::model::AnalyzerStatistics;
use warden_core::WardenError;

use crate::sqe;

pub fn insert(conn: &Connection, stats: &AnalyzerStatistics) -> Result<(), WardenError> {
    let failed_json = serde_json::to_string(&stats.failed_file_paths).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO analyzer_statistics (run_history_id, analyzer_type, version, successful, failed_file_paths)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(run_history_id, analyzer_type) DO UPDATE SET
            version = excluded.version, successful = excluded.successful,
            failed_file_paths = excluded.failed_file_paths",
        params![stats.run_history_id, stats.analyzer_type, stats.version, stats.successful, failed_json],
    )
    .map_err(sqe)?;
    Ok(())
}

pub fn get_for_run_history(conn: &Connection, run_history_id: i64) -> Result<Vec<AnalyzerStatistics>, WardenError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT run_history_id, analyzer_type, version, successful, failed_file_paths
             FROM analyzer_statistics WHERE run_history_id = ?1 ORDER BY analyzer_type",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map(params![run_history_id], |row| {
            let failed_json: String = row.get(4)?;
            Ok(AnalyzerStatistics {
                run_history_id: row.get(0)?,
                analyzer_type: row.get(1)?,
                version: row.get(2)?,
                successful: row.get(3)?,
                failed_file_paths: serde_json::from_str(&failed_json).unwrap_or_default(),
            })
        })
        .map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)?);
    }
    Ok(out)
}
