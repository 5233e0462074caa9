//! `bug_path_events` / `extended_report_data` tables: the ordered path
//! attached to a report.

use rusqlite::{params, Connection};
use warden_core::model::{BugPath, BugPathEvent, BugPathPosition, ExtendedDataKind, ExtendedReportData};
use warden_core::WardenError;

use crate::sqe;

pub fn insert_event(conn: &Connection, report_id: i64, seq: i64, position: &BugPathPosition, msg: &str) -> Result<(), WardenError> {
    conn.execute(
        "INSERT INTO bug_path_events (report_id, seq, start_line, start_col, end_line, end_col, file_id, msg)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            report_id,
            seq,
            position.start_line,
            position.start_col,
            position.end_line,
            position.end_col,
            position.file_id,
            msg,
        ],
    )
    .map_err(sqe)?;
    Ok(())
}

pub fn insert_extended_data(
    conn: &Connection,
    report_id: i64,
    seq: i64,
    position: &BugPathPosition,
    msg: &str,
    kind: ExtendedDataKind,
) -> Result<(), WardenError> {
    conn.execute(
        "INSERT INTO extended_report_data (report_id, seq, start_line, start_col, end_line, end_col, file_id, msg, kind)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            report_id,
            seq,
            position.start_line,
            position.start_col,
            position.end_line,
            position.end_col,
            position.file_id,
            msg,
            kind.as_str(),
        ],
    )
    .map_err(sqe)?;
    Ok(())
}

/// Clear a report's path events and extended data before re-inserting a
/// fresh sequence — used when an existing report row is re-ingested
/// (§4.4 step 6) rather than replaced wholesale.
pub fn delete_path(conn: &Connection, report_id: i64) -> Result<(), WardenError> {
    conn.execute("DELETE FROM bug_path_events WHERE report_id = ?1", params![report_id])
        .map_err(sqe)?;
    conn.execute("DELETE FROM extended_report_data WHERE report_id = ?1", params![report_id])
        .map_err(sqe)?;
    Ok(())
}

pub fn get_bug_path(conn: &Connection, report_id: i64) -> Result<BugPath, WardenError> {
    let mut events_stmt = conn
        .prepare_cached(
            "SELECT start_line, start_col, end_line, end_col, file_id, msg
             FROM bug_path_events WHERE report_id = ?1 ORDER BY seq",
        )
        .map_err(sqe)?;
    let events = events_stmt
        .query_map(params![report_id], |row| {
            Ok(BugPathEvent {
                position: BugPathPosition {
                    start_line: row.get(0)?,
                    start_col: row.get(1)?,
                    end_line: row.get(2)?,
                    end_col: row.get(3)?,
                    file_id: row.get(4)?,
                },
                msg: row.get(5)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqe)?;

    let mut ext_stmt = conn
        .prepare_cached(
            "SELECT start_line, start_col, end_line, end_col, file_id, msg, kind
             FROM extended_report_data WHERE report_id = ?1 ORDER BY seq",
        )
        .map_err(sqe)?;
    let extended_data = ext_stmt
        .query_map(params![report_id], |row| {
            let kind: String = row.get(6)?;
            Ok(ExtendedReportData {
                position: BugPathPosition {
                    start_line: row.get(0)?,
                    start_col: row.get(1)?,
                    end_line: row.get(2)?,
                    end_col: row.get(3)?,
                    file_id: row.get(4)?,
                },
                msg: row.get(5)?,
                kind: parse_kind(&kind),
            })
        })
        .map_err(sqe)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqe)?;

    Ok(BugPath { events, extended_data })
}

fn parse_kind(s: &str) -> ExtendedDataKind {
    match s {
        "NOTE" => ExtendedDataKind::Note,
        "MACRO" => ExtendedDataKind::Macro,
        _ => ExtendedDataKind::Fixit,
    }
}
