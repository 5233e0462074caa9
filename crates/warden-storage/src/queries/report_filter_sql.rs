//! `QueryBuilder` — translates a `warden_core::filter::ReportFilter` /
//! `SortMode[]` / `CompareData` into a `WHERE`/`ORDER BY` clause plus bound
//! parameters. The one place in this crate with genuinely dynamic SQL —
//! every other query module hand-writes its statement.

use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use warden_core::filter::{CompareData, ReportFilter, SortDirection, SortField, SortMode};
use warden_core::model::DiffType;
use warden_core::WardenError;

use crate::sqe;

/// A fully built `WHERE ... ORDER BY ...` fragment (without the leading
/// `WHERE`/`ORDER BY` keywords) plus its positional parameters, ready to be
/// spliced into a base query.
pub struct BuiltQuery {
    pub where_clause: String,
    pub order_clause: String,
    pub params: Vec<SqlValue>,
}

/// Build the filter/sort fragment for `get_run_results` and friends.
/// `run_ids` is always folded in as the first predicate. Takes `conn`
/// because `component_names`/`component_matches_any_point` resolve named
/// glob patterns out of `source_components` before they can be spliced in
/// as `LIKE` clauses.
pub fn build(conn: &Connection, run_ids: &[i64], filter: &ReportFilter, cmp: Option<&CompareData>, sort_modes: &[SortMode]) -> Result<BuiltQuery, WardenError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();

    push_in_clause(&mut clauses, &mut params, "reports.run_id", &run_ids.iter().map(|v| SqlValue::from(*v)).collect::<Vec<_>>());

    push_text_in(&mut clauses, &mut params, "files.filepath", &filter.filepath);
    push_text_in(&mut clauses, &mut params, "reports.checker_msg", &filter.checker_msg);
    push_text_in(&mut clauses, &mut params, "reports.checker_id", &filter.checker_name);
    push_text_in(&mut clauses, &mut params, "reports.report_hash", &filter.report_hash);
    push_text_in(&mut clauses, &mut params, "reports.analyzer_name", &filter.analyzer_names);

    if !filter.severity.is_empty() {
        let values: Vec<String> = filter.severity.iter().map(|s| s.as_str().to_string()).collect();
        push_text_in(&mut clauses, &mut params, "reports.severity", &values);
    }
    if !filter.review_status.is_empty() {
        let values: Vec<String> = filter.review_status.iter().map(|s| s.as_str().to_string()).collect();
        push_text_in(&mut clauses, &mut params, "reports.review_status", &values);
    }
    if !filter.detection_status.is_empty() {
        let values: Vec<String> = filter.detection_status.iter().map(|s| s.as_str().to_string()).collect();
        push_text_in(&mut clauses, &mut params, "reports.detection_status", &values);
    }

    if let Some(range) = &filter.bug_path_length_range {
        clauses.push("reports.bug_path_length BETWEEN ? AND ?".to_string());
        params.push(SqlValue::from(range.start));
        params.push(SqlValue::from(range.end));
    }
    if let Some(range) = &filter.date_detected {
        clauses.push("reports.detected_at BETWEEN ? AND ?".to_string());
        params.push(SqlValue::from(range.start));
        params.push(SqlValue::from(range.end));
    }
    if let Some(range) = &filter.date_fixed {
        clauses.push("reports.fixed_at BETWEEN ? AND ?".to_string());
        params.push(SqlValue::from(range.start));
        params.push(SqlValue::from(range.end));
    }
    if let Some(as_of) = filter.open_reports_date {
        // A report is "open" as of a wall-clock time if it had already been
        // detected and had not yet been fixed at that instant.
        clauses.push("(reports.detected_at <= ? AND (reports.fixed_at IS NULL OR reports.fixed_at > ?))".to_string());
        params.push(SqlValue::from(as_of));
        params.push(SqlValue::from(as_of));
    }

    if !filter.run_name.is_empty() {
        let ph = placeholders(filter.run_name.len());
        clauses.push(format!("reports.run_id IN (SELECT id FROM runs WHERE name IN ({ph}))"));
        params.extend(filter.run_name.iter().map(|v| SqlValue::from(v.clone())));
    }
    if !filter.run_tag.is_empty() {
        let ph = placeholders(filter.run_tag.len());
        clauses.push(format!("reports.run_id IN (SELECT run_id FROM run_history WHERE version_tag IN ({ph}))"));
        params.extend(filter.run_tag.iter().map(|v| SqlValue::from(v.clone())));
    }
    if !filter.cleanup_plan_names.is_empty() {
        let ph = placeholders(filter.cleanup_plan_names.len());
        clauses.push(format!(
            "reports.report_hash IN (
                SELECT m.bug_hash FROM cleanup_plan_members m
                JOIN cleanup_plans p ON p.id = m.plan_id
                WHERE p.name IN ({ph})
            )"
        ));
        params.extend(filter.cleanup_plan_names.iter().map(|v| SqlValue::from(v.clone())));
    }

    if !filter.component_names.is_empty() {
        let (clause, mut comp_params) = component_clause(conn, &filter.component_names, "files.filepath")?;
        match clause {
            Some(clause) => clauses.push(clause),
            None => clauses.push("0".to_string()),
        }
        params.append(&mut comp_params);
    }

    if !filter.file_matches_any_point.is_empty() {
        let ph = placeholders(filter.file_matches_any_point.len());
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM bug_path_events bpe JOIN files f2 ON f2.id = bpe.file_id
             WHERE bpe.report_id = reports.id AND f2.filepath IN ({ph}))"
        ));
        params.extend(filter.file_matches_any_point.iter().map(|v| SqlValue::from(v.clone())));
    }
    if !filter.component_matches_any_point.is_empty() {
        let (clause, mut comp_params) = component_clause(conn, &filter.component_matches_any_point, "f2.filepath")?;
        match clause {
            Some(clause) => {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM bug_path_events bpe JOIN files f2 ON f2.id = bpe.file_id
                     WHERE bpe.report_id = reports.id AND {clause})"
                ));
                params.append(&mut comp_params);
            }
            None => clauses.push("0".to_string()),
        }
    }

    for annotation in &filter.annotations {
        // `annotations` is stored as a JSON object; look for the key with
        // any of the listed values (OR within the key).
        let ors: Vec<String> = annotation
            .values
            .iter()
            .map(|_| "json_extract(reports.annotations, ?) = ?".to_string())
            .collect();
        if !ors.is_empty() {
            clauses.push(format!("({})", ors.join(" OR ")));
            for value in &annotation.values {
                params.push(SqlValue::from(format!("$.{}", annotation.key)));
                params.push(SqlValue::from(value.clone()));
            }
        }
    }

    if let Some(cmp) = cmp {
        // `lhs` = the primary run set (`run_ids`), `rhs` = `cmp.run_ids`.
        // Each subquery below binds its own placeholders in literal order,
        // left to right, so params stay in lockstep with the SQL text.
        let as_of = cmp.open_reports_date;
        let lhs_sub = format!(
            "SELECT report_hash FROM reports WHERE run_id IN ({}){}",
            placeholders(run_ids.len()),
            as_of_suffix(as_of)
        );
        let rhs_sub = format!(
            "SELECT report_hash FROM reports WHERE run_id IN ({}){}",
            placeholders(cmp.run_ids.len()),
            as_of_suffix(as_of)
        );
        match cmp.diff_type {
            DiffType::New => {
                clauses.push(format!("reports.report_hash IN ({rhs_sub}) AND reports.report_hash NOT IN ({lhs_sub})"));
                push_cmp_params(&mut params, &cmp.run_ids, as_of);
                push_cmp_params(&mut params, run_ids, as_of);
            }
            DiffType::Resolved => {
                clauses.push(format!("reports.report_hash IN ({lhs_sub}) AND reports.report_hash NOT IN ({rhs_sub})"));
                push_cmp_params(&mut params, run_ids, as_of);
                push_cmp_params(&mut params, &cmp.run_ids, as_of);
            }
            DiffType::Unresolved => {
                clauses.push(format!("reports.report_hash IN ({lhs_sub}) AND reports.report_hash IN ({rhs_sub})"));
                push_cmp_params(&mut params, run_ids, as_of);
                push_cmp_params(&mut params, &cmp.run_ids, as_of);
            }
        }
    }

    let where_clause = if clauses.is_empty() { "1=1".to_string() } else { clauses.join(" AND ") };

    Ok(BuiltQuery {
        where_clause,
        order_clause: build_order(sort_modes),
        params,
    })
}

fn as_of_suffix(as_of: Option<i64>) -> &'static str {
    if as_of.is_some() {
        " AND detected_at <= ? AND (fixed_at IS NULL OR fixed_at > ?)"
    } else {
        ""
    }
}

fn push_cmp_params(params: &mut Vec<SqlValue>, run_ids: &[i64], as_of: Option<i64>) {
    params.extend(run_ids.iter().map(|v| SqlValue::from(*v)));
    if let Some(t) = as_of {
        params.push(SqlValue::from(t));
        params.push(SqlValue::from(t));
    }
}

/// Resolve `names` against `source_components` and build an OR'd clause
/// over `column` matching any component whose include patterns match and
/// exclude patterns don't. Returns `None` if no named component has any
/// include pattern (the filter then matches nothing).
fn component_clause(conn: &Connection, names: &[String], column: &str) -> Result<(Option<String>, Vec<SqlValue>), WardenError> {
    let ph = placeholders(names.len());
    let sql = format!("SELECT value FROM source_components WHERE name IN ({ph})");
    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let values: Vec<String> = stmt
        .query_map(rusqlite::params_from_iter(names.iter()), |row| row.get(0))
        .map_err(sqe)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqe)?;

    let mut or_clauses = Vec::new();
    let mut params = Vec::new();
    for value in &values {
        let (includes, excludes) = parse_component_patterns(value);
        if includes.is_empty() {
            continue;
        }
        let inc_clause = includes.iter().map(|_| format!("{column} LIKE ? ESCAPE '\\'")).collect::<Vec<_>>().join(" OR ");
        let mut clause = format!("({inc_clause})");
        for inc in &includes {
            params.push(SqlValue::from(glob_to_like(inc)));
        }
        for exc in &excludes {
            clause.push_str(&format!(" AND {column} NOT LIKE ? ESCAPE '\\'"));
            params.push(SqlValue::from(glob_to_like(exc)));
        }
        or_clauses.push(format!("({clause})"));
    }

    if or_clauses.is_empty() {
        return Ok((None, Vec::new()));
    }
    Ok((Some(format!("({})", or_clauses.join(" OR "))), params))
}

/// Parse a component's `{+pattern|-pattern}`-per-line value into include
/// and exclude glob pattern lists.
fn parse_component_patterns(value: &str) -> (Vec<String>, Vec<String>) {
    let mut includes = Vec::new();
    let mut excludes = Vec::new();
    for line in value.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix('+') {
            includes.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix('-') {
            excludes.push(rest.to_string());
        }
    }
    (includes, excludes)
}

/// Translate a `*`/`?` glob pattern into a SQL `LIKE` pattern, escaping any
/// literal `%`/`_`/`\` the path itself contains with backslash (paired with
/// `ESCAPE '\'` at each use site).
fn glob_to_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        match ch {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '*' => out.push('%'),
            '?' => out.push('_'),
            other => out.push(other),
        }
    }
    out
}

/// Render `ORDER BY` for a list of sort modes, always appending the
/// `report_id ASC` tiebreak.
pub fn build_order(modes: &[SortMode]) -> String {
    let mut parts: Vec<String> = modes
        .iter()
        .map(|m| {
            let col = match m.field {
                SortField::Filename => "files.filepath",
                SortField::CheckerName => "reports.checker_id",
                SortField::Severity => "reports.severity",
                SortField::ReviewStatus => "reports.review_status",
                SortField::DetectionStatus => "reports.detection_status",
                SortField::BugPathLength => "reports.bug_path_length",
                SortField::Timestamp => "reports.detected_at",
            };
            let dir = match m.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{col} {dir}")
        })
        .collect();
    parts.push("reports.id ASC".to_string());
    parts.join(", ")
}

fn push_in_clause(clauses: &mut Vec<String>, params: &mut Vec<SqlValue>, column: &str, values: &[SqlValue]) {
    if values.is_empty() {
        clauses.push("0".to_string());
        return;
    }
    clauses.push(format!("{column} IN ({})", placeholders(values.len())));
    params.extend(values.iter().cloned());
}

fn push_text_in(clauses: &mut Vec<String>, params: &mut Vec<SqlValue>, column: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    clauses.push(format!("{column} IN ({})", placeholders(values.len())));
    params.extend(values.iter().map(|v| SqlValue::from(v.clone())));
}

fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_translates_wildcards_and_escapes_literals() {
        assert_eq!(glob_to_like("src/*.c"), "src/%.c");
        assert_eq!(glob_to_like("a_b%c"), "a\\_b\\%c");
    }

    #[test]
    fn parse_component_patterns_splits_include_exclude() {
        let (inc, exc) = parse_component_patterns("+src/*\n-src/vendor/*\n");
        assert_eq!(inc, vec!["src/*".to_string()]);
        assert_eq!(exc, vec!["src/vendor/*".to_string()]);
    }
}
