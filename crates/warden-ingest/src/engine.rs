//! The `mass_store_run` transaction (spec §4.4): unpack, resolve files,
//! canonicalize, reconcile against prior state, apply review rules, update
//! counters, commit — all inside one manually-managed transaction on the
//! product's writer connection.
//!
//! This deliberately bypasses the `ContentStore`/`ReportStore` trait objects
//! (they reacquire the writer connection through `ProductRegistry::with_writer`
//! themselves, which would deadlock nested inside this function's own
//! borrow). The engine instead calls `warden_storage::queries::*` directly
//! against the one connection it holds for the whole algorithm, so every
//! step of §4.4 commits or rolls back as a single transaction.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{info, warn};
use warden_core::clock::Clock;
use warden_core::model::{DetectionStatus, DetectionStatusCounters, ReviewStatus};
use warden_core::traits::ProductRegistry;
use warden_core::{WardenConfig, WardenError};
use warden_storage::queries::{analyzer_statistics, bug_paths, contents, files, reports, review_rules, run_history, runs};

use crate::bundle::{self, Bundle, RawReport};
use crate::canon::{self, CanonReport};
use crate::locks::RunLockRegistry;
use crate::source_comments;

const COMMIT_RETRY_ATTEMPTS: u32 = 3;
const COMMIT_RETRY_BASE_DELAY_MS: u64 = 50;

/// Inputs to one `mass_store_run` call, already decoded from the RPC layer
/// (the base64 string has already become raw bytes by the time this
/// reaches the engine).
pub struct StoreRunRequest {
    pub product_id: i64,
    pub run_name: String,
    pub username: String,
    pub version_tag: Option<String>,
    pub bundle_bytes: Vec<u8>,
    /// §4.4 step 4: treat every current report of this run as a
    /// replacement candidate — one the new bundle doesn't reproduce is
    /// deleted instead of transitioning to `RESOLVED`.
    pub force: bool,
    pub trim_prefixes: Vec<String>,
    pub description: Option<String>,
}

pub struct StoreRunOutcome {
    pub run_id: i64,
    pub run_history_id: i64,
    pub counters: DetectionStatusCounters,
}

/// Cooperative cancellation means a `store_run` call can complete without
/// committing anything — callers distinguish this from a hard error.
pub enum StoreRunResult {
    Completed(StoreRunOutcome),
    Cancelled,
}

/// Run the whole ingestion algorithm against `product_id`'s writer
/// connection. `is_cancelled` is polled at the two suspension points named
/// in §4.4 ("between steps 5 and 6 and between batches in step 6").
pub fn store_run(
    registry: &dyn ProductRegistry,
    locks: &Arc<RunLockRegistry>,
    clock: &dyn Clock,
    config: &WardenConfig,
    request: StoreRunRequest,
    is_cancelled: &dyn Fn() -> bool,
) -> Result<StoreRunResult, WardenError> {
    // Step 1: lock.
    let _guard = locks.acquire(request.product_id, &request.run_name)?;

    // Step 2: validate (unpack + size check happened in decode_within_limit
    // upstream of this call; unpack() itself rejects malformed archives).
    let limit = config.effective_bundle_size_limit_bytes();
    let bundle = bundle::unpack(&request.bundle_bytes, limit)?;

    let trim_prefixes = request.trim_prefixes.clone();
    let normalize_path = move |path: &str| trim_longest_prefix(path, &trim_prefixes);

    let mut outcome: Option<StoreRunOutcome> = None;
    let mut cancelled = false;

    registry.with_writer(request.product_id, &mut |conn| {
        conn.execute_batch("BEGIN IMMEDIATE;").map_err(|e| WardenError::database(e.to_string()))?;

        match run_transaction(conn, clock, &request, &bundle, &normalize_path, is_cancelled) {
            Ok(TransactionOutcome::Completed(o)) => {
                commit_with_retry(conn)?;
                outcome = Some(o);
                Ok(())
            }
            Ok(TransactionOutcome::Cancelled) => {
                let _ = conn.execute_batch("ROLLBACK;");
                warn!(product_id = request.product_id, run = %request.run_name, "mass_store_run cancelled");
                cancelled = true;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK;");
                warn!(product_id = request.product_id, run = %request.run_name, error = %e, "mass_store_run failed, rolled back");
                Err(e)
            }
        }
    })?;

    if cancelled {
        return Ok(StoreRunResult::Cancelled);
    }
    let outcome = outcome.expect("outcome set on every non-cancelled success path");
    info!(
        product_id = request.product_id,
        run = %request.run_name,
        run_history_id = outcome.run_history_id,
        new = outcome.counters.new,
        resolved = outcome.counters.resolved,
        "mass_store_run committed"
    );
    Ok(StoreRunResult::Completed(outcome))
}

enum TransactionOutcome {
    Completed(StoreRunOutcome),
    Cancelled,
}

fn run_transaction<F>(
    conn: &Connection,
    clock: &dyn Clock,
    request: &StoreRunRequest,
    bundle: &Bundle,
    normalize_path: &F,
    is_cancelled: &dyn Fn() -> bool,
) -> Result<TransactionOutcome, WardenError>
where
    F: Fn(&str) -> String,
{
    let now = clock.now();

    // Step 4: create or update Run and a new RunHistory row.
    let run = runs::get_or_create_run(conn, &request.run_name, now)?;
    let run_history_id = run_history::insert_run_history(
        conn,
        run.id,
        request.version_tag.as_deref(),
        now,
        &request.username,
        bundle.metadata.cc_client_version.as_deref(),
        bundle.metadata.description.as_deref().or(request.description.as_deref()),
    )?;

    for stat in &bundle.statistics {
        analyzer_statistics::insert(
            conn,
            &warden_core::model::AnalyzerStatistics {
                run_history_id,
                analyzer_type: stat.analyzer_type.clone(),
                version: stat.version.clone(),
                successful: stat.successful,
                failed_file_paths: stat.failed_file_paths.clone(),
            },
        )?;
    }

    // Step 3 + 5: resolve referenced source files and canonicalize each
    // report. File resolution is interleaved with canonicalization since
    // the warning-line text (needed for the report hash) comes from the
    // resolved file's content.
    let mut file_ids: HashMap<String, i64> = HashMap::new();
    let mut canon_reports: Vec<CanonReport> = Vec::with_capacity(bundle.reports.len());

    for raw in &bundle.reports {
        let warning_line = resolve_warning_line(conn, run.id, raw, normalize_path, bundle)?;
        let canon = canon::canonicalize(raw, warning_line.as_deref(), normalize_path)?;
        for path in std::iter::once(canon.file_path.clone()).chain(canon.bug_path.iter().map(|e| e.file_path.clone())) {
            resolve_file_id(conn, run.id, &path, bundle, &mut file_ids)?;
        }
        canon_reports.push(canon);
    }

    if is_cancelled() {
        return Ok(TransactionOutcome::Cancelled);
    }

    // Group by report_hash: a bundle may legitimately carry more than one
    // raw finding that canonicalizes to the same hash (duplicate analyzer
    // output); the first one observed wins the stored row, matching the
    // "lowest id represents the hash" rule used elsewhere for uniqueness.
    let mut grouped: HashMap<String, CanonReport> = HashMap::new();
    for canon in canon_reports {
        grouped.entry(canon.report_hash.clone()).or_insert(canon);
    }

    // Step 6: reconcile against prior state.
    let prev = reports::list_for_run(conn, run.id)?;
    let prev_by_hash: HashMap<String, &warden_core::model::Report> = prev.iter().map(|r| (r.report_hash.clone(), r)).collect();

    let disabled_checkers: HashSet<&str> = bundle.metadata.disabled_checkers.iter().map(String::as_str).collect();
    let active_analyzers: HashSet<&str> = bundle.metadata.analyzers.iter().map(String::as_str).collect();

    let mut counters = DetectionStatusCounters::default();
    let mut new_report_ids: Vec<(i64, String)> = Vec::new();

    for (hash, canon) in &grouped {
        if is_cancelled() {
            return Ok(TransactionOutcome::Cancelled);
        }

        let file_id = *file_ids
            .get(&canon.file_path)
            .ok_or_else(|| WardenError::database(format!("unresolved file id for {}", canon.file_path)))?;

        let prior = prev_by_hash.get(hash);
        let status = detection_status_for(prior.map(|p| p.detection_status), &canon.analyzer_name, &canon.checker_id, &active_analyzers, &disabled_checkers);
        tally(&mut counters, status);

        let report_id = match prior {
            Some(p) => {
                reports::update_for_reingestion(conn, p.id, file_id, canon.line, canon.column, &canon.checker_msg, canon.severity, canon.bug_path_length(), status)?;
                bug_paths::delete_path(conn, p.id)?;
                p.id
            }
            None => reports::insert_report(
                conn,
                &reports::NewReport {
                    run_id: run.id,
                    file_id,
                    line: canon.line,
                    column: canon.column,
                    checker_id: canon.checker_id.clone(),
                    analyzer_name: canon.analyzer_name.clone(),
                    checker_msg: canon.checker_msg.clone(),
                    severity: canon.severity,
                    report_hash: hash.clone(),
                    bug_path_length: canon.bug_path_length(),
                    detected_at: now,
                    detection_status: status,
                },
            )?,
        };

        for (seq, event) in canon.bug_path.iter().enumerate() {
            let event_file_id = *file_ids
                .get(&event.file_path)
                .ok_or_else(|| WardenError::database(format!("unresolved file id for {}", event.file_path)))?;
            let position = warden_core::model::BugPathPosition {
                start_line: event.start_line,
                start_col: event.start_col,
                end_line: event.end_line,
                end_col: event.end_col,
                file_id: event_file_id,
            };
            match event.tag.extended_data_kind() {
                Some(kind) => bug_paths::insert_extended_data(conn, report_id, seq as i64, &position, &event.msg, kind)?,
                None => bug_paths::insert_event(conn, report_id, seq as i64, &position, &event.msg)?,
            }
        }

        new_report_ids.push((report_id, hash.clone()));
    }

    // Reports present before this ingestion but absent from the new set:
    // ordinarily they transition to RESOLVED, unless their checker is
    // explicitly disabled or their analyzer didn't run this time (§4.4
    // step 6, last two rules take precedence over the generic
    // "vanished → resolved" one). Under `force` (step 4: "mark existing
    // Reports for the Run as candidates for replacement"), every current
    // report was a replacement candidate; one reproduced by the new
    // bundle was updated in place above, and one that wasn't is deleted
    // outright rather than preserved as a RESOLVED history row.
    for prior in &prev {
        if grouped.contains_key(&prior.report_hash) {
            continue;
        }
        if request.force {
            reports::delete_report(conn, prior.id)?;
            continue;
        }
        if prior.detection_status == DetectionStatus::Resolved {
            counters.resolved += 1;
            continue;
        }
        let vanished_status = if !active_analyzers.is_empty() && !active_analyzers.contains(prior.analyzer_name.as_str()) {
            DetectionStatus::Unavailable
        } else if disabled_checkers.contains(prior.checker_id.as_str()) {
            DetectionStatus::Off
        } else {
            DetectionStatus::Resolved
        };
        let fixed_at = (vanished_status == DetectionStatus::Resolved).then_some(now);
        reports::set_detection_status(conn, prior.id, vanished_status, fixed_at)?;
        tally(&mut counters, vanished_status);
    }

    // Step 7: apply ReviewStatusRules, unless an in-source comment wins.
    for (report_id, hash) in &new_report_ids {
        let canon = &grouped[hash];
        let in_source = match resolve_source_comment(conn, run.id, canon, bundle, normalize_path) {
            Some(result) => result?,
            None => None,
        };

        if let Some((status, _message)) = in_source {
            reports::set_review_status(conn, *report_id, status, true)?;
            continue;
        }
        if let Some(rule) = review_rules::get_by_hash(conn, hash)? {
            reports::set_review_status(conn, *report_id, rule.status, false)?;
        }
    }

    // Step 8: update counters and tag (version_tag already attached when
    // the RunHistory row was inserted).
    run_history::update_counters(conn, run_history_id, &counters)?;

    Ok(TransactionOutcome::Completed(StoreRunOutcome {
        run_id: run.id,
        run_history_id,
        counters,
    }))
}

fn tally(counters: &mut DetectionStatusCounters, status: DetectionStatus) {
    match status {
        DetectionStatus::New => counters.new += 1,
        DetectionStatus::Resolved => counters.resolved += 1,
        DetectionStatus::Unresolved => counters.unresolved += 1,
        DetectionStatus::Reopened => counters.reopened += 1,
        DetectionStatus::Off => counters.off += 1,
        DetectionStatus::Unavailable => counters.unavailable += 1,
    }
}

/// The transition rules of §4.4 step 6, evaluated for one `report_hash`.
fn detection_status_for(
    prior: Option<DetectionStatus>,
    analyzer_name: &str,
    checker_id: &str,
    active_analyzers: &HashSet<&str>,
    disabled_checkers: &HashSet<&str>,
) -> DetectionStatus {
    if !active_analyzers.is_empty() && !active_analyzers.contains(analyzer_name) {
        return DetectionStatus::Unavailable;
    }
    if disabled_checkers.contains(checker_id) {
        return DetectionStatus::Off;
    }
    match prior {
        None => DetectionStatus::New,
        Some(DetectionStatus::Resolved) => DetectionStatus::Reopened,
        Some(DetectionStatus::New | DetectionStatus::Unresolved | DetectionStatus::Reopened | DetectionStatus::Off | DetectionStatus::Unavailable) => {
            DetectionStatus::Unresolved
        }
    }
}

/// Resolve `path`'s `file_id` within `run_id`, inserting a new `files` row
/// the first time this ingestion sees the path. Content resolution (step
/// 3): a path shipped inline in the bundle's `root/` tree is hashed and
/// stored directly; a path not shipped inline falls back to the most
/// recent `files` row for the same path within this run (the bundle
/// format carries no separate per-path hash manifest to check against, so
/// "already present" is read as "this run already has content for that
/// path"), failing `MISSING_FILE` when neither source has it.
fn resolve_file_id(conn: &Connection, run_id: i64, path: &str, bundle: &Bundle, file_ids: &mut HashMap<String, i64>) -> Result<(), WardenError> {
    if file_ids.contains_key(path) {
        return Ok(());
    }

    let inline_key = bundle
        .sources
        .keys()
        .find(|k| k.as_str() == path || k.as_str() == path.trim_start_matches('/'));

    let content_hash = if let Some(key) = inline_key {
        let bytes = &bundle.sources[key];
        let hash = warden_core::hashing::sha256_hex(bytes);
        contents::put_content(conn, &hash, bytes, None)?;
        hash
    } else if let Some(existing) = files::get_file_by_path(conn, run_id, path)? {
        existing.content_hash
    } else {
        return Err(WardenError::missing_file(path));
    };

    let file_id = match files::get_file_by_path(conn, run_id, path)? {
        Some(existing) if existing.content_hash == content_hash => existing.id,
        _ => files::insert_file(conn, run_id, path, &content_hash)?,
    };
    file_ids.insert(path.to_string(), file_id);
    Ok(())
}

/// Find the trimmed text of `raw`'s own warning line, from whichever
/// source the bundle shipped it in, for folding into the report hash.
fn resolve_warning_line<F>(_conn: &Connection, _run_id: i64, raw: &RawReport, normalize_path: &F, bundle: &Bundle) -> Result<Option<String>, WardenError>
where
    F: Fn(&str) -> String,
{
    let normalized = normalize_path(&raw.file);
    let key = bundle
        .sources
        .keys()
        .find(|k| k.as_str() == raw.file || k.as_str() == normalized || k.as_str() == raw.file.trim_start_matches('/'));
    let Some(key) = key else { return Ok(None) };
    let bytes = &bundle.sources[key];
    let text = String::from_utf8_lossy(bytes);
    Ok(canon::trimmed_source_line(&text, raw.line))
}

/// Look for a `warden:` marker on a canonicalized report's warning line,
/// via the same inline-source lookup `resolve_warning_line` uses.
fn resolve_source_comment<F>(
    _conn: &Connection,
    _run_id: i64,
    canon: &CanonReport,
    bundle: &Bundle,
    _normalize_path: &F,
) -> Option<Result<Option<(ReviewStatus, Option<String>)>, WardenError>>
where
    F: Fn(&str) -> String,
{
    let key = bundle.sources.keys().find(|k| k.as_str() == canon.file_path || k.as_str() == canon.file_path.trim_start_matches('/'))?;
    let bytes = &bundle.sources[key];
    let text = String::from_utf8_lossy(bytes);
    let line = canon::trimmed_source_line(&text, canon.line)?;
    Some(source_comments::parse_review_comment(&canon.file_path, &line))
}

/// Apply `trim_prefixes`: the longest matching prefix is stripped.
fn trim_longest_prefix(path: &str, prefixes: &[String]) -> String {
    let best = prefixes.iter().filter(|p| path.starts_with(p.as_str())).max_by_key(|p| p.len());
    match best {
        Some(p) => path[p.len()..].trim_start_matches('/').to_string(),
        None => path.to_string(),
    }
}

/// Retry the commit step alone, per §7: transient DB failures get bounded
/// exponential backoff; everything else propagates (and the caller rolls
/// back). Manual SQL rather than `rusqlite::Transaction` because the
/// latter consumes itself on a failed commit and can't be retried in
/// place.
fn commit_with_retry(conn: &Connection) -> Result<(), WardenError> {
    let mut delay = COMMIT_RETRY_BASE_DELAY_MS;
    for attempt in 1..=COMMIT_RETRY_ATTEMPTS {
        match conn.execute_batch("COMMIT;") {
            Ok(()) => return Ok(()),
            Err(e) if attempt < COMMIT_RETRY_ATTEMPTS && is_transient(&e) => {
                warn!(attempt, delay_ms = delay, error = %e, "transient commit failure, retrying");
                thread::sleep(Duration::from_millis(delay));
                delay *= 2;
            }
            Err(e) => return Err(WardenError::database(e.to_string())),
        }
    }
    unreachable!("loop always returns or errors by the last attempt")
}

fn is_transient(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if matches!(err.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_longest_prefix_strips_longest_match() {
        let prefixes = vec!["/src".to_string(), "/src/app".to_string()];
        assert_eq!(trim_longest_prefix("/src/app/main.c", &prefixes), "main.c");
    }

    #[test]
    fn trim_longest_prefix_is_noop_without_match() {
        let prefixes = vec!["/other".to_string()];
        assert_eq!(trim_longest_prefix("/src/main.c", &prefixes), "/src/main.c");
    }

    #[test]
    fn reconciliation_transitions_match_spec_table() {
        let active = HashSet::from(["clangsa"]);
        let disabled = HashSet::new();
        assert_eq!(detection_status_for(None, "clangsa", "core.X", &active, &disabled), DetectionStatus::New);
        assert_eq!(
            detection_status_for(Some(DetectionStatus::Unresolved), "clangsa", "core.X", &active, &disabled),
            DetectionStatus::Unresolved
        );
        assert_eq!(
            detection_status_for(Some(DetectionStatus::Resolved), "clangsa", "core.X", &active, &disabled),
            DetectionStatus::Reopened
        );
        assert_eq!(
            detection_status_for(Some(DetectionStatus::New), "other", "core.X", &active, &disabled),
            DetectionStatus::Unavailable
        );
        let disabled_checker = HashSet::from(["core.X"]);
        assert_eq!(
            detection_status_for(Some(DetectionStatus::Unresolved), "clangsa", "core.X", &active, &disabled_checker),
            DetectionStatus::Off
        );
    }
}

/// End-to-end `store_run` tests exercising the full transaction against a
/// real (tempfile-backed) SQLite database — the engine never talks to a
/// trait object, so these are the only tests that drive it as a whole.
#[cfg(test)]
mod store_run_tests {
    use std::io::Write;

    use warden_core::clock::FixedClock;
    use warden_core::model::{DetectionStatus, Product, ReviewStatus};
    use warden_storage::queries::reports;
    use warden_storage::SqliteProductRegistry;

    use super::*;

    struct TestEnv {
        registry: Arc<SqliteProductRegistry>,
        locks: Arc<RunLockRegistry>,
        clock: Arc<FixedClock>,
        config: WardenConfig,
        product_id: i64,
        _dir: tempfile::TempDir,
    }

    fn test_env() -> TestEnv {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SqliteProductRegistry::new(4));
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
        TestEnv {
            registry,
            locks: Arc::new(RunLockRegistry::new()),
            clock: Arc::new(FixedClock::new(1_000)),
            config: WardenConfig::default(),
            product_id: product.id,
            _dir: dir,
        }
    }

    fn never_cancelled() -> bool {
        false
    }

    /// One finding to place under `reports/` in a test bundle.
    struct FindingSpec {
        checker: &'static str,
        file: &'static str,
        line: i64,
        message: &'static str,
    }

    fn finding(checker: &'static str, file: &'static str, line: i64, message: &'static str) -> FindingSpec {
        FindingSpec { checker, file, line, message }
    }

    /// Build an in-memory zip archive shaped like spec §6: one top-level
    /// directory, a `reports/` tree of JSON findings and a `root/` tree of
    /// source text, so each finding's warning line folds into its hash.
    fn build_bundle(findings: &[FindingSpec], sources: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut zip = zip::ZipWriter::new(cursor);
            let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

            for (i, f) in findings.iter().enumerate() {
                let json = serde_json::json!({
                    "file": f.file,
                    "line": f.line,
                    "column": 1,
                    "checker_name": f.checker,
                    "analyzer_name": "clangsa",
                    "message": f.message,
                    "path": [],
                });
                zip.start_file(format!("bundle/reports/{i}.json"), options).unwrap();
                zip.write_all(json.to_string().as_bytes()).unwrap();
            }
            for (path, content) in sources {
                zip.start_file(format!("bundle/root/{path}"), options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    fn request(env: &TestEnv, run_name: &str, findings: &[FindingSpec], sources: &[(&str, &str)], force: bool) -> StoreRunRequest {
        StoreRunRequest {
            product_id: env.product_id,
            run_name: run_name.to_string(),
            username: "alice".to_string(),
            version_tag: None,
            bundle_bytes: build_bundle(findings, sources),
            force,
            trim_prefixes: vec![],
            description: None,
        }
    }

    fn statuses_by_checker(env: &TestEnv, run_id: i64) -> HashMap<String, DetectionStatus> {
        let mut out = HashMap::new();
        env.registry
            .with_reader(env.product_id, &mut |conn| {
                for r in reports::list_for_run(conn, run_id)? {
                    out.insert(r.checker_id.clone(), r.detection_status);
                }
                Ok(())
            })
            .unwrap();
        out
    }

    /// S1: a fresh run's first ingestion reports everything as NEW.
    #[test]
    fn s1_fresh_run_reports_everything_new() {
        let env = test_env();
        let findings = [
            finding("core.A", "a.c", 1, "bug a"),
            finding("core.B", "a.c", 2, "bug b"),
            finding("core.C", "a.c", 3, "bug c"),
        ];
        let sources = [("a.c", "one\ntwo\nthree\n")];
        let req = request(&env, "R", &findings, &sources, false);

        let outcome = match store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, req, &never_cancelled).unwrap() {
            StoreRunResult::Completed(o) => o,
            StoreRunResult::Cancelled => panic!("unexpected cancellation"),
        };
        assert_eq!(outcome.counters.new, 3);
        let statuses = statuses_by_checker(&env, outcome.run_id);
        assert_eq!(statuses.len(), 3);
        assert!(statuses.values().all(|s| *s == DetectionStatus::New));
    }

    /// S2 / P2: a second ingestion against the same run reconciles against
    /// the first per the §4.4 step 6 transition table; a vanished report's
    /// `fixed_at` lands at the second ingestion's commit time.
    #[test]
    fn s2_second_ingestion_reconciles_against_the_first() {
        let env = test_env();
        let sources = [("a.c", "one\ntwo\nthree\nfour\n")];
        let first = request(
            &env,
            "R",
            &[finding("core.A", "a.c", 1, "bug a"), finding("core.B", "a.c", 2, "bug b"), finding("core.C", "a.c", 3, "bug c")],
            &sources,
            false,
        );
        match store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, first, &never_cancelled).unwrap() {
            StoreRunResult::Completed(_) => {}
            StoreRunResult::Cancelled => panic!("unexpected cancellation"),
        }

        let env_clock_later = FixedClock::new(2_000);
        let second = request(
            &env,
            "R",
            &[finding("core.A", "a.c", 1, "bug a"), finding("core.B", "a.c", 2, "bug b"), finding("core.D", "a.c", 4, "bug d")],
            &sources,
            false,
        );
        let outcome = match store_run(env.registry.as_ref(), &env.locks, &env_clock_later, &env.config, second, &never_cancelled).unwrap() {
            StoreRunResult::Completed(o) => o,
            StoreRunResult::Cancelled => panic!("unexpected cancellation"),
        };

        assert_eq!(outcome.counters.new, 1, "core.D is new");
        assert_eq!(outcome.counters.unresolved, 2, "core.A and core.B persist");
        assert_eq!(outcome.counters.resolved, 1, "core.C vanished");

        let mut by_checker: HashMap<String, warden_core::model::Report> = HashMap::new();
        env.registry
            .with_reader(env.product_id, &mut |conn| {
                for r in reports::list_for_run(conn, outcome.run_id)? {
                    by_checker.insert(r.checker_id.clone(), r);
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(by_checker["core.A"].detection_status, DetectionStatus::Unresolved);
        assert_eq!(by_checker["core.B"].detection_status, DetectionStatus::Unresolved);
        assert_eq!(by_checker["core.C"].detection_status, DetectionStatus::Resolved);
        assert_eq!(by_checker["core.C"].fixed_at, Some(2_000));
        assert_eq!(by_checker["core.D"].detection_status, DetectionStatus::New);
    }

    /// P8: diff duality — every report in the later snapshot is either NEW
    /// or UNRESOLVED relative to the earlier one, and every report in the
    /// earlier snapshot is either RESOLVED or UNRESOLVED relative to the
    /// later one (counted by unique hash, which `report_hash` already is
    /// here since every finding canonicalizes to a distinct checker/line).
    #[test]
    fn p8_new_plus_unresolved_and_resolved_plus_unresolved_match_snapshot_sizes() {
        let env = test_env();
        let sources = [("a.c", "one\ntwo\nthree\nfour\n")];
        let first = request(
            &env,
            "R",
            &[finding("core.A", "a.c", 1, "bug a"), finding("core.B", "a.c", 2, "bug b"), finding("core.C", "a.c", 3, "bug c")],
            &sources,
            false,
        );
        store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, first, &never_cancelled).unwrap();

        let second = request(
            &env,
            "R",
            &[finding("core.A", "a.c", 1, "bug a"), finding("core.B", "a.c", 2, "bug b"), finding("core.D", "a.c", 4, "bug d")],
            &sources,
            false,
        );
        let outcome = match store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, second, &never_cancelled).unwrap() {
            StoreRunResult::Completed(o) => o,
            StoreRunResult::Cancelled => panic!("unexpected cancellation"),
        };

        let left_size = 3; // {A, B, C}
        let right_size = 3; // {A, B, D}
        assert_eq!(outcome.counters.new + outcome.counters.unresolved, right_size);
        assert_eq!(outcome.counters.resolved + outcome.counters.unresolved, left_size);
    }

    /// `force`: a report the new bundle doesn't reproduce is deleted
    /// outright rather than carried forward as RESOLVED (§4.4 step 4).
    #[test]
    fn force_deletes_unreproduced_reports_instead_of_resolving_them() {
        let env = test_env();
        let sources = [("a.c", "one\ntwo\nthree\n")];
        let first = request(
            &env,
            "R",
            &[finding("core.A", "a.c", 1, "bug a"), finding("core.B", "a.c", 2, "bug b")],
            &sources,
            false,
        );
        store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, first, &never_cancelled).unwrap();

        let second = request(&env, "R", &[finding("core.A", "a.c", 1, "bug a")], &sources, true);
        let outcome = match store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, second, &never_cancelled).unwrap() {
            StoreRunResult::Completed(o) => o,
            StoreRunResult::Cancelled => panic!("unexpected cancellation"),
        };

        let statuses = statuses_by_checker(&env, outcome.run_id);
        assert_eq!(statuses.len(), 1, "core.B was deleted, not resolved, under force");
        assert!(statuses.contains_key("core.A"));
        assert_eq!(outcome.counters.resolved, 0);
    }

    /// P4: a bundle referencing a source file never shipped inline and not
    /// already present for the run fails `MISSING_FILE`, and the run's
    /// prior state is left byte-for-byte unchanged.
    #[test]
    fn p4_failed_ingestion_leaves_prior_state_unchanged() {
        let env = test_env();
        let sources = [("a.c", "one\ntwo\nthree\n")];
        let first = request(&env, "R", &[finding("core.A", "a.c", 1, "bug a")], &sources, false);
        let run_id = match store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, first, &never_cancelled).unwrap() {
            StoreRunResult::Completed(o) => o.run_id,
            StoreRunResult::Cancelled => panic!("unexpected cancellation"),
        };
        let before = statuses_by_checker(&env, run_id);

        // Second bundle references b.c, which is shipped in no source tree
        // and was never part of this run before.
        let bad = request(&env, "R", &[finding("core.B", "b.c", 1, "bug b")], &[], false);
        let err = match store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, bad, &never_cancelled) {
            Ok(_) => panic!("expected MISSING_FILE"),
            Err(e) => e,
        };
        assert!(matches!(err, WardenError::MissingFile { .. }));

        let after = statuses_by_checker(&env, run_id);
        assert_eq!(before, after);
    }

    /// P5: two `store_run` calls racing for the same `(product, run_name)`
    /// never both commit — the loser observes `ALREADY_RUNNING`, and the
    /// surviving run holds exactly one ingestion's worth of reports.
    #[test]
    fn p5_concurrent_mass_store_run_is_mutually_exclusive() {
        let env = test_env();
        let sources = [("a.c", "one\ntwo\nthree\n")];
        let req_a = request(&env, "R", &[finding("core.A", "a.c", 1, "bug a")], &sources, false);
        let req_b = request(&env, "R", &[finding("core.B", "a.c", 2, "bug b")], &sources, false);

        let barrier = std::sync::Barrier::new(2);
        let results: (Result<StoreRunResult, WardenError>, Result<StoreRunResult, WardenError>) = std::thread::scope(|s| {
            let a = s.spawn(|| {
                barrier.wait();
                store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, req_a, &never_cancelled)
            });
            let b = s.spawn(|| {
                barrier.wait();
                store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, req_b, &never_cancelled)
            });
            (a.join().unwrap(), b.join().unwrap())
        });

        let outcomes = [results.0, results.1];
        let ok_count = outcomes.iter().filter(|r| r.is_ok()).count();
        let already_running = outcomes
            .iter()
            .filter(|r| matches!(r, Err(WardenError::AlreadyRunning { .. })))
            .count();
        assert_eq!(ok_count, 1, "exactly one ingestion should win the lock");
        assert_eq!(already_running, 1, "the other should fail fast");

        let mut run_id = 0;
        env.registry
            .with_reader(env.product_id, &mut |conn| {
                run_id = warden_storage::queries::runs::get_or_create_run(conn, "R", 1_000)?.id;
                Ok(())
            })
            .unwrap();
        let statuses = statuses_by_checker(&env, run_id);
        assert_eq!(statuses.len(), 1, "only the winning ingestion's report should be committed");
    }

    /// P6 companion, checked here at the ingestion boundary rather than
    /// through `TriageManager`: a standing `ReviewStatusRule` is applied to
    /// every newly inserted report sharing that hash, per §4.4 step 7,
    /// unless an in-source comment wins.
    #[test]
    fn review_status_rule_is_applied_to_newly_ingested_reports() {
        let env = test_env();
        let sources = [("a.c", "one\ntwo\nthree\n")];

        // First ingestion establishes the report and its hash.
        let first = request(&env, "R", &[finding("core.A", "a.c", 1, "bug a")], &sources, false);
        let hash = match store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, first, &never_cancelled).unwrap() {
            StoreRunResult::Completed(o) => {
                let mut hash = String::new();
                env.registry
                    .with_reader(env.product_id, &mut |conn| {
                        hash = reports::list_for_run(conn, o.run_id)?.remove(0).report_hash;
                        Ok(())
                    })
                    .unwrap();
                hash
            }
            StoreRunResult::Cancelled => panic!("unexpected cancellation"),
        };

        env.registry
            .with_writer(env.product_id, &mut |conn| {
                warden_storage::queries::review_rules::upsert(conn, &hash, ReviewStatus::FalsePositive, Some("known noise"), "alice", 1_000)?;
                Ok(())
            })
            .unwrap();

        // Re-ingesting a second, distinct finding should not disturb the
        // already-reviewed report, but a fresh hash-matching re-detection
        // (same checker/file/line/message) picks up the stored rule.
        let second = request(&env, "R2", &[finding("core.A", "a.c", 1, "bug a")], &sources, false);
        match store_run(env.registry.as_ref(), &env.locks, env.clock.as_ref(), &env.config, second, &never_cancelled).unwrap() {
            StoreRunResult::Completed(o) => {
                let mut report = None;
                env.registry
                    .with_reader(env.product_id, &mut |conn| {
                        report = reports::list_for_run(conn, o.run_id)?.into_iter().next();
                        Ok(())
                    })
                    .unwrap();
                assert_eq!(report.unwrap().review_status, ReviewStatus::FalsePositive);
            }
            StoreRunResult::Cancelled => panic!("unexpected cancellation"),
        }
    }
}
