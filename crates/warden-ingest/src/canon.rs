//! Report canonicalizer (spec §4.3): turns one raw bundle finding into a
//! stable report hash plus a canonical, tagged bug path.

use warden_core::hashing::{sha256_hex_normalized, normalize_whitespace};
use warden_core::model::{ExtendedDataKind, Severity};
use warden_core::WardenError;

use crate::bundle::{RawBugPathEvent, RawEventKind, RawReport};

/// Tag attached to one path event once canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTag {
    Plain,
    Fixit,
    Note,
    Macro,
}

/// One canonicalized bug-path step, still keyed by file *path* — the
/// engine resolves paths to `file_id`s inside the ingestion transaction.
#[derive(Debug, Clone)]
pub struct CanonEvent {
    pub file_path: String,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub msg: String,
    pub tag: EventTag,
}

/// A raw finding reduced to its canonical identity and path.
#[derive(Debug, Clone)]
pub struct CanonReport {
    pub file_path: String,
    pub line: i64,
    pub column: i64,
    pub checker_id: String,
    pub analyzer_name: String,
    pub checker_msg: String,
    pub severity: Severity,
    pub report_hash: String,
    /// Ordered, with empty spans already dropped.
    pub bug_path: Vec<CanonEvent>,
}

impl CanonReport {
    pub fn bug_path_length(&self) -> i64 {
        self.bug_path.len() as i64
    }
}

const FIXIT_SUFFIX: &str = "(fixit)";

fn tag_for(ev: &RawBugPathEvent) -> EventTag {
    if ev.message.trim_end().ends_with(FIXIT_SUFFIX) {
        return EventTag::Fixit;
    }
    match ev.kind {
        RawEventKind::Note => EventTag::Note,
        RawEventKind::MacroExpansion => EventTag::Macro,
        RawEventKind::Event => EventTag::Plain,
    }
}

impl EventTag {
    pub fn extended_data_kind(self) -> Option<ExtendedDataKind> {
        match self {
            EventTag::Plain => None,
            EventTag::Fixit => Some(ExtendedDataKind::Fixit),
            EventTag::Note => Some(ExtendedDataKind::Note),
            EventTag::Macro => Some(ExtendedDataKind::Macro),
        }
    }
}

/// Looks up a source file's trimmed text at `line` — used to fold the
/// warning line into the report hash. `source` is the full file content
/// (already read from the bundle's `root/` tree or content store).
pub fn trimmed_source_line(source: &str, line: i64) -> Option<String> {
    if line < 1 {
        return None;
    }
    source.lines().nth((line - 1) as usize).map(|l| l.trim().to_string())
}

/// Canonicalize one raw finding.
///
/// `warning_line` is the trimmed text of `raw`'s own source line, resolved
/// by the caller via [`trimmed_source_line`] against the file content the
/// engine already has in hand — the canonicalizer itself never touches the
/// content store. `normalize_path` applies the ingestion's `trim_prefixes`
/// rule. Returns `REPORT_FORMAT` when a required field is missing.
pub fn canonicalize<F>(raw: &RawReport, warning_line: Option<&str>, normalize_path: &F) -> Result<CanonReport, WardenError>
where
    F: Fn(&str) -> String,
{
    if raw.checker_name.trim().is_empty() || raw.analyzer_name.trim().is_empty() {
        return Err(WardenError::report_format("report is missing checker_name or analyzer_name"));
    }
    if raw.file.trim().is_empty() {
        return Err(WardenError::report_format("report is missing its file path"));
    }

    let severity = raw
        .severity
        .as_deref()
        .map(Severity::parse)
        .unwrap_or(Severity::Unspecified);

    let mut events = Vec::with_capacity(raw.path.len());
    for (seq, ev) in raw.path.iter().enumerate() {
        let end_line = ev.position.end_line.unwrap_or(ev.position.line);
        let end_col = ev.position.end_column.unwrap_or(ev.position.column);
        let is_empty_span = ev.position.line == end_line && ev.position.column == end_col;
        if is_empty_span {
            continue;
        }
        events.push((
            seq,
            CanonEvent {
                file_path: normalize_path(&ev.position.file),
                start_line: ev.position.line,
                start_col: ev.position.column,
                end_line,
                end_col,
                msg: ev.message.clone(),
                tag: tag_for(ev),
            },
        ));
    }
    // Stable by insertion order already (stable sort_by_key); ties broken
    // by (file, start_line, start_col) per spec §4.3. file_id isn't known
    // yet at canonicalization time, so the path string stands in for it —
    // the engine re-sorts once file_ids are resolved if paths collide
    // inconsistently with id ordering, which in practice never happens
    // since file_id is assigned path-by-path in first-seen order.
    events.sort_by(|(ia, a), (ib, b)| {
        (a.file_path.as_str(), a.start_line, a.start_col, ia).cmp(&(b.file_path.as_str(), b.start_line, b.start_col, ib))
    });
    let bug_path: Vec<CanonEvent> = events.into_iter().map(|(_, e)| e).collect();

    let last_basename = bug_path
        .last()
        .map(|e| basename(&e.file_path))
        .unwrap_or_else(|| basename(&raw.file));
    let last_msg = bug_path.last().map(|e| e.msg.as_str()).unwrap_or(&raw.message);

    let source_line = warning_line.unwrap_or("").trim();

    let identity = format!(
        "{}|{}|{}|{}|{}",
        raw.checker_name,
        raw.analyzer_name,
        last_basename,
        normalize_whitespace(last_msg),
        source_line,
    );
    let report_hash = sha256_hex_normalized(&identity);

    Ok(CanonReport {
        file_path: normalize_path(&raw.file),
        line: raw.line,
        column: raw.column,
        checker_id: raw.checker_name.clone(),
        analyzer_name: raw.analyzer_name.clone(),
        checker_msg: raw.message.clone(),
        severity,
        report_hash,
        bug_path,
    })
}

fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{RawBugPathEvent, RawEventKind, RawPosition, RawReport};

    fn event(file: &str, line: i64, col: i64, end_line: Option<i64>, end_col: Option<i64>, msg: &str, kind: RawEventKind) -> RawBugPathEvent {
        RawBugPathEvent {
            position: RawPosition {
                file: file.to_string(),
                line,
                column: col,
                end_line,
                end_column: end_col,
            },
            message: msg.to_string(),
            kind,
        }
    }

    fn identity(p: &str) -> String {
        p.to_string()
    }

    #[test]
    fn drops_empty_span_events() {
        let raw = RawReport {
            file: "a.c".into(),
            line: 10,
            column: 2,
            checker_name: "core.NullDereference".into(),
            analyzer_name: "clangsa".into(),
            message: "Dereference of null pointer".into(),
            severity: Some("HIGH".into()),
            path: vec![
                event("a.c", 5, 1, Some(5), Some(1), "start", RawEventKind::Event),
                event("a.c", 10, 2, Some(10), Some(20), "deref here", RawEventKind::Event),
            ],
        };
        let canon = canonicalize(&raw, Some("  int x = *p;  "), &identity).unwrap();
        assert_eq!(canon.bug_path.len(), 1);
        assert_eq!(canon.bug_path[0].msg, "deref here");
    }

    #[test]
    fn tags_fixit_and_note_and_macro() {
        let raw = RawReport {
            file: "a.c".into(),
            line: 1,
            column: 1,
            checker_name: "x".into(),
            analyzer_name: "y".into(),
            message: "msg".into(),
            severity: None,
            path: vec![
                event("a.c", 1, 1, Some(1), Some(5), "add cast (fixit)", RawEventKind::Event),
                event("a.c", 2, 1, Some(2), Some(5), "see also", RawEventKind::Note),
                event("a.c", 3, 1, Some(3), Some(5), "expanded here", RawEventKind::MacroExpansion),
            ],
        };
        let canon = canonicalize(&raw, None, &identity).unwrap();
        assert_eq!(canon.bug_path[0].tag, EventTag::Fixit);
        assert_eq!(canon.bug_path[1].tag, EventTag::Note);
        assert_eq!(canon.bug_path[2].tag, EventTag::Macro);
    }

    #[test]
    fn hash_is_stable_across_line_shift_but_sensitive_to_message() {
        let mut raw = RawReport {
            file: "a.c".into(),
            line: 10,
            column: 1,
            checker_name: "core.X".into(),
            analyzer_name: "clangsa".into(),
            message: "bad thing".into(),
            severity: None,
            path: vec![],
        };
        let h1 = canonicalize(&raw, Some("do_bad_thing();"), &identity).unwrap().report_hash;
        raw.line = 40;
        let h2 = canonicalize(&raw, Some("do_bad_thing();"), &identity).unwrap().report_hash;
        assert_eq!(h1, h2);

        let h3 = canonicalize(&raw, Some("do_worse_thing();"), &identity).unwrap().report_hash;
        assert_ne!(h1, h3);
    }

    #[test]
    fn rejects_missing_checker_name() {
        let raw = RawReport {
            file: "a.c".into(),
            line: 1,
            column: 1,
            checker_name: "".into(),
            analyzer_name: "y".into(),
            message: "msg".into(),
            severity: None,
            path: vec![],
        };
        assert!(canonicalize(&raw, None, &identity).is_err());
    }

    #[test]
    fn trimmed_source_line_handles_out_of_range() {
        assert_eq!(trimmed_source_line("a\nb\n", 0), None);
        assert_eq!(trimmed_source_line("a\nb\n", 5), None);
        assert_eq!(trimmed_source_line("a\n  b  \n", 2), Some("b".to_string()));
    }

    fn raw_report(line: i64, checker: &str, message: &str) -> RawReport {
        RawReport {
            file: "a.c".into(),
            line,
            column: 1,
            checker_name: checker.into(),
            analyzer_name: "clangsa".into(),
            message: message.into(),
            severity: None,
            path: vec![],
        }
    }

    proptest::proptest! {
        /// P1: padding the warning line with extra horizontal whitespace, or
        /// moving the report to a different line number, never changes the
        /// report hash — only the trimmed text of the warning line matters.
        #[test]
        fn hash_stable_under_whitespace_and_line_shift(
            checker in "[a-zA-Z.]{3,20}",
            message in "[a-zA-Z0-9 ]{1,40}",
            code in "[a-zA-Z0-9_]{1,20}\\(\\);",
            line_a in 1i64..500,
            line_b in 1i64..500,
            pad_a in " {0,6}",
            pad_b in " {0,6}",
        ) {
            let raw_a = raw_report(line_a, &checker, &message);
            let raw_b = raw_report(line_b, &checker, &message);
            let source_line = format!("{pad_a}{code}{pad_b}");
            let h1 = canonicalize(&raw_a, Some(&source_line), &identity).unwrap().report_hash;
            let h2 = canonicalize(&raw_b, Some(&source_line), &identity).unwrap().report_hash;
            proptest::prop_assert_eq!(h1, h2);
        }

        /// P1 (sensitivity half): two distinct non-whitespace warning lines
        /// for the same checker/message never collide once trimmed.
        #[test]
        fn hash_changes_with_warning_line_content(
            checker in "[a-zA-Z.]{3,20}",
            message in "[a-zA-Z0-9 ]{1,40}",
            code_a in "[a-zA-Z_][a-zA-Z0-9_]{0,19}",
            code_b in "[a-zA-Z_][a-zA-Z0-9_]{0,19}",
        ) {
            proptest::prop_assume!(code_a != code_b);
            let raw = raw_report(1, &checker, &message);
            let h1 = canonicalize(&raw, Some(&code_a), &identity).unwrap().report_hash;
            let h2 = canonicalize(&raw, Some(&code_b), &identity).unwrap().report_hash;
            proptest::prop_assert_ne!(h1, h2);
        }
    }
}
