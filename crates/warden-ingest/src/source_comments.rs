//! In-source review-comment parsing (spec §4.4 step 7): a `warden:` marker
//! inside a line comment on the warning line takes precedence over any
//! stored `ReviewStatusRule`.
//!
//! Syntax: `// warden: STATUS optional free-text message` (or `#`-style
//! line comments for non-C-family sources). STATUS is one of the
//! `ReviewStatus` keywords, case-insensitive.

use warden_core::model::ReviewStatus;
use warden_core::WardenError;

const MARKER: &str = "warden:";

/// Parse an in-source review marker out of one already-trimmed source
/// line. Returns `Ok(None)` when the line carries no marker at all, and
/// `Err(SourceFile)` when a marker is present but malformed.
pub fn parse_review_comment(file: &str, source_line: &str) -> Result<Option<(ReviewStatus, Option<String>)>, WardenError> {
    let comment = match extract_comment(source_line) {
        Some(c) => c,
        None => return Ok(None),
    };
    let lower = comment.to_ascii_lowercase();
    let marker_pos = match lower.find(MARKER) {
        Some(p) => p,
        None => return Ok(None),
    };

    let rest = comment[marker_pos + MARKER.len()..].trim();
    if rest.is_empty() {
        return Err(WardenError::source_file(file, "warden: comment has no status keyword"));
    }

    let mut parts = rest.splitn(2, char::is_whitespace);
    let keyword = parts.next().unwrap_or("");
    let message = parts.next().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    let status = match keyword.to_ascii_uppercase().replace('-', "_").as_str() {
        "CONFIRMED" => ReviewStatus::Confirmed,
        "FALSE_POSITIVE" => ReviewStatus::FalsePositive,
        "INTENTIONAL" => ReviewStatus::Intentional,
        "UNREVIEWED" => ReviewStatus::Unreviewed,
        other => {
            return Err(WardenError::source_file(
                file,
                format!("unknown review status '{other}' in warden: comment"),
            ))
        }
    };

    Ok(Some((status, message)))
}

/// Extract the text of a `//` or `#` line comment, if any. Takes the
/// first marker found; a `#` inside a `//` comment (or vice versa) is not
/// a concern since we only look past whichever comes first.
fn extract_comment(line: &str) -> Option<&str> {
    let slash = line.find("//");
    let hash = line.find('#');
    match (slash, hash) {
        (Some(s), Some(h)) if h < s => Some(line[h + 1..].trim()),
        (Some(s), _) => Some(line[s + 2..].trim()),
        (None, Some(h)) => Some(line[h + 1..].trim()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_marker_returns_none() {
        assert!(parse_review_comment("a.c", "int x = *p;").unwrap().is_none());
    }

    #[test]
    fn parses_status_and_message() {
        let (status, msg) = parse_review_comment("a.c", "foo(); // warden: false_positive checked upstream")
            .unwrap()
            .unwrap();
        assert_eq!(status, ReviewStatus::FalsePositive);
        assert_eq!(msg.as_deref(), Some("checked upstream"));
    }

    #[test]
    fn parses_status_without_message() {
        let (status, msg) = parse_review_comment("a.c", "foo(); // warden: intentional").unwrap().unwrap();
        assert_eq!(status, ReviewStatus::Intentional);
        assert_eq!(msg, None);
    }

    #[test]
    fn hash_style_comment_also_recognized() {
        let (status, _) = parse_review_comment("a.py", "do_thing()  # warden: confirmed").unwrap().unwrap();
        assert_eq!(status, ReviewStatus::Confirmed);
    }

    #[test]
    fn unknown_status_is_malformed() {
        let err = parse_review_comment("a.c", "// warden: maybe").unwrap_err();
        assert!(matches!(err, WardenError::SourceFile { .. }));
    }

    #[test]
    fn empty_status_is_malformed() {
        let err = parse_review_comment("a.c", "// warden:").unwrap_err();
        assert!(matches!(err, WardenError::SourceFile { .. }));
    }
}
