//! Unpacks a base64-encoded zip archive into an in-memory report bundle.
//!
//! Layout (spec §4.4 / §6): exactly one top-level directory containing a
//! `reports/` tree of analyzer-agnostic JSON records, an optional `root/`
//! tree of source files, an optional `metadata.json`, and an optional
//! `statistics/` tree of per-analyzer JSON stat files.

use std::collections::HashMap;
use std::io::Read;

use serde::Deserialize;
use warden_core::WardenError;

/// A span inside a single source file, as reported by the analyzer.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPosition {
    pub file: String,
    pub line: i64,
    pub column: i64,
    /// Absent when the analyzer reports a bare point rather than a range —
    /// the canonicalizer then treats the span as collapsed to its start.
    #[serde(default)]
    pub end_line: Option<i64>,
    #[serde(default)]
    pub end_column: Option<i64>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RawEventKind {
    Event,
    Note,
    MacroExpansion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBugPathEvent {
    pub position: RawPosition,
    pub message: String,
    #[serde(default = "default_kind")]
    pub kind: RawEventKind,
}

fn default_kind() -> RawEventKind {
    RawEventKind::Event
}

/// One finding exactly as an analyzer emitted it, before canonicalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReport {
    pub file: String,
    pub line: i64,
    pub column: i64,
    pub checker_name: String,
    pub analyzer_name: String,
    pub message: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub path: Vec<RawBugPathEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BundleMetadata {
    pub version_tag: Option<String>,
    pub cc_client_version: Option<String>,
    pub description: Option<String>,
    /// Checkers the client reports as explicitly turned off for this
    /// analysis — reports previously seen under these checkers transition
    /// to `OFF` rather than `RESOLVED` (spec §4.4 step 6).
    pub disabled_checkers: Vec<String>,
    /// Analyzers that actually ran. A prior report whose `analyzer_name` is
    /// missing from this set transitions to `UNAVAILABLE`.
    pub analyzers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAnalyzerStatistics {
    pub analyzer_type: String,
    pub version: Option<String>,
    pub successful: bool,
    #[serde(default)]
    pub failed_file_paths: Vec<String>,
}

/// The fully unpacked, still-uncanonicalized contents of one bundle.
pub struct Bundle {
    pub reports: Vec<RawReport>,
    /// Source file bytes, keyed by the path under `root/` (slashes,
    /// relative to the bundle's top-level directory).
    pub sources: HashMap<String, Vec<u8>>,
    pub metadata: BundleMetadata,
    pub statistics: Vec<RawAnalyzerStatistics>,
}

/// Decode `encoded` and reject it outright if the decoded (still
/// compressed) size exceeds `limit_bytes` — done before any decompression
/// so an oversized payload never gets the CPU cost of unzipping (§4.4, S5).
pub fn decode_within_limit(encoded: &str, limit_bytes: u64) -> Result<Vec<u8>, WardenError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    // Reject on the encoded length first: base64 expands by ~4/3, so this
    // is a cheap upper bound check before touching the decoder at all.
    let encoded_limit = limit_bytes.saturating_mul(4) / 3 + 4;
    if encoded.len() as u64 > encoded_limit {
        return Err(WardenError::io(format!(
            "bundle exceeds configured size limit of {limit_bytes} bytes"
        )));
    }
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| WardenError::io(format!("invalid base64 bundle: {e}")))?;
    if bytes.len() as u64 > limit_bytes {
        return Err(WardenError::io(format!(
            "bundle exceeds configured size limit of {limit_bytes} bytes"
        )));
    }
    Ok(bytes)
}

/// Unzip `bytes` into a [`Bundle`], capping total extracted size at
/// `10 * bundle_size_limit_bytes` to guard against a zip-bomb blowup.
pub fn unpack(bytes: &[u8], bundle_size_limit_bytes: u64) -> Result<Bundle, WardenError> {
    let extracted_cap = bundle_size_limit_bytes.saturating_mul(10);
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| WardenError::report_format(format!("not a valid archive: {e}")))?;

    let mut top_level: Option<String> = None;
    let mut reports = Vec::new();
    let mut sources = HashMap::new();
    let mut metadata = BundleMetadata::default();
    let mut statistics = Vec::new();
    let mut extracted_total: u64 = 0;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| WardenError::report_format(format!("corrupt archive entry: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut components = name.splitn(2, '/');
        let dir = components
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WardenError::report_format("archive entry outside any top-level directory"))?;
        match &top_level {
            None => top_level = Some(dir.to_string()),
            Some(existing) if existing != dir => {
                return Err(WardenError::report_format("archive must contain exactly one top-level directory"));
            }
            _ => {}
        }
        let rest = match components.next() {
            Some(r) if !r.is_empty() => r,
            _ => continue,
        };

        extracted_total = extracted_total.saturating_add(entry.size());
        if extracted_total > extracted_cap {
            return Err(WardenError::io("bundle exceeds extracted-size cap (possible zip bomb)"));
        }

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| WardenError::io(format!("failed reading archive entry {rest}: {e}")))?;

        if rest == "metadata.json" {
            metadata = serde_json::from_slice(&buf)
                .map_err(|e| WardenError::report_format(format!("malformed metadata.json: {e}")))?;
        } else if let Some(path) = rest.strip_prefix("root/") {
            sources.insert(path.to_string(), buf);
        } else if let Some(stat_name) = rest.strip_prefix("statistics/") {
            if stat_name.ends_with(".json") {
                let stat: RawAnalyzerStatistics = serde_json::from_slice(&buf)
                    .map_err(|e| WardenError::report_format(format!("malformed statistics entry {stat_name}: {e}")))?;
                statistics.push(stat);
            }
        } else if let Some(report_name) = rest.strip_prefix("reports/") {
            if report_name.ends_with(".json") {
                let report: RawReport = serde_json::from_slice(&buf)
                    .map_err(|e| WardenError::report_format(format!("malformed report {report_name}: {e}")))?;
                reports.push(report);
            }
        }
    }

    if top_level.is_none() {
        return Err(WardenError::report_format("archive is empty"));
    }

    Ok(Bundle {
        reports,
        sources,
        metadata,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_within_limit_rejects_oversized_base64() {
        let huge = "A".repeat(1_000);
        let err = decode_within_limit(&huge, 10).unwrap_err();
        assert!(matches!(err, WardenError::Io { .. }));
    }

    #[test]
    fn decode_within_limit_accepts_small_payload() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let encoded = STANDARD.encode(b"hello world");
        let decoded = decode_within_limit(&encoded, 1024).unwrap();
        assert_eq!(decoded, b"hello world");
    }
}
