//! Reading audit files back: tolerant parsing, summaries and directory listing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use warden_core::SessionId;

use crate::error::{AuditError, AuditResult};
use crate::event::AuditEvent;

/// Events parsed from one audit file.
#[derive(Debug, Clone, Default)]
pub struct ParsedAuditFile {
    /// Successfully parsed events, in file order.
    pub events: Vec<AuditEvent>,
    /// 1-based line numbers that could not be parsed.
    pub skipped: Vec<usize>,
}

/// Event counts for one audit file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Session the file belongs to, if any record named one.
    pub session_id: Option<SessionId>,
    /// Number of parseable records.
    pub total_events: usize,
    /// Count of records per `event_type`.
    pub event_counts: BTreeMap<String, usize>,
    /// Number of non-empty lines that could not be parsed.
    pub skipped_lines: usize,
    /// File the summary was computed from.
    pub audit_file: PathBuf,
}

impl AuditSummary {
    /// A summary with no events.
    #[must_use]
    pub fn empty(session_id: SessionId, audit_file: PathBuf) -> Self {
        Self {
            session_id: Some(session_id),
            total_events: 0,
            event_counts: BTreeMap::new(),
            skipped_lines: 0,
            audit_file,
        }
    }
}

/// One audit file found in a directory.
#[derive(Debug, Clone)]
pub struct AuditFileInfo {
    /// Full path.
    pub path: PathBuf,
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

fn read_to_string(path: &Path) -> AuditResult<String> {
    std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))
}

/// Parse every event in an audit file, skipping lines that do not parse.
///
/// # Errors
///
/// Returns an error only if the file cannot be read.
pub fn read_events(path: impl AsRef<Path>) -> AuditResult<ParsedAuditFile> {
    let path = path.as_ref();
    let content = read_to_string(path)?;
    let mut parsed = ParsedAuditFile::default();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEvent>(line) {
            Ok(event) => parsed.events.push(event),
            Err(e) => {
                let line_no = idx.saturating_add(1);
                warn!(path = %path.display(), line = line_no, error = %e, "Skipping unparseable audit line");
                parsed.skipped.push(line_no);
            },
        }
    }

    Ok(parsed)
}

/// Count the records of an audit file by type.
///
/// Counting works on raw JSON objects, so records of unknown shape still
/// count under their `event_type` (or `unknown`).
///
/// # Errors
///
/// Returns an error only if the file cannot be read.
pub fn summarize_file(path: impl AsRef<Path>) -> AuditResult<AuditSummary> {
    let path = path.as_ref();
    let content = read_to_string(path)?;

    let mut session_id = None;
    let mut total_events: usize = 0;
    let mut skipped_lines: usize = 0;
    let mut event_counts: BTreeMap<String, usize> = BTreeMap::new();

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(Value::Object(record)) = serde_json::from_str::<Value>(line) else {
            skipped_lines = skipped_lines.saturating_add(1);
            continue;
        };
        total_events = total_events.saturating_add(1);

        let event_type = record
            .get("event_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let count = event_counts.entry(event_type).or_default();
        *count = count.saturating_add(1);

        if session_id.is_none() {
            session_id = record
                .get("session_id")
                .and_then(|v| serde_json::from_value::<SessionId>(v.clone()).ok());
        }
    }

    Ok(AuditSummary {
        session_id,
        total_events,
        event_counts,
        skipped_lines,
        audit_file: path.to_path_buf(),
    })
}

/// List `audit_*.jsonl` files in a directory, newest first.
///
/// A missing directory yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn list_audit_files(dir: impl AsRef<Path>) -> AuditResult<Vec<AuditFileInfo>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| AuditError::io(dir, e))? {
        let entry = entry.map_err(|e| AuditError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !(name.starts_with("audit_") && name.ends_with(".jsonl")) {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        files.push(AuditFileInfo {
            path: entry.path(),
            name,
            size,
        });
    }

    // Names embed a sortable timestamp.
    files.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let files = list_audit_files(dir.path().join("nope")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_list_is_newest_first_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("audit_20240101_000000_aaaa.jsonl"), "").unwrap();
        fs::write(dir.path().join("audit_20240301_000000_bbbb.jsonl"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let names: Vec<_> = list_audit_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "audit_20240301_000000_bbbb.jsonl",
                "audit_20240101_000000_aaaa.jsonl"
            ]
        );
    }

    #[test]
    fn test_summarize_counts_foreign_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_x.jsonl");
        fs::write(
            &path,
            "{\"event_type\":\"scan_start\"}\n\n[1,2]\n{\"event_type\":\"scan_start\"}\n{}\n",
        )
        .unwrap();

        let summary = summarize_file(&path).unwrap();
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.skipped_lines, 1);
        assert_eq!(summary.event_counts["scan_start"], 2);
        assert_eq!(summary.event_counts["unknown"], 1);
        assert!(summary.session_id.is_none());
    }

    #[test]
    fn test_read_events_reports_skipped_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_x.jsonl");
        fs::write(&path, "garbage\n").unwrap();
        let parsed = read_events(&path).unwrap();
        assert!(parsed.events.is_empty());
        assert_eq!(parsed.skipped, vec![1]);
    }
}
