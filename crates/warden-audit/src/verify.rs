//! Chain verification for audit files.

use std::fmt;
use std::path::Path;
use tracing::warn;

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEvent, GENESIS_HASH};

/// Result of verifying one audit file.
#[derive(Debug, Clone)]
pub struct ChainVerification {
    /// Whether the chain is intact.
    pub valid: bool,
    /// Number of records checked.
    pub entries_verified: usize,
    /// Problems found (empty if valid).
    pub issues: Vec<ChainIssue>,
}

/// A problem found while verifying a chain. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainIssue {
    /// The line is not a valid audit record.
    Unparseable {
        /// Offending line.
        line: usize,
    },
    /// The first record does not start from the genesis hash.
    InvalidGenesis {
        /// Offending line.
        line: usize,
    },
    /// The record's `prev_hash` does not match the previous record's hash.
    BrokenLink {
        /// Offending line.
        line: usize,
        /// Hash of the previous record.
        expected: String,
        /// `prev_hash` stored in this record.
        actual: String,
    },
    /// The record's content does not hash to its stored `hash`.
    HashMismatch {
        /// Offending line.
        line: usize,
    },
}

impl fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparseable { line } => write!(f, "line {line}: unparseable record"),
            Self::InvalidGenesis { line } => write!(f, "line {line}: invalid genesis hash"),
            Self::BrokenLink { line, .. } => write!(f, "line {line}: broken chain link"),
            Self::HashMismatch { line } => write!(f, "line {line}: content hash mismatch"),
        }
    }
}

/// Recompute and check the hash chain of an audit file.
///
/// # Errors
///
/// Returns an error only if the file cannot be read.
pub fn verify_file(path: impl AsRef<Path>) -> AuditResult<ChainVerification> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;

    let mut issues = Vec::new();
    let mut entries_verified: usize = 0;
    let mut previous: Option<String> = None;

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx.saturating_add(1);
        let Ok(event) = serde_json::from_str::<AuditEvent>(line) else {
            issues.push(ChainIssue::Unparseable { line: line_no });
            continue;
        };
        entries_verified = entries_verified.saturating_add(1);

        match &previous {
            None if event.prev_hash != GENESIS_HASH => {
                issues.push(ChainIssue::InvalidGenesis { line: line_no });
            },
            Some(expected) if *expected != event.prev_hash => {
                warn!(line = line_no, "Audit chain link broken");
                issues.push(ChainIssue::BrokenLink {
                    line: line_no,
                    expected: expected.clone(),
                    actual: event.prev_hash.clone(),
                });
            },
            _ => {},
        }

        if event.compute_hash()? != event.hash {
            issues.push(ChainIssue::HashMismatch { line: line_no });
        }
        previous = Some(event.hash);
    }

    Ok(ChainVerification {
        valid: issues.is_empty(),
        entries_verified,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditLog;
    use serde_json::Map;
    use warden_core::SessionId;

    fn write_session() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::create(dir.path(), SessionId::new(), "op").unwrap();
        log.log_warning("one", Map::new());
        log.log_warning("two", Map::new());
        let path = log.path().to_path_buf();
        (dir, path)
    }

    #[test]
    fn test_edited_record_is_detected() {
        let (_dir, path) = write_session();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("\"one\"", "\"uno\"")).unwrap();

        let result = verify_file(&path).unwrap();
        assert!(!result.valid);
        assert_eq!(result.issues, vec![ChainIssue::HashMismatch { line: 2 }]);
    }

    #[test]
    fn test_deleted_record_breaks_link() {
        let (_dir, path) = write_session();
        let content = std::fs::read_to_string(&path).unwrap();
        let kept: Vec<_> = content.lines().enumerate().filter(|(i, _)| *i != 1).map(|(_, l)| l).collect();
        std::fs::write(&path, kept.join("\n")).unwrap();

        let result = verify_file(&path).unwrap();
        assert!(!result.valid);
        assert!(matches!(result.issues[0], ChainIssue::BrokenLink { line: 2, .. }));
    }

    #[test]
    fn test_truncated_head_is_invalid_genesis() {
        let (_dir, path) = write_session();
        let content = std::fs::read_to_string(&path).unwrap();
        let tail: Vec<_> = content.lines().skip(1).collect();
        std::fs::write(&path, tail.join("\n")).unwrap();

        let result = verify_file(&path).unwrap();
        assert_eq!(result.issues, vec![ChainIssue::InvalidGenesis { line: 1 }]);
    }
}
