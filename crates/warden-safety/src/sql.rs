//! SQL text validation.
//!
//! A query is unsafe when it is blank, when it contains a keyword from one of
//! the forbidden categories, or when it references a schema outside the
//! configured allow-list. A safe verdict authorizes read-style inspection
//! only; execution still happens inside a rolled-back transaction.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::verdict::SafetyVerdict;

/// Reason given for blank input.
pub const EMPTY_QUERY_REASON: &str = "empty query";

/// Families of forbidden SQL keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlRiskCategory {
    /// INSERT, UPDATE, DELETE, TRUNCATE, BULK INSERT.
    DataModification,
    /// DROP, ALTER, CREATE.
    SchemaModification,
    /// BACKUP, RESTORE.
    BackupRestore,
    /// `xp_cmdshell`.
    CommandExecution,
    /// `sp_configure`.
    ServerConfiguration,
    /// `sp_start_job`, `sp_stop_job`.
    JobControl,
    /// OPENROWSET.
    ExternalRowset,
}

impl SqlRiskCategory {
    /// All categories, in reporting order.
    pub const ALL: [Self; 7] = [
        Self::DataModification,
        Self::SchemaModification,
        Self::BackupRestore,
        Self::CommandExecution,
        Self::ServerConfiguration,
        Self::JobControl,
        Self::ExternalRowset,
    ];

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DataModification => "data modification",
            Self::SchemaModification => "schema modification",
            Self::BackupRestore => "backup/restore",
            Self::CommandExecution => "command execution",
            Self::ServerConfiguration => "server configuration",
            Self::JobControl => "job control",
            Self::ExternalRowset => "external row-set access",
        }
    }

    fn pattern(self) -> &'static Regex {
        static DATA: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)\bBULK\s+INSERT\b|\bINSERT\b|\bUPDATE\b|\bDELETE\b|\bTRUNCATE\b")
                .expect("invalid regex")
        });
        static SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)\bDROP\b|\bALTER\b|\bCREATE\b").expect("invalid regex")
        });
        static BACKUP: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)\bBACKUP\b|\bRESTORE\b").expect("invalid regex"));
        static COMMAND: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)\bxp_cmdshell\b").expect("invalid regex"));
        static CONFIG: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)\bsp_configure\b").expect("invalid regex"));
        static JOBS: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)\bsp_start_job\b|\bsp_stop_job\b").expect("invalid regex")
        });
        static ROWSET: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)\bOPENROWSET\b").expect("invalid regex"));

        match self {
            Self::DataModification => &DATA,
            Self::SchemaModification => &SCHEMA,
            Self::BackupRestore => &BACKUP,
            Self::CommandExecution => &COMMAND,
            Self::ServerConfiguration => &CONFIG,
            Self::JobControl => &JOBS,
            Self::ExternalRowset => &ROWSET,
        }
    }

    /// Distinct keywords of this category found in `text`, normalized to
    /// upper case with single spaces, in order of first appearance.
    fn matches(self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for m in self.pattern().find_iter(text) {
            let keyword = m
                .as_str()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_uppercase();
            if !found.contains(&keyword) {
                found.push(keyword);
            }
        }
        found
    }
}

impl fmt::Display for SqlRiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

static SCHEMA_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\.\w+").expect("invalid regex"));

/// Validator for agent-supplied SQL.
///
/// Pure: the same text and allow-list always yield the same verdict.
#[derive(Debug, Clone, Default)]
pub struct SqlValidator {
    allowed_schemas: Vec<String>,
}

impl SqlValidator {
    /// A validator with no schema allow-list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A validator that also rejects references to schemas outside `schemas`.
    ///
    /// An empty list disables the schema check.
    #[must_use]
    pub fn with_allowed_schemas<I, S>(schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_schemas: schemas.into_iter().map(Into::into).collect(),
        }
    }

    /// The configured schema allow-list.
    #[must_use]
    pub fn allowed_schemas(&self) -> &[String] {
        &self.allowed_schemas
    }

    /// Classify `text`.
    #[must_use]
    pub fn validate(&self, text: &str) -> SafetyVerdict {
        validate_sql(text, Some(&self.allowed_schemas))
    }
}

/// Classify `text`, optionally restricting referenced schemas.
///
/// Schema names compare case-insensitively, like SQL Server identifiers.
#[must_use]
pub fn validate_sql(text: &str, allowed_schemas: Option<&[String]>) -> SafetyVerdict {
    if text.trim().is_empty() {
        return SafetyVerdict::rejected(text, EMPTY_QUERY_REASON);
    }

    let mut reasons = Vec::new();
    for category in SqlRiskCategory::ALL {
        let keywords = category.matches(text);
        if !keywords.is_empty() {
            reasons.push(format!(
                "forbidden {category} keyword(s): {}",
                keywords.join(", ")
            ));
        }
    }

    if let Some(allowed) = allowed_schemas.filter(|a| !a.is_empty()) {
        let mut offending: Vec<&str> = Vec::new();
        for caps in SCHEMA_REF.captures_iter(text) {
            let Some(schema) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            let permitted = allowed.iter().any(|a| a.eq_ignore_ascii_case(schema));
            if !permitted && !offending.contains(&schema) {
                offending.push(schema);
            }
        }
        reasons.extend(
            offending
                .into_iter()
                .map(|schema| format!("schema '{schema}' not in allowed schemas")),
        );
    }

    SafetyVerdict::from_reasons(text, reasons)
}
