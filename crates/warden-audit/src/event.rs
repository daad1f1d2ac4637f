//! Audit event types.
//!
//! One [`AuditEvent`] is one line of the session's NDJSON file. Events are
//! immutable once written.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use warden_core::{SessionId, Timestamp};

/// Actor recorded for events the runtime emits on its own behalf.
pub const SYSTEM_ACTOR: &str = "system";

/// Previous-hash value carried by the first record of every file.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Enumerated audit event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Session opened.
    SessionStart,
    /// Session closed; details carry the summary.
    SessionEnd,
    /// A task run started inside the session.
    ScanStart,
    /// A task run finished.
    ScanEnd,
    /// An authorized tool was handed to its adapter.
    ToolInvocation,
    /// A tool adapter returned.
    ToolResult,
    /// The operator resolved a proposal.
    HumanDecision,
    /// Something failed.
    Error,
    /// Something suspicious but non-fatal happened.
    Warning,
    /// Credentials were read or used.
    CredentialAccess,
    /// A database query was executed (or dry-run).
    DatabaseQuery,
    /// The target's state was changed.
    SystemChange,
}

impl AuditEventType {
    /// Wire name of the event type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::ScanStart => "scan_start",
            Self::ScanEnd => "scan_end",
            Self::ToolInvocation => "tool_invocation",
            Self::ToolResult => "tool_result",
            Self::HumanDecision => "human_decision",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::CredentialAccess => "credential_access",
            Self::DatabaseQuery => "database_query",
            Self::SystemChange => "system_change",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event was recorded.
    pub timestamp: Timestamp,
    /// Session the event belongs to.
    pub session_id: SessionId,
    /// Event kind.
    pub event_type: AuditEventType,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Operator id or `"system"`.
    #[serde(alias = "user", default = "default_actor")]
    pub actor: String,
    /// Host or asset under test.
    #[serde(default)]
    pub target: Option<String>,
    /// Event-specific structured details.
    #[serde(default)]
    pub details: Map<String, Value>,
    /// Hash of the previous record in the file.
    #[serde(default)]
    pub prev_hash: String,
    /// Hash of this record (excluding this field).
    #[serde(default)]
    pub hash: String,
}

fn default_actor() -> String {
    SYSTEM_ACTOR.to_string()
}

/// The fields covered by a record's hash.
#[derive(Serialize)]
struct HashedFields<'a> {
    timestamp: &'a Timestamp,
    session_id: &'a SessionId,
    event_type: AuditEventType,
    description: &'a str,
    actor: &'a str,
    target: Option<&'a str>,
    details: &'a Map<String, Value>,
    prev_hash: &'a str,
}

impl AuditEvent {
    /// Create an unchained event stamped with the current time.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        event_type: AuditEventType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Timestamp::now(),
            session_id,
            event_type,
            description: description.into(),
            actor: default_actor(),
            target: None,
            details: Map::new(),
            prev_hash: String::new(),
            hash: String::new(),
        }
    }

    /// Set the actor.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Set the target.
    #[must_use]
    pub fn with_target(mut self, target: Option<impl Into<String>>) -> Self {
        self.target = target.map(Into::into);
        self
    }

    /// Add one detail field.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Replace all details.
    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }

    /// Compute the BLAKE3 hash of this record's content.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        let fields = HashedFields {
            timestamp: &self.timestamp,
            session_id: &self.session_id,
            event_type: self.event_type,
            description: &self.description,
            actor: &self.actor,
            target: self.target.as_deref(),
            details: &self.details,
            prev_hash: &self.prev_hash,
        };
        let bytes = serde_json::to_vec(&fields)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    /// Link this record after `prev_hash` and seal it.
    pub(crate) fn seal(&mut self, prev_hash: &str) -> Result<(), serde_json::Error> {
        prev_hash.clone_into(&mut self.prev_hash);
        self.hash = self.compute_hash()?;
        Ok(())
    }
}
