//! Audit log - the per-session append-only writer.

use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error};
use warden_core::{SessionId, Timestamp};

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEvent, AuditEventType, GENESIS_HASH, SYSTEM_ACTOR};
use crate::reader::{AuditSummary, summarize_file};

/// Maximum number of characters of a query kept in a `database_query` record.
pub const MAX_LOGGED_QUERY_CHARS: usize = 200;

/// Append-only audit log bound to one session and one file.
///
/// Every append opens the file in append mode, writes one complete line,
/// syncs and closes it. Nothing is buffered in memory. Appends are
/// serialized through the chain head lock so records never interleave.
pub struct AuditLog {
    path: PathBuf,
    session_id: SessionId,
    operator: String,
    /// Hash of the last record successfully written.
    head: Mutex<String>,
}

impl AuditLog {
    /// Create a new session log under `dir` and write its `session_start` record.
    ///
    /// The file name is derived from the current time and the session ID:
    /// `audit_{YYYYmmdd_HHMMSS}_{short}.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the opening
    /// record cannot be written.
    pub fn create(
        dir: impl AsRef<Path>,
        session_id: SessionId,
        operator: impl Into<String>,
    ) -> AuditResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| AuditError::io(dir, e))?;

        let file_name = format!(
            "audit_{}_{}.jsonl",
            Timestamp::now().file_stamp(),
            session_id.short()
        );
        let log = Self {
            path: dir.join(file_name),
            session_id,
            operator: operator.into(),
            head: Mutex::new(GENESIS_HASH.to_string()),
        };

        let start = log
            .event(AuditEventType::SessionStart, "Session started")
            .with_actor(log.operator.clone());
        log.try_append(start)?;
        debug!(path = %log.path.display(), "Audit session opened");
        Ok(log)
    }

    /// Path of the session's audit file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Session this log belongs to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Operator recorded as the actor of human decisions.
    #[must_use]
    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// Start building an event for this session.
    #[must_use]
    pub fn event(&self, event_type: AuditEventType, description: impl Into<String>) -> AuditEvent {
        AuditEvent::new(self.session_id.clone(), event_type, description)
    }

    /// Append an event, chaining and sealing it first.
    ///
    /// Returns the sealed record as written. The file is opened, written,
    /// synced and closed while the chain head is locked, so this blocks the
    /// calling thread for one small write. Concurrent callers are serialized
    /// and the chain stays linear.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn try_append(&self, mut event: AuditEvent) -> AuditResult<AuditEvent> {
        let mut head = self.head.lock().map_err(|_| AuditError::LockPoisoned)?;

        event.seal(&head)?;
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AuditError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| AuditError::io(&self.path, e))?;
        file.sync_data()
            .map_err(|e| AuditError::io(&self.path, e))?;

        head.clone_from(&event.hash);
        Ok(event)
    }

    /// Append an event. Failures are reported on the diagnostic channel and
    /// never returned.
    pub fn append(&self, event: AuditEvent) {
        let event_type = event.event_type;
        match self.try_append(event) {
            Ok(written) => {
                debug!(event_type = %event_type, description = %written.description, "Audit");
            },
            Err(e) => {
                error!(event_type = %event_type, error = %e, "Failed to write audit event");
            },
        }
    }

    /// Record a generic event.
    pub fn log_event(
        &self,
        event_type: AuditEventType,
        description: impl Into<String>,
        details: Map<String, Value>,
        actor: Option<&str>,
        target: Option<&str>,
    ) {
        let event = self
            .event(event_type, description)
            .with_actor(actor.unwrap_or(SYSTEM_ACTOR))
            .with_target(target)
            .with_details(details);
        self.append(event);
    }

    /// Record a tool being handed to its adapter.
    pub fn log_tool_invocation(
        &self,
        tool_name: &str,
        arguments: &Map<String, Value>,
        target: Option<&str>,
        approved_by: Option<&str>,
    ) {
        let mut details = Map::new();
        details.insert("tool".into(), tool_name.into());
        details.insert("arguments".into(), Value::Object(arguments.clone()));
        details.insert(
            "approved_by".into(),
            approved_by.map_or(Value::Null, Value::from),
        );
        self.log_event(
            AuditEventType::ToolInvocation,
            format!("Tool invoked: {tool_name}"),
            details,
            None,
            target,
        );
    }

    /// Record a tool adapter's result.
    pub fn log_tool_result(
        &self,
        tool_name: &str,
        success: bool,
        result_summary: &str,
        target: Option<&str>,
    ) {
        let mut details = Map::new();
        details.insert("tool".into(), tool_name.into());
        details.insert("success".into(), success.into());
        details.insert("result_summary".into(), result_summary.into());
        self.log_event(
            AuditEventType::ToolResult,
            format!("Tool completed: {tool_name}"),
            details,
            None,
            target,
        );
    }

    /// Record an operator decision. `extra` is merged into the details
    /// after `decision` and `context`.
    pub fn log_human_decision(
        &self,
        decision: &str,
        context: &str,
        actor: &str,
        extra: Map<String, Value>,
    ) {
        let mut details = Map::new();
        details.insert("decision".into(), decision.into());
        details.insert("context".into(), context.into());
        details.extend(extra);
        self.log_event(
            AuditEventType::HumanDecision,
            format!("Human decision: {decision}"),
            details,
            Some(actor),
            None,
        );
    }

    /// Record a database query. The query text is truncated.
    pub fn log_database_query(
        &self,
        query: &str,
        database: &str,
        target: Option<&str>,
        read_only: bool,
    ) {
        let truncated: String = query.chars().take(MAX_LOGGED_QUERY_CHARS).collect();
        let mut details = Map::new();
        details.insert("query".into(), truncated.into());
        details.insert("database".into(), database.into());
        details.insert("read_only".into(), read_only.into());
        self.log_event(
            AuditEventType::DatabaseQuery,
            "Database query executed",
            details,
            None,
            target,
        );
    }

    /// Record a credential check. The secret itself is never written.
    pub fn log_credential_access(
        &self,
        username: &str,
        target: &str,
        success: bool,
        details: Map<String, Value>,
    ) {
        let mut record = Map::new();
        record.insert("username".into(), username.into());
        record.insert("success".into(), success.into());
        record.extend(details);
        self.log_event(
            AuditEventType::CredentialAccess,
            format!("Credential check for {username}"),
            record,
            None,
            Some(target),
        );
    }

    /// Record an error, optionally with its source.
    pub fn log_error(
        &self,
        message: &str,
        source: Option<&(dyn std::error::Error + 'static)>,
        context: Map<String, Value>,
    ) {
        let mut details = context;
        if let Some(err) = source {
            details.insert("error_message".into(), err.to_string().into());
            if let Some(cause) = err.source() {
                details.insert("error_source".into(), cause.to_string().into());
            }
        }
        self.log_event(AuditEventType::Error, message, details, None, None);
    }

    /// Record a warning.
    pub fn log_warning(&self, message: &str, details: Map<String, Value>) {
        self.log_event(AuditEventType::Warning, message, details, None, None);
    }

    /// Summarize the events written so far.
    ///
    /// Unparseable lines are counted in `skipped_lines` and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn summarize(&self) -> AuditResult<AuditSummary> {
        let mut summary = summarize_file(&self.path)?;
        summary.session_id = Some(self.session_id.clone());
        Ok(summary)
    }

    /// Write the closing `session_end` record carrying the session summary.
    ///
    /// Returns the summary that was embedded. Never fails; if the file
    /// cannot be read back, an empty summary is recorded.
    pub fn close_session(&self) -> AuditSummary {
        let summary = self.summarize().unwrap_or_else(|e| {
            error!(error = %e, "Failed to summarize audit log");
            AuditSummary::empty(self.session_id.clone(), self.path.clone())
        });

        let mut details = Map::new();
        match serde_json::to_value(&summary) {
            Ok(value) => {
                details.insert("summary".into(), value);
            },
            Err(e) => error!(error = %e, "Failed to serialize audit summary"),
        }
        self.log_event(
            AuditEventType::SessionEnd,
            "Session ended",
            details,
            Some(&self.operator),
            None,
        );
        summary
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("path", &self.path)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
