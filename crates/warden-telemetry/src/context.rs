//! Session context for correlating diagnostics.

use chrono::{DateTime, Utc};
use tracing::Span;
use warden_core::{SessionId, ThreadId};

/// Identifies one approval-gate session in diagnostic output.
///
/// Every log line emitted inside [`SessionContext::span`] carries the
/// session and thread IDs.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Session identifier (also names the audit file).
    pub session_id: SessionId,
    /// Agent engine thread identifier.
    pub thread_id: ThreadId,
    /// Operator running the session.
    pub operator: String,
    /// Host or asset under test, if known.
    pub target: Option<String>,
    /// When the session started.
    pub started_at: DateTime<Utc>,
}

impl SessionContext {
    /// Create a context for a new session.
    #[must_use]
    pub fn new(session_id: SessionId, thread_id: ThreadId, operator: impl Into<String>) -> Self {
        Self {
            session_id,
            thread_id,
            operator: operator.into(),
            target: None,
            started_at: Utc::now(),
        }
    }

    /// Set the target.
    #[must_use]
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Milliseconds since the session started.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }

    /// Span to enter for the lifetime of the session.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "session",
            session = %self.session_id.short(),
            thread = %self.thread_id,
            operator = %self.operator,
            target = self.target.as_deref(),
        )
    }
}
