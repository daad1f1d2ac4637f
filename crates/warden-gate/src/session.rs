//! Session state owned by the gate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use warden_audit::AuditSummary;
use warden_core::{SessionId, SessionStatus, ThreadId};

/// One run of the gate against one task.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier (also names the audit file).
    pub id: SessionId,
    /// Engine thread the session drives.
    pub thread_id: ThreadId,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session reached a terminal state.
    pub ended_at: Option<DateTime<Utc>>,
    /// Engine steps run so far.
    pub steps: u32,
}

impl Session {
    /// A new running session.
    #[must_use]
    pub fn new(id: SessionId, thread_id: ThreadId) -> Self {
        Self {
            id,
            thread_id,
            status: SessionStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            steps: 0,
        }
    }

    /// Move to `next`. Illegal transitions are ignored and return `false`.
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if self.status == next {
            return true;
        }
        if !self.status.can_transition_to(next) {
            warn!(from = %self.status, to = %next, "Ignoring illegal session transition");
            return false;
        }
        debug!(from = %self.status, to = %next, "Session transition");
        self.status = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        true
    }

    /// Count one engine step.
    pub fn record_step(&mut self) {
        self.steps = self.steps.saturating_add(1);
    }

    /// Whether the session has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// What a finished session reports to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    /// Session identifier.
    pub session_id: SessionId,
    /// Engine thread.
    pub thread_id: ThreadId,
    /// Terminal state.
    pub status: SessionStatus,
    /// Engine steps run.
    pub steps: u32,
    /// Final agent text, when the session completed with one.
    pub final_message: Option<String>,
    /// Why the session ended.
    pub reason: String,
    /// Audit summary embedded in the closing record.
    pub summary: AuditSummary,
}
