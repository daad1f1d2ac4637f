//! Hooks for frontends that want to follow a session live.

use crate::chunk::StepChunk;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Progress.
    Info,
    /// Something finished well.
    Success,
    /// Something the operator should look at.
    Warn,
    /// Something failed.
    Error,
}

/// A human-readable status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text.
    pub message: String,
}

impl Notice {
    /// Create a notice.
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Receives session progress. Every method defaults to doing nothing.
pub trait SessionObserver: Send + Sync {
    /// A chunk arrived from the engine.
    fn chunk(&self, _chunk: &StepChunk) {}

    /// The gate has something to tell the operator.
    fn notice(&self, _notice: &Notice) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl SessionObserver for SilentObserver {}
