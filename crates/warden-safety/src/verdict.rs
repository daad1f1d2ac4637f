//! The safe/unsafe classification of one piece of text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of validating a single command or query string.
///
/// `is_safe` holds exactly when `reasons` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    /// The raw text that was inspected.
    pub subject: String,
    /// Whether the text may be executed.
    pub is_safe: bool,
    /// Ordered violation descriptions.
    pub reasons: Vec<String>,
}

impl SafetyVerdict {
    /// Build a verdict from the violations found.
    #[must_use]
    pub fn from_reasons(subject: impl Into<String>, reasons: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            is_safe: reasons.is_empty(),
            reasons,
        }
    }

    /// A verdict with no violations.
    #[must_use]
    pub fn safe(subject: impl Into<String>) -> Self {
        Self::from_reasons(subject, Vec::new())
    }

    /// A verdict with a single violation.
    #[must_use]
    pub fn rejected(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::from_reasons(subject, vec![reason.into()])
    }
}

impl fmt::Display for SafetyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_safe {
            write!(f, "safe")
        } else {
            write!(f, "unsafe: {}", self.reasons.join("; "))
        }
    }
}
