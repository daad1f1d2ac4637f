//! Session lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an approval gate session.
///
/// `Running` and `AwaitingDecision` alternate while the agent works;
/// the remaining three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The agent engine is advancing a step.
    Running,
    /// A proposal is waiting on the operator.
    AwaitingDecision,
    /// The agent finished with no further tool proposals.
    Completed,
    /// The operator stopped the session.
    Aborted,
    /// The session ended on an unrecoverable failure.
    Errored,
}

impl SessionStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Errored)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Running => next != Self::Running,
            Self::AwaitingDecision => matches!(
                next,
                Self::Running | Self::Aborted | Self::Errored | Self::Completed
            ),
            Self::Completed | Self::Aborted | Self::Errored => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::AwaitingDecision => "awaiting_decision",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Errored => "errored",
        };
        f.write_str(label)
    }
}
