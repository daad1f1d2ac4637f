//! Operator decisions and the proposal view they resolve.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use warden_core::{ProposedAction, ToolArgs};
use warden_safety::SafetyVerdict;

use crate::resume::ResumeCommand;

/// Message sent to the engine when an edit could not be parsed.
pub const INVALID_EDIT_MESSAGE: &str = "Operator provided invalid edit; aborting tool call.";

/// Message sent to the engine when the operator aborts.
pub const ABORT_NOTICE: &str = "Operator aborted the test run.";

/// The four ways an operator can resolve a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Run the tool as proposed.
    Accept,
    /// Run a replacement tool call.
    Edit,
    /// Do not run the tool; reply with text.
    Respond,
    /// Stop the session.
    Abort,
}

impl DecisionKind {
    /// Label used in audit records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Edit => "edit",
            Self::Respond => "respond",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A replacement tool call supplied on Edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditedCall {
    /// Tool to run instead.
    pub action: String,
    /// Arguments for that tool.
    pub args: ToolArgs,
}

impl EditedCall {
    /// Parse operator-typed JSON.
    ///
    /// Returns `None` unless the text is a JSON object with a string
    /// `action` and an object `args`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw.trim()).ok()?;
        let object = value.as_object()?;
        let action = object.get("action")?.as_str()?.trim();
        let args = object.get("args")?.as_object()?.clone();
        if action.is_empty() {
            return None;
        }
        Some(Self {
            action: action.to_owned(),
            args,
        })
    }
}

/// The operator's resolution of one proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorDecision {
    /// Run the tool as proposed.
    Accept,
    /// Run the given call instead.
    Edit(EditedCall),
    /// Do not run the tool; send this text to the engine.
    Respond(String),
    /// Send [`ABORT_NOTICE`] and stop after this step.
    Abort,
}

impl OperatorDecision {
    /// The decision kind.
    #[must_use]
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Accept => DecisionKind::Accept,
            Self::Edit(_) => DecisionKind::Edit,
            Self::Respond(_) => DecisionKind::Respond,
            Self::Abort => DecisionKind::Abort,
        }
    }

    /// The degraded decision for an unusable edit.
    #[must_use]
    pub fn invalid_edit() -> Self {
        Self::Respond(INVALID_EDIT_MESSAGE.to_owned())
    }

    /// Whether this decision lets a tool run.
    #[must_use]
    pub fn authorizes_tool(&self) -> bool {
        matches!(self, Self::Accept | Self::Edit(_))
    }

    /// Whether the gate must stop after this step.
    #[must_use]
    pub fn stops_session(&self) -> bool {
        matches!(self, Self::Abort)
    }

    /// The wire command that resumes the engine.
    #[must_use]
    pub fn to_resume_command(&self) -> ResumeCommand {
        match self {
            Self::Accept => ResumeCommand::Accept,
            Self::Edit(call) => ResumeCommand::Edit(call.clone()),
            Self::Respond(text) => ResumeCommand::Response(text.clone()),
            Self::Abort => ResumeCommand::Response(ABORT_NOTICE.to_owned()),
        }
    }

    /// Decision-specific audit details.
    #[must_use]
    pub fn payload_value(&self) -> Value {
        match self {
            Self::Accept | Self::Abort => Value::Null,
            Self::Edit(call) => serde_json::to_value(call).unwrap_or(Value::Null),
            Self::Respond(text) => Value::String(text.clone()),
        }
    }
}

impl fmt::Display for OperatorDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edit(call) => write!(f, "edit -> {}", call.action),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// A proposal as shown to the operator, with its pre-screening results.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalView {
    /// The proposed call.
    pub action: ProposedAction,
    /// Verdicts for any SQL or flag text in the arguments.
    pub verdicts: Vec<SafetyVerdict>,
    /// Set when the proposer's phase may not use this tool.
    pub roster_warning: Option<String>,
}

impl ProposalView {
    /// A view with no findings.
    #[must_use]
    pub fn new(action: ProposedAction) -> Self {
        Self {
            action,
            verdicts: Vec::new(),
            roster_warning: None,
        }
    }

    /// Attach safety verdicts.
    #[must_use]
    pub fn with_verdicts(mut self, verdicts: Vec<SafetyVerdict>) -> Self {
        self.verdicts = verdicts;
        self
    }

    /// Attach a roster warning.
    #[must_use]
    pub fn with_roster_warning(mut self, warning: Option<String>) -> Self {
        self.roster_warning = warning;
        self
    }

    /// Verdicts that found a problem.
    pub fn unsafe_verdicts(&self) -> impl Iterator<Item = &SafetyVerdict> {
        self.verdicts.iter().filter(|v| !v.is_safe)
    }

    /// Whether any finding should be highlighted.
    #[must_use]
    pub fn has_findings(&self) -> bool {
        self.roster_warning.is_some() || self.unsafe_verdicts().next().is_some()
    }
}
