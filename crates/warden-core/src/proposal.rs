//! Proposed actions - candidate tool invocations raised by the agent engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::phase::TOP_LEVEL_PROPOSER;
use crate::types::Timestamp;

/// Ordered mapping of parameter name to value.
///
/// Values may be primitives or nested structures. Insertion order is kept so
/// the operator sees arguments in the order the agent wrote them.
pub type ToolArgs = serde_json::Map<String, Value>;

/// Argument keys that name the asset under test, in lookup priority order.
const TARGET_KEYS: &[&str] = &["target", "host", "url", "hosts"];

/// A candidate tool invocation emitted by the agent engine.
///
/// Immutable once created; the approval gate consumes each one exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    /// Tool the agent wants to run.
    pub tool_name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: ToolArgs,
    /// Subagent/phase that raised the proposal, or `"top-level"`.
    #[serde(default = "default_proposer")]
    pub proposer: String,
    /// Free-text rationale supplied by the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the proposal was observed.
    #[serde(default)]
    pub raised_at: Timestamp,
}

fn default_proposer() -> String {
    TOP_LEVEL_PROPOSER.to_string()
}

impl ProposedAction {
    /// Create a proposal raised by the top-level agent.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, arguments: ToolArgs) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            proposer: default_proposer(),
            description: None,
            raised_at: Timestamp::now(),
        }
    }

    /// Attribute the proposal to a phase/subagent.
    #[must_use]
    pub fn with_proposer(mut self, proposer: impl Into<String>) -> Self {
        self.proposer = proposer.into();
        self
    }

    /// Attach the agent's rationale.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The host or asset this proposal is aimed at, if the arguments name one.
    #[must_use]
    pub fn target(&self) -> Option<String> {
        TARGET_KEYS.iter().find_map(|key| match self.arguments.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Array(items)) if !items.is_empty() => Some(
                items
                    .iter()
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        })
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let args = Value::Object(self.arguments.clone());
        format!("{}({args})", self.tool_name)
    }
}

impl fmt::Display for ProposedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.proposer, self.summary())
    }
}
