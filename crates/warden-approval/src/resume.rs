//! The resume protocol: how operator decisions are sent back to the engine.

use serde::{Deserialize, Serialize};

use crate::decision::EditedCall;

/// One resume entry, tagged by `type`.
///
/// ```json
/// {"type": "accept"}
/// {"type": "edit", "args": {"action": "nmap_tool", "args": {"target": "10.0.0.5"}}}
/// {"type": "response", "args": "skip this host"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum ResumeCommand {
    /// Run the proposal as-is.
    Accept,
    /// Run a replacement call.
    Edit(EditedCall),
    /// Do not run the tool; return this text to the agent.
    Response(String),
}

/// Resume data for one interrupt: one command per surfaced proposal, in
/// the order the proposals were shown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumePayload(pub Vec<ResumeCommand>);

impl ResumePayload {
    /// An empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the command for the next proposal.
    pub fn push(&mut self, command: ResumeCommand) {
        self.0.push(command);
    }

    /// Number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no commands were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the commands in order.
    pub fn iter(&self) -> impl Iterator<Item = &ResumeCommand> {
        self.0.iter()
    }
}

impl FromIterator<ResumeCommand> for ResumePayload {
    fn from_iter<I: IntoIterator<Item = ResumeCommand>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
