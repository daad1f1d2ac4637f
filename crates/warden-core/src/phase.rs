//! Phase/subagent descriptors.
//!
//! A phase is a named stage of the task (recon, enumeration, ...) with its
//! own instructions and a restricted tool set. The roster is assembled once
//! at session start and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Proposer name used when the top-level agent raises a proposal itself.
pub const TOP_LEVEL_PROPOSER: &str = "top-level";

/// Static configuration for one phase/subagent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDescriptor {
    /// Phase name, as used in `ProposedAction::proposer`.
    pub name: String,
    /// Short description of the phase.
    #[serde(default)]
    pub description: String,
    /// Instructions handed to the subagent.
    #[serde(default)]
    pub prompt: String,
    /// Tools this phase may propose.
    #[serde(default)]
    pub allowed_tools: BTreeSet<String>,
}

impl PhaseDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        prompt: impl Into<String>,
        allowed_tools: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            prompt: prompt.into(),
            allowed_tools: allowed_tools.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this phase may propose `tool`.
    #[must_use]
    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_tools.contains(tool)
    }
}

/// The session's subagent roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRoster {
    phases: Vec<PhaseDescriptor>,
}

/// Result of checking a proposal against the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterCheck {
    /// The proposer may use the tool.
    Permitted,
    /// The proposer is a known phase whose tool set excludes the tool.
    ToolNotAllowed {
        /// Phase that raised the proposal.
        phase: String,
    },
    /// The proposer is not a phase in the roster.
    UnknownPhase {
        /// Name given by the engine.
        phase: String,
    },
}

impl PhaseRoster {
    /// Build a roster from descriptors.
    #[must_use]
    pub fn new(phases: Vec<PhaseDescriptor>) -> Self {
        Self { phases }
    }

    /// Look up a phase by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PhaseDescriptor> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// All phases, in declaration order.
    #[must_use]
    pub fn phases(&self) -> &[PhaseDescriptor] {
        &self.phases
    }

    /// Number of phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Union of every phase's tool set.
    #[must_use]
    pub fn all_tools(&self) -> BTreeSet<String> {
        self.phases
            .iter()
            .flat_map(|p| p.allowed_tools.iter().cloned())
            .collect()
    }

    /// Check whether `proposer` may propose `tool`.
    ///
    /// The top-level agent and an empty roster impose no restriction.
    #[must_use]
    pub fn check(&self, proposer: &str, tool: &str) -> RosterCheck {
        if self.phases.is_empty() || proposer == TOP_LEVEL_PROPOSER {
            return RosterCheck::Permitted;
        }
        match self.get(proposer) {
            Some(phase) if phase.allows(tool) => RosterCheck::Permitted,
            Some(phase) => RosterCheck::ToolNotAllowed {
                phase: phase.name.clone(),
            },
            None => RosterCheck::UnknownPhase {
                phase: proposer.to_string(),
            },
        }
    }
}
