//! Interactive four-option decision menu.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::decision::{EditedCall, OperatorDecision, ProposalView};
use crate::error::DecisionResult;
use crate::source::{DecisionSource, OperatorConsole};

/// Menu title shown above the options.
pub const MENU_TITLE: &str = "Please choose an action";

/// Menu entries, in selection-index order.
pub const MENU_ITEMS: [&str; 4] = [
    "accept -> allow the tool to run as-is",
    "edit -> edit which tool/args to run",
    "response -> do NOT run tool, instead append a textual response to the agent",
    "abort -> stop the agent entirely",
];

/// Prompt used to read an edited call.
pub const EDIT_PROMPT: &str = "Enter new action as JSON, e.g. \
{\"action\": \"nmap_tool\", \"args\": {\"target\": \"10.0.0.5\", \"arguments\": \"-sV -p 1433\"}}: ";

/// Prompt used to read a textual response.
pub const RESPONSE_PROMPT: &str = "Enter textual response (this will NOT run the tool): ";

/// A [`DecisionSource`] that asks a human through an [`OperatorConsole`].
///
/// An unparseable edit degrades to a Respond carrying
/// [`INVALID_EDIT_MESSAGE`](crate::INVALID_EDIT_MESSAGE); nothing the
/// operator types is ever treated as Accept.
pub struct DecisionPrompt<C> {
    console: C,
}

impl<C: OperatorConsole> DecisionPrompt<C> {
    /// Wrap a console.
    #[must_use]
    pub fn new(console: C) -> Self {
        Self { console }
    }

    /// The wrapped console.
    pub fn console(&self) -> &C {
        &self.console
    }

    fn decide(&self, proposal: Option<&ProposalView>) -> DecisionResult<OperatorDecision> {
        self.console.show_proposal(proposal)?;
        let choice = self.console.select(MENU_TITLE, &MENU_ITEMS)?;
        debug!(choice, "Operator selected menu entry");

        let decision = match choice {
            0 => OperatorDecision::Accept,
            1 => self.read_edit()?,
            2 => OperatorDecision::Respond(self.console.read_line(RESPONSE_PROMPT)?),
            _ => OperatorDecision::Abort,
        };
        Ok(decision)
    }

    fn read_edit(&self) -> DecisionResult<OperatorDecision> {
        let raw = self.console.read_line(EDIT_PROMPT)?;
        match EditedCall::parse(&raw) {
            Some(call) => Ok(OperatorDecision::Edit(call)),
            None => {
                warn!("Operator edit was not a valid {{action, args}} object");
                self.console
                    .notify("Invalid edit; the tool will not run.")?;
                Ok(OperatorDecision::invalid_edit())
            },
        }
    }
}

#[async_trait]
impl<C: OperatorConsole> DecisionSource for DecisionPrompt<C> {
    async fn prompt(&self, proposal: Option<&ProposalView>) -> DecisionResult<OperatorDecision> {
        self.decide(proposal)
    }
}
