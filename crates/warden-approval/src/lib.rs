//! Warden Approval - Operator decisions for proposed tool calls.
//!
//! This crate provides:
//! - [`OperatorDecision`]: Accept, Edit, Respond or Abort
//! - [`ResumeCommand`] / [`ResumePayload`]: the wire form sent back to the
//!   agent engine when it resumes
//! - [`DecisionSource`]: the async seam the approval gate prompts through
//! - [`DecisionPrompt`]: the interactive menu over an [`OperatorConsole`]
//! - [`RecordedDecisions`]: writes a `human_decision` audit record for
//!   every decision
//!
//! Invalid operator input never authorizes a tool. A malformed edit becomes
//! a Respond carrying [`INVALID_EDIT_MESSAGE`].

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod decision;
mod error;
mod prompt;
mod recorded;
mod resume;
mod source;

pub use decision::{
    ABORT_NOTICE, DecisionKind, EditedCall, INVALID_EDIT_MESSAGE, OperatorDecision, ProposalView,
};
pub use error::{DecisionError, DecisionResult};
pub use prompt::{DecisionPrompt, EDIT_PROMPT, MENU_ITEMS, MENU_TITLE, RESPONSE_PROMPT};
pub use recorded::{NO_PROPOSAL_CONTEXT, RecordedDecisions};
pub use resume::{ResumeCommand, ResumePayload};
pub use source::{DecisionSource, OperatorConsole};
