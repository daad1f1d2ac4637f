//! Common imports for working with operator decisions.

pub use crate::{
    DecisionError, DecisionPrompt, DecisionResult, DecisionSource, EditedCall, OperatorConsole,
    OperatorDecision, ProposalView, RecordedDecisions, ResumeCommand, ResumePayload,
};
