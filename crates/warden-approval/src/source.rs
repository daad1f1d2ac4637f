//! Decision sources and the console seam they prompt through.

use async_trait::async_trait;

use crate::decision::{OperatorDecision, ProposalView};
use crate::error::DecisionResult;

/// Produces one operator decision per surfaced proposal.
///
/// The gate awaits each call before doing anything else; there is no
/// timeout and no default decision.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Resolve a proposal.
    ///
    /// `None` means the interrupt carried no recognizable proposal; the
    /// operator still decides.
    ///
    /// # Errors
    ///
    /// [`DecisionError::Interrupted`](crate::DecisionError::Interrupted) if
    /// the operator pressed Ctrl-C, or an I/O error from the console.
    async fn prompt(&self, proposal: Option<&ProposalView>) -> DecisionResult<OperatorDecision>;
}

#[async_trait]
impl<T: DecisionSource + ?Sized> DecisionSource for std::sync::Arc<T> {
    async fn prompt(&self, proposal: Option<&ProposalView>) -> DecisionResult<OperatorDecision> {
        (**self).prompt(proposal).await
    }
}

/// Terminal primitives used by [`DecisionPrompt`](crate::DecisionPrompt).
///
/// The CLI implements this with `dialoguer`; tests script it.
pub trait OperatorConsole: Send + Sync {
    /// Render a proposal and its findings before the menu.
    ///
    /// # Errors
    ///
    /// Returns an error if the console cannot be written.
    fn show_proposal(&self, proposal: Option<&ProposalView>) -> std::io::Result<()>;

    /// Let the operator pick one of `items`; returns its index.
    ///
    /// # Errors
    ///
    /// Returns an error if the console cannot be read.
    fn select(&self, title: &str, items: &[&str]) -> std::io::Result<usize>;

    /// Read one line of free text.
    ///
    /// # Errors
    ///
    /// Returns an error if the console cannot be read.
    fn read_line(&self, prompt: &str) -> std::io::Result<String>;

    /// Show a short notice.
    ///
    /// # Errors
    ///
    /// Returns an error if the console cannot be written.
    fn notify(&self, message: &str) -> std::io::Result<()>;
}
