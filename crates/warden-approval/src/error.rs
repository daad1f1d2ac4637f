//! Decision error types.

use thiserror::Error;

/// Errors that prevent a decision source from producing a decision.
///
/// Malformed operator input is not an error: it degrades to a safe
/// [`OperatorDecision::Respond`](crate::OperatorDecision::Respond).
#[derive(Debug, Error)]
pub enum DecisionError {
    /// The operator interrupted the prompt (Ctrl-C).
    #[error("operator interrupted the decision prompt")]
    Interrupted,

    /// The console could not be read or written.
    #[error("operator console error: {0}")]
    Io(#[source] std::io::Error),

    /// A scripted source ran out of decisions.
    #[error("decision source exhausted: {0}")]
    Exhausted(String),
}

impl From<std::io::Error> for DecisionError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::Interrupted {
            Self::Interrupted
        } else {
            Self::Io(err)
        }
    }
}

/// Result type for decision operations.
pub type DecisionResult<T> = Result<T, DecisionError>;
