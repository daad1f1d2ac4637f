//! Gate and engine error types.

use thiserror::Error;

/// Errors raised by an agent engine while producing a step.
#[derive(Debug, Error)]
pub enum EngineError {
    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine answered with a non-success status.
    #[error("engine returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// A stream line could not be decoded.
    #[error("invalid engine output: {0}")]
    Decode(String),

    /// The engine reported a failure inside the step.
    #[error("engine failure: {0}")]
    Remote(String),

    /// The engine cannot accept the request.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that prevent a session from starting.
///
/// Once a session is running, failures end it with a status instead of
/// an error.
#[derive(Debug, Error)]
pub enum GateError {
    /// The initial task description was blank.
    #[error("initial prompt must not be empty")]
    EmptyPrompt,
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;
