//! Safety-related error types.

use thiserror::Error;

/// Errors raised while preparing text for validation or checking targets.
///
/// Validation itself never fails; an unsafe input is a
/// [`SafetyVerdict`](crate::SafetyVerdict), not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyError {
    /// An argument string ended inside a quoted section.
    #[error("unterminated {quote} quote in argument string")]
    UnterminatedQuote {
        /// The quote character left open.
        quote: char,
    },

    /// An argument string ended with a dangling escape.
    #[error("argument string ends with a trailing backslash")]
    TrailingEscape,

    /// A target is neither an address, a CIDR range nor a URL.
    #[error("invalid target '{0}': expected an IP address, CIDR range or URL")]
    InvalidTarget(String),
}

/// Result type for safety operations.
pub type SafetyResult<T> = Result<T, SafetyError>;
