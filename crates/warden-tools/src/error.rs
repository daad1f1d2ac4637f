//! Adapter-internal errors.
//!
//! These never cross the adapter boundary: [`ToolAdapter::call`](crate::ToolAdapter::call)
//! converts them into a failed [`ToolOutput`](crate::ToolOutput).

use thiserror::Error;

/// Tool execution errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments were missing or had the wrong shape.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The external binary could not be located.
    #[error("{0}")]
    BinaryNotFound(String),

    /// The process could not be started.
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The process outlived its timeout and was killed.
    #[error("timeout after {0}s")]
    Timeout(u64),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Argument text could not be split.
    #[error("unparseable arguments: {0}")]
    Split(#[from] warden_safety::SafetyError),

    /// A database driver failed.
    #[error("{0}")]
    Driver(String),
}

/// Result type for adapter internals.
pub type ToolResult<T> = Result<T, ToolError>;
