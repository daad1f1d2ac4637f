//! Common imports for implementing and using tool adapters.

pub use crate::{
    QueryConnector, QueryExecutor, ToolAdapter, ToolError, ToolOutput, ToolRegistry, ToolResult,
};
