//! Warden Tools - Adapters for the side-effecting tools an agent proposes.
//!
//! This crate provides:
//! - [`ToolAdapter`] and [`ToolRegistry`]
//! - [`ToolOutput`], the `{success, ...fields, error?}` result every adapter returns
//! - [`ProcessRunner`]: subprocess execution with a timeout and output caps
//! - [`NmapTool`] (network scanner) and [`SqlmapTool`] (injection tester),
//!   both stripping blocked flags at the process boundary
//! - [`DatabaseProbeTool`]: validated, always-rolled-back SQL Server queries
//!   behind the [`QueryConnector`]/[`QueryExecutor`] driver traits
//! - [`CredentialCheckTool`]: one username/password pair per call, port checked first
//! - [`ReportWriterTool`]: report files confined to one directory
//!
//! Adapters are only reached through the approval gate's broker.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod adapter;
mod args;
pub mod database;
mod error;
mod nmap;
mod output;
mod process;
mod report;
mod sqlmap;
mod standard;

pub use adapter::{ToolAdapter, ToolDefinition, ToolRegistry};
pub use database::{
    CREDENTIAL_CHECK_TOOL_NAME, ConnectionTarget, CredentialCheckTool, DATABASE_PROBE_TOOL_NAME,
    DatabaseProbeTool, QueryConnector, QueryExecutor, QueryOutcome, QueryRows,
    SandboxedQueryRunner,
};
pub use error::{ToolError, ToolResult};
pub use nmap::{NMAP_TOOL_NAME, NmapTool};
pub use output::ToolOutput;
pub use process::{MAX_TIMEOUT_SECS, ProcessOutput, ProcessRunner, locate_binary};
pub use report::{REPORT_WRITER_TOOL_NAME, ReportWriterTool};
pub use sqlmap::{SQLMAP_TOOL_NAME, SqlmapTool};
pub use standard::standard_registry;
