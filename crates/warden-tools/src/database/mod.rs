//! Database probe: intent-driven and agent-written read queries against a
//! target SQL Server, executed inside a transaction that is rolled back.
//! Also hosts the single-pair credential check.

mod connection;
mod credentials;
mod intents;
mod probe;
mod sandbox;

pub use connection::{ConnectionTarget, QueryConnector, QueryExecutor, QueryRows};
pub use credentials::{CREDENTIAL_CHECK_TOOL_NAME, CredentialCheckTool, DEFAULT_MSSQL_PORT};
pub use intents::{INTENTS, intent_queries};
pub use probe::{DATABASE_PROBE_TOOL_NAME, DEFAULT_DATABASE, DatabaseProbeTool};
pub use sandbox::{QueryOutcome, SandboxedQueryRunner};
