use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::ToolResult;

/// Where and how to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Server host.
    pub host: String,
    /// Server port; driver default when unset.
    pub port: Option<u16>,
    /// Login name.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Initial database.
    pub database: String,
    /// Use integrated authentication.
    pub trusted_connection: bool,
}

impl ConnectionTarget {
    /// `host` or `host,port`, as SQL Server spells it.
    #[must_use]
    pub fn server(&self) -> String {
        match self.port {
            Some(port) => format!("{},{port}", self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("trusted_connection", &self.trusted_connection)
            .finish()
    }
}

/// Columns and rows returned by one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    /// Column names.
    pub columns: Vec<String>,
    /// Row values in column order.
    pub rows: Vec<Vec<Value>>,
}

/// An open connection able to run statements in a transaction.
#[async_trait]
pub trait QueryExecutor: Send {
    /// Start a transaction.
    async fn begin(&mut self) -> ToolResult<()>;

    /// Run one statement, fetching at most `max_rows` rows.
    async fn execute(&mut self, sql: &str, max_rows: usize) -> ToolResult<QueryRows>;

    /// Make the transaction's effects permanent.
    async fn commit(&mut self) -> ToolResult<()>;

    /// Discard the transaction's effects.
    async fn rollback(&mut self) -> ToolResult<()>;

    /// Close the connection.
    async fn close(&mut self) -> ToolResult<()>;
}

/// A database driver.
///
/// Concrete SQL Server drivers live outside this crate; the probe tries the
/// registered connectors in order.
#[async_trait]
pub trait QueryConnector: Send + Sync {
    /// Driver name reported in the probe output.
    fn driver_name(&self) -> &str;

    /// Open a connection.
    async fn connect(&self, target: &ConnectionTarget) -> ToolResult<Box<dyn QueryExecutor>>;
}
