//! In-memory, transactional stand-in for a SQL Server.
//!
//! A [`MemoryDatabase`] holds named tables. Each [`MemoryQueryExecutor`]
//! works on a private copy between `begin` and `commit`/`rollback`, so
//! tests can compare committed state before and after a probe.
//!
//! Statements understood:
//! - handlers registered with [`MemoryDatabase::on`], matched on the
//!   whitespace-normalized, case-insensitive statement text
//! - `SELECT * FROM <table>`
//! - `DELETE FROM <table>`

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use warden_tools::database::INTENTS;
use warden_tools::{
    ConnectionTarget, QueryConnector, QueryExecutor, QueryRows, ToolError, ToolResult,
};

/// Table name to contents.
pub type Tables = BTreeMap<String, QueryRows>;

type Handler = Arc<dyn Fn(&mut Tables) -> ToolResult<QueryRows> + Send + Sync>;

/// Transaction counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Transactions opened.
    pub begins: usize,
    /// Transactions committed.
    pub commits: usize,
    /// Transactions rolled back.
    pub rollbacks: usize,
    /// Statements executed, in order.
    pub statements: Vec<String>,
}

#[derive(Default)]
struct Shared {
    tables: Tables,
    handlers: BTreeMap<String, Handler>,
    stats: MemoryStats,
}

/// Shared committed state. Clones refer to the same database.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryDatabase {
    /// An empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A database answering every built-in probe intent with canned rows.
    #[must_use]
    pub fn sql_server() -> Self {
        let canned: &[(&str, &[&str], Vec<Value>)] = &[
            ("check_version", &["full_version"], vec![
                "Microsoft SQL Server 2019 (RTM) - 15.0.2000.5".into(),
            ]),
            ("list_databases", &["name", "state_desc"], vec!["master".into(), "ONLINE".into()]),
            ("list_tables", &["TABLE_SCHEMA", "TABLE_NAME"], vec!["dbo".into(), "accounts".into()]),
            ("logins", &["principal_id", "name", "type_desc"], vec![
                1.into(),
                "sa".into(),
                "SQL_LOGIN".into(),
            ]),
            ("agent_jobs", &["job_id", "name", "enabled"], vec![
                "7f6c".into(),
                "nightly_backup".into(),
                1.into(),
            ]),
        ];

        let mut db = Self::new();
        for (intent, columns, row) in canned {
            let Some((_, queries)) = INTENTS.iter().find(|(name, _)| name == intent) else {
                continue;
            };
            for query in *queries {
                let rows = QueryRows {
                    columns: columns.iter().map(ToString::to_string).collect(),
                    rows: vec![row.clone()],
                };
                db = db.on(query, move |_| Ok(rows.clone()));
            }
        }
        db
    }

    /// Add or replace a table.
    #[must_use]
    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.lock().tables.insert(
            name.to_ascii_lowercase(),
            QueryRows {
                columns: columns.iter().map(ToString::to_string).collect(),
                rows,
            },
        );
        self
    }

    /// Answer `sql` with `handler`, which may change the tables.
    #[must_use]
    pub fn on<F>(self, sql: &str, handler: F) -> Self
    where
        F: Fn(&mut Tables) -> ToolResult<QueryRows> + Send + Sync + 'static,
    {
        self.lock().handlers.insert(normalize(sql), Arc::new(handler));
        self
    }

    /// Committed tables.
    #[must_use]
    pub fn snapshot(&self) -> Tables {
        self.lock().tables.clone()
    }

    /// Transaction counters.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        self.lock().stats.clone()
    }

    /// Open a connection.
    #[must_use]
    pub fn executor(&self) -> MemoryQueryExecutor {
        MemoryQueryExecutor {
            db: self.clone(),
            working: None,
        }
    }

    /// A connector handing out connections to this database.
    #[must_use]
    pub fn connector(&self, driver: &str) -> MemoryConnector {
        MemoryConnector {
            db: self.clone(),
            driver: driver.to_string(),
            failure: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, tables: &mut Tables, sql: &str, max_rows: usize) -> ToolResult<QueryRows> {
        let key = normalize(sql);
        let handler = {
            let mut shared = self.lock();
            shared.stats.statements.push(sql.to_string());
            shared.handlers.get(&key).cloned()
        };
        if let Some(handler) = handler {
            let mut rows = handler(tables)?;
            rows.rows.truncate(max_rows);
            return Ok(rows);
        }

        if let Some(table) = key.strip_prefix("select * from ") {
            let mut rows = tables
                .get(table)
                .cloned()
                .ok_or_else(|| ToolError::Driver(format!("Invalid object name '{table}'")))?;
            rows.rows.truncate(max_rows);
            return Ok(rows);
        }
        if let Some(table) = key.strip_prefix("delete from ") {
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| ToolError::Driver(format!("Invalid object name '{table}'")))?;
            rows.rows.clear();
            return Ok(QueryRows::default());
        }
        Err(ToolError::Driver(format!("unsupported statement: {sql}")))
    }
}

impl fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.lock();
        f.debug_struct("MemoryDatabase")
            .field("tables", &shared.tables.keys().collect::<Vec<_>>())
            .field("handlers", &shared.handlers.len())
            .field("stats", &shared.stats)
            .finish()
    }
}

/// One connection to a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryQueryExecutor {
    db: MemoryDatabase,
    working: Option<Tables>,
}

impl MemoryQueryExecutor {
    /// Whether a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.working.is_some()
    }
}

#[async_trait]
impl QueryExecutor for MemoryQueryExecutor {
    async fn begin(&mut self) -> ToolResult<()> {
        if self.working.is_some() {
            return Err(ToolError::Driver("transaction already open".into()));
        }
        let mut shared = self.db.lock();
        shared.stats.begins = shared.stats.begins.saturating_add(1);
        self.working = Some(shared.tables.clone());
        Ok(())
    }

    async fn execute(&mut self, sql: &str, max_rows: usize) -> ToolResult<QueryRows> {
        match self.working.as_mut() {
            Some(tables) => self.db.run(tables, sql, max_rows),
            None => {
                let mut tables = self.db.snapshot();
                let rows = self.db.run(&mut tables, sql, max_rows)?;
                self.db.lock().tables = tables;
                Ok(rows)
            },
        }
    }

    async fn commit(&mut self) -> ToolResult<()> {
        let tables = self
            .working
            .take()
            .ok_or_else(|| ToolError::Driver("no open transaction".into()))?;
        let mut shared = self.db.lock();
        shared.stats.commits = shared.stats.commits.saturating_add(1);
        shared.tables = tables;
        Ok(())
    }

    async fn rollback(&mut self) -> ToolResult<()> {
        if self.working.take().is_none() {
            return Err(ToolError::Driver("no open transaction".into()));
        }
        let mut shared = self.db.lock();
        shared.stats.rollbacks = shared.stats.rollbacks.saturating_add(1);
        Ok(())
    }

    async fn close(&mut self) -> ToolResult<()> {
        self.working = None;
        Ok(())
    }
}

/// [`QueryConnector`] over a [`MemoryDatabase`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    db: MemoryDatabase,
    driver: String,
    failure: Option<String>,
}

impl MemoryConnector {
    /// Make every connection attempt fail with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

#[async_trait]
impl QueryConnector for MemoryConnector {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    async fn connect(&self, _target: &ConnectionTarget) -> ToolResult<Box<dyn QueryExecutor>> {
        match &self.failure {
            Some(message) => Err(ToolError::Driver(message.clone())),
            None => Ok(Box::new(self.db.executor())),
        }
    }
}

fn normalize(sql: &str) -> String {
    sql.trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accounts() -> MemoryDatabase {
        MemoryDatabase::new().with_table(
            "accounts",
            &["id", "name"],
            vec![vec![json!(1), json!("alice")], vec![json!(2), json!("bob")]],
        )
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let db = accounts();
        let before = db.snapshot();
        let mut conn = db.executor();

        conn.begin().await.unwrap();
        conn.execute("DELETE FROM accounts", 10).await.unwrap();
        let inside = conn.execute("select * from accounts", 10).await.unwrap();
        assert!(inside.rows.is_empty());
        conn.rollback().await.unwrap();

        assert_eq!(db.snapshot(), before);
        assert_eq!(db.stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_commit_keeps_changes() {
        let db = accounts();
        let mut conn = db.executor();
        conn.begin().await.unwrap();
        conn.execute("DELETE FROM accounts;", 10).await.unwrap();
        conn.commit().await.unwrap();
        assert!(db.snapshot()["accounts"].rows.is_empty());
    }

    #[tokio::test]
    async fn test_canned_intents() {
        let db = MemoryDatabase::sql_server();
        let mut conn = db.executor();
        let rows = conn
            .execute("SELECT @@VERSION AS full_version", 10)
            .await
            .unwrap();
        assert_eq!(rows.columns, vec!["full_version"]);
        assert!(conn.execute("SELECT 1", 10).await.is_err());
    }
}
