use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::connection::{QueryExecutor, QueryRows};
use crate::error::ToolError;

/// Result of one sandboxed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    /// The statement returned rows.
    Rows(QueryRows),
    /// The statement failed.
    Failed {
        /// Driver error text.
        error: String,
    },
}

impl QueryOutcome {
    fn failed(err: &ToolError) -> Self {
        Self::Failed {
            error: err.to_string(),
        }
    }
}

/// Runs statements inside a transaction that is rolled back afterwards.
///
/// Every run is `begin → execute → rollback`, whatever the statement did
/// and whether it failed. Only a runner built with
/// [`persist`](Self::persist) commits instead.
pub struct SandboxedQueryRunner<'a> {
    executor: &'a mut dyn QueryExecutor,
    max_rows: usize,
    timeout: Duration,
    persist: bool,
}

impl<'a> SandboxedQueryRunner<'a> {
    /// A rolling-back runner over `executor`.
    pub fn new(executor: &'a mut dyn QueryExecutor, max_rows: usize, timeout: Duration) -> Self {
        Self {
            executor,
            max_rows,
            timeout,
            persist: false,
        }
    }

    /// Commit instead of rolling back.
    #[must_use]
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Whether this runner commits.
    #[must_use]
    pub fn persists(&self) -> bool {
        self.persist
    }

    /// Run one statement.
    pub async fn run(&mut self, sql: &str) -> QueryOutcome {
        if let Err(e) = self.executor.begin().await {
            warn!(error = %e, "Failed to open sandbox transaction");
            return QueryOutcome::failed(&e);
        }

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.executor.execute(sql, self.max_rows),
        )
        .await
        {
            Ok(Ok(mut rows)) => {
                rows.rows.truncate(self.max_rows);
                QueryOutcome::Rows(rows)
            },
            Ok(Err(e)) => QueryOutcome::failed(&e),
            Err(_) => QueryOutcome::failed(&ToolError::Timeout(self.timeout.as_secs())),
        };

        let finish = if self.persist {
            self.executor.commit().await
        } else {
            self.executor.rollback().await
        };
        match finish {
            Ok(()) => debug!(persist = self.persist, "Sandbox transaction finished"),
            Err(e) => warn!(error = %e, persist = self.persist, "Failed to finish sandbox transaction"),
        }
        outcome
    }
}
