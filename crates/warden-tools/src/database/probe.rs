use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use warden_audit::AuditLog;
use warden_config::DatabaseProbeConfig;
use warden_core::ToolArgs;
use warden_safety::SqlValidator;

use super::connection::{ConnectionTarget, QueryConnector, QueryExecutor};
use super::intents::intent_queries;
use super::sandbox::SandboxedQueryRunner;
use crate::adapter::ToolAdapter;
use crate::args::{optional_bool, optional_str, optional_u64, required_str, string_list};
use crate::error::{ToolError, ToolResult};
use crate::output::ToolOutput;

/// Registered name of the database probe.
pub const DATABASE_PROBE_TOOL_NAME: &str = "mssql_agent_tool";

/// Database used when the call names none.
pub const DEFAULT_DATABASE: &str = "master";

const DRY_RUN_NOTE: &str = "dry_run - not executed";
const AGENT_SQL_BLOCKED: &str = "agent-supplied SQL blocked (allow_agent_sql=false)";

/// One validated statement and its output record.
struct Statement {
    query: String,
    record: Map<String, Value>,
    execute: bool,
}

/// What a single call asked for, after applying configured limits.
struct ProbeRequest {
    target: ConnectionTarget,
    intents: Vec<String>,
    custom_queries: Vec<String>,
    allow_agent_sql: bool,
    dry_run: bool,
    max_rows: usize,
    preferred_driver: Option<String>,
}

/// Read-only SQL Server inspection.
///
/// Every query is validated first; unsafe text is never executed. Safe
/// text runs through a [`SandboxedQueryRunner`] that always rolls back.
/// Agent-written SQL additionally needs both the configuration and the
/// call to set `allow_agent_sql`.
pub struct DatabaseProbeTool {
    connectors: Vec<Arc<dyn QueryConnector>>,
    validator: SqlValidator,
    settings: DatabaseProbeConfig,
    audit: Option<Arc<AuditLog>>,
}

impl DatabaseProbeTool {
    /// A probe with no drivers registered.
    #[must_use]
    pub fn new(settings: DatabaseProbeConfig, validator: SqlValidator) -> Self {
        Self {
            connectors: Vec::new(),
            validator,
            settings,
            audit: None,
        }
    }

    /// Add a driver; drivers are tried in registration order.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn QueryConnector>) -> Self {
        self.connectors.push(connector);
        self
    }

    /// Record executed queries in `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    fn parse_request(&self, args: &ToolArgs) -> ToolResult<ProbeRequest> {
        let port = optional_u64(args, "port")?
            .map(u16::try_from)
            .transpose()
            .map_err(|_| ToolError::InvalidArguments("port must be at most 65535".into()))?;
        let target = ConnectionTarget {
            host: required_str(args, "host")?.to_string(),
            port,
            username: optional_str(args, "username").map(ToString::to_string),
            password: optional_str(args, "password").map(ToString::to_string),
            database: optional_str(args, "database")
                .unwrap_or(DEFAULT_DATABASE)
                .to_string(),
            trusted_connection: optional_bool(args, "trusted_connection")?.unwrap_or(false),
        };
        let requested_rows = optional_u64(args, "max_rows")?
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(self.settings.max_rows);

        Ok(ProbeRequest {
            target,
            intents: string_list(args, "intents")?,
            custom_queries: string_list(args, "custom_queries")?,
            allow_agent_sql: self.settings.allow_agent_sql
                && optional_bool(args, "allow_agent_sql")?.unwrap_or(false),
            dry_run: optional_bool(args, "dry_run")?.unwrap_or(self.settings.dry_run),
            max_rows: requested_rows.min(self.settings.max_rows),
            preferred_driver: optional_str(args, "preferred_driver")
                .filter(|d| !d.eq_ignore_ascii_case("auto"))
                .map(ToString::to_string),
        })
    }

    fn statement(&self, query: &str, dry_run: bool, mut record: Map<String, Value>) -> Statement {
        let verdict = self.validator.validate(query);
        record.insert("query".into(), query.into());
        record.insert("validated".into(), verdict.is_safe.into());
        record.insert("reasons".into(), json!(verdict.reasons));
        if verdict.is_safe && dry_run {
            record.insert("note".into(), DRY_RUN_NOTE.into());
        }
        Statement {
            query: query.to_string(),
            execute: verdict.is_safe && !dry_run,
            record,
        }
    }

    fn plan(&self, request: &ProbeRequest, planned: &mut Vec<Value>, errors: &mut Vec<String>) -> Vec<Statement> {
        let mut statements = Vec::new();

        for intent in &request.intents {
            let Some(queries) = intent_queries(intent) else {
                planned.push(json!({"intent": intent, "queries": [], "note": "unknown intent"}));
                continue;
            };
            planned.push(json!({"intent": intent, "queries": queries}));
            for query in queries {
                let mut record = Map::new();
                record.insert("intent".into(), intent.clone().into());
                statements.push(self.statement(query, request.dry_run, record));
            }
        }

        if !request.custom_queries.is_empty() {
            if request.allow_agent_sql {
                for query in &request.custom_queries {
                    let mut statement = self.statement(query, request.dry_run, Map::new());
                    let allowed = statement.record.get("validated") == Some(&Value::Bool(true));
                    statement.record.insert("allowed".into(), allowed.into());
                    statements.push(statement);
                }
            } else {
                errors.push(AGENT_SQL_BLOCKED.to_string());
            }
        }
        statements
    }

    async fn connect(
        &self,
        request: &ProbeRequest,
        errors: &mut Vec<String>,
    ) -> Option<(String, Box<dyn QueryExecutor>)> {
        let candidates: Vec<_> = self
            .connectors
            .iter()
            .filter(|c| {
                request
                    .preferred_driver
                    .as_deref()
                    .is_none_or(|p| c.driver_name().eq_ignore_ascii_case(p))
            })
            .collect();
        if candidates.is_empty() {
            errors.push(match &request.preferred_driver {
                Some(p) => format!("driver '{p}' not available"),
                None => "no database driver available".to_string(),
            });
            return None;
        }

        for connector in candidates {
            match connector.connect(&request.target).await {
                Ok(executor) => return Some((connector.driver_name().to_string(), executor)),
                Err(e) => errors.push(format!("{} connection failed: {e}", connector.driver_name())),
            }
        }
        None
    }

    async fn probe(&self, args: &ToolArgs) -> ToolResult<ToolOutput> {
        let request = self.parse_request(args)?;
        let mut planned = Vec::new();
        let mut errors = Vec::new();
        let mut statements = self.plan(&request, &mut planned, &mut errors);

        let mut output = ToolOutput::success(Map::new())
            .with_field("connection", "REDACTED")
            .with_field("connection_driver", Value::Null);

        if statements.iter().any(|s| s.execute) {
            let Some((driver, mut executor)) = self.connect(&request, &mut errors).await else {
                return Ok(ToolOutput::failure(
                    "failed to connect using available drivers",
                )
                .with_field("details", errors));
            };
            info!(driver = %driver, server = %request.target.server(), "Connected to database");
            output = output
                .with_field("connection", format!("{driver}://{}", request.target.server()))
                .with_field("connection_driver", driver);

            let timeout = Duration::from_secs(self.settings.timeout_secs);
            let mut runner = SandboxedQueryRunner::new(executor.as_mut(), request.max_rows, timeout);
            for statement in statements.iter_mut().filter(|s| s.execute) {
                let outcome = runner.run(&statement.query).await;
                if let Some(audit) = &self.audit {
                    audit.log_database_query(
                        &statement.query,
                        &request.target.database,
                        Some(&request.target.host),
                        !runner.persists(),
                    );
                }
                statement.record.insert(
                    "result".into(),
                    serde_json::to_value(&outcome).unwrap_or(Value::Null),
                );
            }
            if let Err(e) = executor.close().await {
                warn!(error = %e, "Failed to close database connection");
            }
        }

        let executed: Vec<Value> = statements
            .into_iter()
            .map(|s| Value::Object(s.record))
            .collect();
        Ok(output
            .with_field("dry_run", request.dry_run)
            .with_field("planned", planned)
            .with_field("executed", executed)
            .with_field("errors", errors))
    }
}

impl std::fmt::Debug for DatabaseProbeTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseProbeTool")
            .field(
                "connectors",
                &self.connectors.iter().map(|c| c.driver_name()).collect::<Vec<_>>(),
            )
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ToolAdapter for DatabaseProbeTool {
    fn name(&self) -> &'static str {
        DATABASE_PROBE_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Inspect a SQL Server instance through named intents (check_version, list_databases, \
         list_tables, logins, agent_jobs) or validated read-only SQL. Every query is rolled back."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "host": {"type": "string"},
                "port": {"type": "integer"},
                "username": {"type": "string"},
                "password": {"type": "string"},
                "database": {"type": "string", "default": DEFAULT_DATABASE},
                "trusted_connection": {"type": "boolean"},
                "intents": {"type": "array", "items": {"type": "string"}},
                "custom_queries": {"type": "array", "items": {"type": "string"}},
                "allow_agent_sql": {"type": "boolean"},
                "dry_run": {"type": "boolean"},
                "max_rows": {"type": "integer"},
                "preferred_driver": {"type": "string", "default": "auto"}
            },
            "required": ["host"]
        })
    }

    async fn call(&self, args: &ToolArgs) -> ToolOutput {
        self.probe(args).await.unwrap_or_else(ToolOutput::from)
    }
}
