use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{info, warn};
use warden_audit::AuditLog;
use warden_core::ToolArgs;

use super::connection::{ConnectionTarget, QueryConnector};
use super::DEFAULT_DATABASE;
use crate::adapter::ToolAdapter;
use crate::args::{optional_str, optional_u64, required_str};
use crate::error::{ToolError, ToolResult};
use crate::output::ToolOutput;

/// Registered name of the credential check.
pub const CREDENTIAL_CHECK_TOOL_NAME: &str = "mssql_check_credentials";

/// SQL Server's default port.
pub const DEFAULT_MSSQL_PORT: u16 = 1433;

const DEFAULT_TIMEOUT_SECS: u64 = 5;
const MAX_PORT_CHECK_SECS: u64 = 3;
const MAX_TIMEOUT_SECS: u64 = 60;

struct CredentialRequest {
    target: ConnectionTarget,
    port: u16,
    timeout: Duration,
    preferred_driver: Option<String>,
}

/// Checks exactly one username/password pair against a SQL Server.
///
/// The port is checked first; only then is the pair handed to a driver,
/// which must log in and answer `SELECT 1`. Every attempt that reaches a
/// driver is recorded as a `credential_access` event. Lists of usernames or
/// passwords are refused.
pub struct CredentialCheckTool {
    connectors: Vec<Arc<dyn QueryConnector>>,
    audit: Option<Arc<AuditLog>>,
}

impl CredentialCheckTool {
    /// A check with no drivers registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connectors: Vec::new(),
            audit: None,
        }
    }

    /// Add a driver; drivers are tried in registration order.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn QueryConnector>) -> Self {
        self.connectors.push(connector);
        self
    }

    /// Record attempts in `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    fn parse_request(args: &ToolArgs) -> ToolResult<CredentialRequest> {
        for key in ["username", "password"] {
            if args.get(key).is_some_and(Value::is_array) {
                return Err(ToolError::InvalidArguments(format!(
                    "{key} must be a single value; only one pair is checked per call"
                )));
            }
        }

        let host = required_str(args, "host")?.to_string();
        let username = required_str(args, "username")?.to_string();
        let password = args
            .get("password")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let port = optional_u64(args, "port")?
            .map(u16::try_from)
            .transpose()
            .map_err(|_| ToolError::InvalidArguments("port must be at most 65535".into()))?
            .unwrap_or(DEFAULT_MSSQL_PORT);
        let timeout_secs = optional_u64(args, "timeout")?
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS);

        Ok(CredentialRequest {
            target: ConnectionTarget {
                host,
                port: Some(port),
                username: Some(username),
                password: Some(password),
                database: optional_str(args, "database")
                    .unwrap_or(DEFAULT_DATABASE)
                    .to_string(),
                trusted_connection: false,
            },
            port,
            timeout: Duration::from_secs(timeout_secs),
            preferred_driver: optional_str(args, "preferred_driver")
                .filter(|d| !d.eq_ignore_ascii_case("auto"))
                .map(ToString::to_string),
        })
    }

    async fn port_open(host: &str, port: u16, timeout: Duration) -> bool {
        let limit = timeout.min(Duration::from_secs(MAX_PORT_CHECK_SECS));
        matches!(
            tokio::time::timeout(limit, TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        )
    }

    /// Log in with one driver and run `SELECT 1`.
    async fn attempt(
        connector: &dyn QueryConnector,
        target: &ConnectionTarget,
        timeout: Duration,
    ) -> ToolResult<()> {
        let login = async {
            let mut executor = connector.connect(target).await?;
            let result = executor.execute("SELECT 1", 1).await;
            if let Err(e) = executor.close().await {
                warn!(error = %e, "Failed to close credential check connection");
            }
            result.map(|_| ())
        };
        tokio::time::timeout(timeout, login)
            .await
            .map_err(|_| ToolError::Timeout(timeout.as_secs()))?
    }

    fn record(&self, request: &CredentialRequest, driver: Option<&str>, success: bool) {
        let Some(audit) = &self.audit else {
            return;
        };
        let mut details = Map::new();
        details.insert("port".into(), request.port.into());
        details.insert("database".into(), request.target.database.clone().into());
        details.insert("driver".into(), driver.map_or(Value::Null, Value::from));
        audit.log_credential_access(
            request.target.username.as_deref().unwrap_or_default(),
            &request.target.host,
            success,
            details,
        );
    }

    async fn check(&self, args: &ToolArgs) -> ToolResult<ToolOutput> {
        let request = Self::parse_request(args)?;
        let host = &request.target.host;

        if !Self::port_open(host, request.port, request.timeout).await {
            return Ok(ToolOutput::failure(format!(
                "TCP connection to {host}:{} failed or port closed",
                request.port
            )));
        }

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
            return Ok(ToolOutput::failure(match &request.preferred_driver {
                Some(p) => format!("driver '{p}' not available"),
                None => "no database driver available".to_string(),
            }));
        }

        let mut errors = Vec::new();
        for connector in candidates {
            let driver = connector.driver_name();
            match Self::attempt(connector.as_ref(), &request.target, request.timeout).await {
                Ok(()) => {
                    info!(driver, host = %host, port = request.port, "Credential check succeeded");
                    self.record(&request, Some(driver), true);
                    return Ok(ToolOutput::success(Map::new()).with_field(
                        "details",
                        json!({"method": driver, "host": host, "port": request.port}),
                    ));
                },
                Err(e) => errors.push(format!(
                    "authentication failed or connection error ({driver}): {e}"
                )),
            }
        }

        info!(host = %host, port = request.port, "Credential check failed");
        self.record(&request, None, false);
        Ok(ToolOutput::failure(errors.join("; ")))
    }
}

impl Default for CredentialCheckTool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialCheckTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCheckTool")
            .field(
                "connectors",
                &self.connectors.iter().map(|c| c.driver_name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ToolAdapter for CredentialCheckTool {
    fn name(&self) -> &'static str {
        CREDENTIAL_CHECK_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Verify a single username/password pair against a SQL Server instance. \
         Checks the port first; never iterates over credential lists."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "host": {"type": "string"},
                "username": {"type": "string"},
                "password": {"type": "string"},
                "port": {"type": "integer", "default": DEFAULT_MSSQL_PORT},
                "database": {"type": "string"},
                "timeout": {"type": "integer", "default": DEFAULT_TIMEOUT_SECS},
                "preferred_driver": {"type": "string", "default": "auto"}
            },
            "required": ["host", "username", "password"]
        })
    }

    async fn call(&self, args: &ToolArgs) -> ToolOutput {
        self.check(args).await.unwrap_or_else(ToolOutput::from)
    }
}
