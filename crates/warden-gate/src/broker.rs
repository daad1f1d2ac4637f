//! The only path from an engine to a tool adapter.
//!
//! Tools that require approval run only against a one-shot grant the gate
//! issued after an `accept` or `edit` decision, with exactly the arguments
//! the operator saw or wrote. Unused grants are revoked when the step ends.
//!
//! An invocation that is dropped before its adapter returns still closes its
//! audit trail: an `error` record follows the `tool_invocation`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use warden_audit::AuditLog;
use warden_config::ApprovalConfig;
use warden_core::{ProposedAction, ToolArgs};
use warden_tools::{ToolDefinition, ToolOutput, ToolRegistry};

/// Failure message returned for calls the operator did not authorize.
pub const NOT_AUTHORIZED: &str = "tool call not authorized by operator";

#[derive(Debug, Clone, PartialEq)]
struct Grant {
    tool: String,
    args: ToolArgs,
}

/// Dispatches engine tool calls to adapters, enforcing operator grants.
pub struct ToolBroker {
    registry: ToolRegistry,
    approval: ApprovalConfig,
    audit: Arc<AuditLog>,
    grants: Mutex<Vec<Grant>>,
    in_flight: AtomicUsize,
}

/// Tracks one running adapter call and records its interruption on drop.
struct InFlight<'a> {
    broker: &'a ToolBroker,
    tool: &'a str,
    target: Option<&'a str>,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn start(broker: &'a ToolBroker, tool: &'a str, target: Option<&'a str>) -> Self {
        broker.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            broker,
            tool,
            target,
            finished: false,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.broker.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.finished {
            return;
        }
        warn!(tool = self.tool, "Tool invocation dropped before completion");
        let mut details = Map::new();
        details.insert("tool".into(), self.tool.into());
        details.insert(
            "target".into(),
            self.target.map_or(Value::Null, Value::from),
        );
        self.broker
            .audit
            .log_error("Tool invocation interrupted before completion", None, details);
    }
}

impl ToolBroker {
    /// Create a broker over `registry`.
    #[must_use]
    pub fn new(registry: ToolRegistry, approval: ApprovalConfig, audit: Arc<AuditLog>) -> Self {
        Self {
            registry,
            approval,
            audit,
            grants: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Definitions of every registered tool, for the engine.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Whether `tool` is registered.
    #[must_use]
    pub fn has_tool(&self, tool: &str) -> bool {
        self.registry.contains(tool)
    }

    /// Authorize one call of `tool` with exactly `args`.
    pub fn grant(&self, tool: impl Into<String>, args: ToolArgs) {
        let tool = tool.into();
        debug!(tool = %tool, "Granting one tool call");
        self.lock().push(Grant { tool, args });
    }

    /// Number of grants not yet used.
    #[must_use]
    pub fn pending_grants(&self) -> usize {
        self.lock().len()
    }

    /// Number of adapter calls currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Drop every unused grant. Returns how many were dropped.
    pub fn revoke_all(&self) -> usize {
        let mut grants = self.lock();
        let dropped = grants.len();
        grants.clear();
        if dropped > 0 {
            debug!(dropped, "Revoked unused tool grants");
        }
        dropped
    }

    /// Run `tool` if it is registered and authorized.
    ///
    /// Never fails: refusals and adapter failures come back as a failed
    /// [`ToolOutput`] the engine can show to its model.
    pub async fn invoke(&self, tool: &str, args: &ToolArgs) -> ToolOutput {
        let target = target_of(tool, args);

        let Some(adapter) = self.registry.get(tool) else {
            warn!(tool, "Engine requested an unknown tool");
            self.audit
                .log_warning(&format!("Unknown tool requested: {tool}"), tool_details(tool, args));
            return ToolOutput::failure(format!("unknown tool: {tool}"));
        };

        let requires_approval = self.approval.requires_approval(tool);
        if requires_approval && !self.take_grant(tool, args) {
            warn!(tool, "Refused unauthorized tool call");
            self.audit.log_warning(
                &format!("Refused unauthorized tool call: {tool}"),
                tool_details(tool, args),
            );
            return ToolOutput::failure(NOT_AUTHORIZED);
        }

        let approved_by = requires_approval.then(|| self.audit.operator());
        self.audit
            .log_tool_invocation(tool, args, target.as_deref(), approved_by);
        info!(tool, target = target.as_deref().unwrap_or("-"), "Running tool");

        let mut guard = InFlight::start(self, tool, target.as_deref());
        let output = adapter.call(args).await;
        guard.finished = true;
        drop(guard);

        self.audit
            .log_tool_result(tool, output.success, &output.summary(), target.as_deref());
        info!(tool, success = output.success, "Tool finished");
        output
    }

    fn take_grant(&self, tool: &str, args: &ToolArgs) -> bool {
        let mut grants = self.lock();
        match grants.iter().position(|g| g.tool == tool && &g.args == args) {
            Some(index) => {
                grants.remove(index);
                true
            },
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Grant>> {
        self.grants.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ToolBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBroker")
            .field("tools", &self.registry.names().collect::<Vec<_>>())
            .field("pending_grants", &self.pending_grants())
            .finish_non_exhaustive()
    }
}

fn target_of(tool: &str, args: &ToolArgs) -> Option<String> {
    ProposedAction::new(tool, args.clone()).target()
}

fn tool_details(tool: &str, args: &ToolArgs) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("tool".into(), tool.into());
    details.insert("arguments".into(), Value::Object(args.clone()));
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_audit::{AuditEventType, read_events};
    use warden_core::SessionId;
    use warden_tools::ToolAdapter;

    struct CountingTool(AtomicUsize);

    #[async_trait]
    impl ToolAdapter for CountingTool {
        fn name(&self) -> &'static str {
            "nmap_tool"
        }
        fn description(&self) -> &'static str {
            "counts calls"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _args: &ToolArgs) -> ToolOutput {
            self.0.fetch_add(1, Ordering::SeqCst);
            ToolOutput::success(Map::new())
        }
    }

    fn args(target: &str) -> ToolArgs {
        json!({"target": target}).as_object().unwrap().clone()
    }

    fn broker(dir: &std::path::Path) -> (ToolBroker, Arc<CountingTool>, Arc<AuditLog>) {
        let tool = Arc::new(CountingTool(AtomicUsize::new(0)));
        let audit = Arc::new(AuditLog::create(dir, SessionId::new(), "alice").unwrap());
        let registry = ToolRegistry::new().with(tool.clone());
        let broker = ToolBroker::new(registry, ApprovalConfig::default(), audit.clone());
        (broker, tool, audit)
    }

    #[tokio::test]
    async fn test_refuses_without_grant() {
        let dir = tempfile::tempdir().unwrap();
        let (broker, tool, audit) = broker(dir.path());

        let output = broker.invoke("nmap_tool", &args("10.0.0.5")).await;
        assert!(!output.success);
        assert_eq!(output.error.as_deref(), Some(NOT_AUTHORIZED));
        assert_eq!(tool.0.load(Ordering::SeqCst), 0);

        let events = read_events(audit.path()).unwrap().events;
        assert!(events.iter().any(|e| e.event_type == AuditEventType::Warning));
        assert!(!events.iter().any(|e| e.event_type == AuditEventType::ToolInvocation));
    }

    #[tokio::test]
    async fn test_grant_is_single_use_and_exact() {
        let dir = tempfile::tempdir().unwrap();
        let (broker, tool, audit) = broker(dir.path());
        broker.grant("nmap_tool", args("10.0.0.5"));

        assert!(!broker.invoke("nmap_tool", &args("10.0.0.6")).await.success);
        assert!(broker.invoke("nmap_tool", &args("10.0.0.5")).await.success);
        assert!(!broker.invoke("nmap_tool", &args("10.0.0.5")).await.success);
        assert_eq!(tool.0.load(Ordering::SeqCst), 1);

        let events = read_events(audit.path()).unwrap().events;
        let invocation = events
            .iter()
            .find(|e| e.event_type == AuditEventType::ToolInvocation)
            .unwrap();
        assert_eq!(invocation.details["approved_by"], "alice");
        assert_eq!(invocation.target.as_deref(), Some("10.0.0.5"));
        assert!(events.iter().any(|e| e.event_type == AuditEventType::ToolResult));
    }

    #[tokio::test]
    async fn test_revoke_all() {
        let dir = tempfile::tempdir().unwrap();
        let (broker, tool, _audit) = broker(dir.path());
        broker.grant("nmap_tool", args("a"));
        broker.grant("nmap_tool", args("b"));
        assert_eq!(broker.revoke_all(), 2);
        assert!(!broker.invoke("nmap_tool", &args("a")).await.success);
        assert_eq!(tool.0.load(Ordering::SeqCst), 0);
    }

    struct StuckTool;

    #[async_trait]
    impl ToolAdapter for StuckTool {
        fn name(&self) -> &'static str {
            "nmap_tool"
        }
        fn description(&self) -> &'static str {
            "never returns"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _args: &ToolArgs) -> ToolOutput {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_dropped_invocation_is_closed_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::create(dir.path(), SessionId::new(), "alice").unwrap());
        let broker = ToolBroker::new(
            ToolRegistry::new().with(Arc::new(StuckTool)),
            ApprovalConfig::default(),
            audit.clone(),
        );
        broker.grant("nmap_tool", args("10.0.0.5"));

        let call_args = args("10.0.0.5");
        let call = broker.invoke("nmap_tool", &call_args);
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), call).await;
        assert!(timed_out.is_err());
        assert_eq!(broker.in_flight(), 0);

        let types: Vec<_> = read_events(audit.path())
            .unwrap()
            .events
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert!(types.ends_with(&[AuditEventType::ToolInvocation, AuditEventType::Error]));
        assert!(!types.contains(&AuditEventType::ToolResult));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let (broker, _tool, _audit) = broker(dir.path());
        let output = broker.invoke("rm_rf", &Map::new()).await;
        assert_eq!(output.error.as_deref(), Some("unknown tool: rm_rf"));
    }

    #[tokio::test]
    async fn test_tool_without_approval_requirement_runs() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(CountingTool(AtomicUsize::new(0)));
        let audit = Arc::new(AuditLog::create(dir.path(), SessionId::new(), "alice").unwrap());
        let mut approval = ApprovalConfig::default();
        approval.tools.insert("nmap_tool".into(), false);
        let broker = ToolBroker::new(ToolRegistry::new().with(tool.clone()), approval, audit);

        assert!(broker.invoke("nmap_tool", &args("h")).await.success);
        assert_eq!(tool.0.load(Ordering::SeqCst), 1);
    }
}
