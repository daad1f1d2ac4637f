//! Test harness helpers.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use warden_approval::DecisionPrompt;
use warden_audit::{AuditEvent, AuditEventType, AuditLog, read_events};
use warden_config::ApprovalConfig;
use warden_core::{SessionId, ToolArgs};
use warden_gate::{AgentEngine, ApprovalGate, SessionOutcome, ToolBroker};
use warden_tools::{ToolAdapter, ToolOutput, ToolRegistry};

use crate::console::ScriptedConsole;

/// Tool names the harness registers as [`RecordingTool`]s.
pub const RECORDED_TOOLS: &[&str] = &["network_scan", "nmap_tool", "sqlmap_tool"];

/// Set up test logging with the given filter.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Adapter that records its calls and succeeds with the arguments echoed.
#[derive(Debug)]
pub struct RecordingTool {
    name: &'static str,
    calls: AtomicUsize,
    seen: Mutex<Vec<ToolArgs>>,
}

impl RecordingTool {
    /// A recorder named `name`.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Arguments of every call, in order.
    #[must_use]
    pub fn seen(&self) -> Vec<ToolArgs> {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ToolAdapter for RecordingTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "Records calls for tests"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(&self, args: &ToolArgs) -> ToolOutput {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(args.clone());
        ToolOutput::success(serde_json::Map::new()).with_field("echo", Value::Object(args.clone()))
    }
}

/// A temporary audit directory, an audit log, recording tools and a broker.
///
/// # Panics
///
/// Constructors panic if the temporary directory or audit file cannot be
/// created.
#[derive(Debug)]
pub struct GateHarness {
    dir: TempDir,
    audit: Arc<AuditLog>,
    recorders: BTreeMap<&'static str, Arc<RecordingTool>>,
    broker: Arc<ToolBroker>,
}

impl GateHarness {
    /// Harness with the [`RECORDED_TOOLS`] only.
    #[must_use]
    pub fn new() -> Self {
        Self::with_adapters(Vec::new(), ApprovalConfig::default())
    }

    /// Harness with extra adapters and the given approval flags.
    #[must_use]
    pub fn with_adapters(extra: Vec<Arc<dyn ToolAdapter>>, approval: ApprovalConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let audit = Arc::new(
            AuditLog::create(dir.path().join("logs"), SessionId::new(), "tester")
                .expect("Failed to create audit log"),
        );

        let mut registry = ToolRegistry::new();
        let mut recorders = BTreeMap::new();
        for &name in RECORDED_TOOLS {
            let recorder = Arc::new(RecordingTool::new(name));
            registry.register(recorder.clone());
            recorders.insert(name, recorder);
        }
        for adapter in extra {
            registry.register(adapter);
        }

        let broker = Arc::new(ToolBroker::new(registry, approval, Arc::clone(&audit)));
        Self {
            dir,
            audit,
            recorders,
            broker,
        }
    }

    /// Temporary directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// The session's audit log.
    #[must_use]
    pub fn audit(&self) -> Arc<AuditLog> {
        Arc::clone(&self.audit)
    }

    /// The broker.
    #[must_use]
    pub fn broker(&self) -> Arc<ToolBroker> {
        Arc::clone(&self.broker)
    }

    /// A recording tool by name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not one of [`RECORDED_TOOLS`].
    #[must_use]
    pub fn tool(&self, name: &str) -> Arc<RecordingTool> {
        self.recorders
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("{name} is not a recorded tool"))
    }

    /// A gate over `engine` that prompts through `console`.
    #[must_use]
    pub fn gate(&self, engine: Arc<dyn AgentEngine>, console: ScriptedConsole) -> ApprovalGate {
        ApprovalGate::new(
            engine,
            Arc::new(DecisionPrompt::new(console)),
            self.broker(),
            self.audit(),
        )
    }

    /// Run one session to completion.
    ///
    /// # Panics
    ///
    /// Panics if the prompt is rejected.
    pub async fn run(
        &self,
        engine: Arc<dyn AgentEngine>,
        console: ScriptedConsole,
        prompt: &str,
    ) -> SessionOutcome {
        self.gate(engine, console)
            .run(prompt)
            .await
            .expect("session should start")
    }

    /// Every parseable audit event, in order.
    ///
    /// # Panics
    ///
    /// Panics if the audit file cannot be read.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        read_events(self.audit.path())
            .expect("Failed to read audit file")
            .events
    }

    /// Event types in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<AuditEventType> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }
}

impl Default for GateHarness {
    fn default() -> Self {
        Self::new()
    }
}
