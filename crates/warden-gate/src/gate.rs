//! The approval gate: drives an engine step by step and stops at every
//! tool proposal until the operator decides.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};
use warden_approval::{
    ABORT_NOTICE, DecisionError, DecisionSource, OperatorDecision, ProposalView, RecordedDecisions,
    ResumeCommand, ResumePayload,
};
use warden_audit::{AuditEventType, AuditLog};
use warden_config::GateConfig;
use warden_core::{PhaseRoster, ProposedAction, RosterCheck, SessionStatus, ThreadId};
use warden_safety::ArgumentInspector;
use warden_telemetry::SessionContext;

use crate::broker::ToolBroker;
use crate::chunk::StepChunk;
use crate::engine::{AgentEngine, EngineInput};
use crate::error::{EngineResult, GateError, GateResult};
use crate::observer::{Notice, NoticeLevel, SessionObserver, SilentObserver};
use crate::session::{Session, SessionOutcome};

/// Reason recorded when a step ends without output.
pub const NO_FURTHER_ACTION: &str = "no further action";

/// How one interrupt was resolved.
#[derive(Debug)]
enum Resolution {
    Resume(ResumePayload),
    Abort(ResumePayload),
    Interrupted,
    Failed(DecisionError),
}

/// Drives one session.
///
/// Every proposal the engine raises is screened, surfaced to the
/// [`DecisionSource`], recorded, and only then turned into a broker grant.
/// A gate runs one session; build a new one (with a new [`AuditLog`]) for
/// the next.
pub struct ApprovalGate {
    engine: Arc<dyn AgentEngine>,
    decisions: RecordedDecisions<Arc<dyn DecisionSource>>,
    broker: Arc<ToolBroker>,
    audit: Arc<AuditLog>,
    inspector: ArgumentInspector,
    roster: PhaseRoster,
    limits: GateConfig,
    observer: Arc<dyn SessionObserver>,
    cancel: CancellationToken,
    thread_id: ThreadId,
    target: Option<String>,
}

impl ApprovalGate {
    /// Create a gate. Decisions are recorded into `audit`.
    #[must_use]
    pub fn new(
        engine: Arc<dyn AgentEngine>,
        decisions: Arc<dyn DecisionSource>,
        broker: Arc<ToolBroker>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            engine,
            decisions: RecordedDecisions::new(decisions, Arc::clone(&audit)),
            broker,
            audit,
            inspector: ArgumentInspector::default(),
            roster: PhaseRoster::default(),
            limits: GateConfig::default(),
            observer: Arc::new(SilentObserver),
            cancel: CancellationToken::new(),
            thread_id: ThreadId::new(),
            target: None,
        }
    }

    /// Screen proposals with `inspector`.
    #[must_use]
    pub fn with_inspector(mut self, inspector: ArgumentInspector) -> Self {
        self.inspector = inspector;
        self
    }

    /// Check proposers against `roster`.
    #[must_use]
    pub fn with_roster(mut self, roster: PhaseRoster) -> Self {
        self.roster = roster;
        self
    }

    /// Loop bounds.
    #[must_use]
    pub fn with_limits(mut self, limits: GateConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Report progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Abort the session when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Drive an existing engine thread instead of a fresh one.
    #[must_use]
    pub fn with_thread_id(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = thread_id;
        self
    }

    /// Asset under test, recorded on bracketing audit events.
    #[must_use]
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Engine thread this gate drives.
    #[must_use]
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Run the session to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::EmptyPrompt`] if `prompt` is blank. Every
    /// failure after the session starts ends it with a status instead.
    pub async fn run(&self, prompt: &str) -> GateResult<SessionOutcome> {
        if prompt.trim().is_empty() {
            return Err(GateError::EmptyPrompt);
        }

        let context = SessionContext::new(
            self.audit.session_id().clone(),
            self.thread_id.clone(),
            self.audit.operator(),
        )
        .with_target(self.target.clone());
        let span = context.span();

        let outcome = self.drive(prompt).instrument(span).await;
        info!(
            status = %outcome.status,
            steps = outcome.steps,
            elapsed_ms = context.elapsed_ms(),
            "Session finished"
        );
        Ok(outcome)
    }

    async fn drive(&self, prompt: &str) -> SessionOutcome {
        let mut session = Session::new(self.audit.session_id().clone(), self.thread_id.clone());
        self.record_scan_start(prompt);
        info!(engine = self.engine.name(), "Session started");
        self.notify(
            NoticeLevel::Info,
            format!("Session {} started", session.id.short()),
        );

        let mut input = EngineInput::start(prompt, self.roster.phases().to_vec());
        let mut consecutive_errors: u32 = 0;
        let mut final_message = None;

        let reason = loop {
            if session.steps >= self.limits.max_iterations {
                let reason = format!(
                    "iteration ceiling of {} steps reached",
                    self.limits.max_iterations
                );
                error!(steps = session.steps, "Iteration ceiling reached");
                let mut details = Map::new();
                details.insert("max_iterations".into(), self.limits.max_iterations.into());
                self.audit.log_error("Iteration ceiling reached", None, details);
                session.transition(SessionStatus::Errored);
                break reason;
            }

            session.record_step();
            debug!(step = session.steps, "Advancing engine");
            let Some(step) = self.advance(input.clone()).await else {
                break self.interrupted(&mut session);
            };

            let last = match step {
                Ok(last) => {
                    self.broker.revoke_all();
                    consecutive_errors = 0;
                    last
                },
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    error!(error = %e, consecutive_errors, "Engine step failed");
                    let mut details = Map::new();
                    details.insert("step".into(), session.steps.into());
                    details.insert("consecutive_errors".into(), consecutive_errors.into());
                    self.audit.log_error("Engine step failed", Some(&e), details);

                    if consecutive_errors < self.limits.max_consecutive_engine_errors
                        && self.engine.is_resumable(&self.thread_id).await
                    {
                        self.notify(
                            NoticeLevel::Warn,
                            format!("Engine error, retrying step: {e}"),
                        );
                        // Grants from the last decision stay valid for the retried resume.
                        continue;
                    }
                    session.transition(SessionStatus::Errored);
                    break format!("engine failed: {e}");
                },
            };

            let Some(last) = last else {
                self.notify(
                    NoticeLevel::Info,
                    "The agent produced no output; nothing further to do.",
                );
                session.transition(SessionStatus::Completed);
                break NO_FURTHER_ACTION.to_string();
            };

            if !last.requests_decision() {
                final_message = last.final_content();
                if let Some(message) = &final_message {
                    self.notify(NoticeLevel::Info, message.clone());
                }
                session.transition(SessionStatus::Completed);
                break "agent finished".to_string();
            }

            session.transition(SessionStatus::AwaitingDecision);
            match self.resolve(&last).await {
                Resolution::Resume(payload) => {
                    session.transition(SessionStatus::Running);
                    input = EngineInput::resume(payload);
                },
                Resolution::Abort(payload) => {
                    self.broker.revoke_all();
                    session.transition(SessionStatus::Running);
                    session.record_step();
                    self.drain(EngineInput::resume(payload)).await;
                    self.broker.revoke_all();
                    warn!("Operator aborted the session");
                    self.audit.log_warning("Session aborted by operator", Map::new());
                    session.transition(SessionStatus::Aborted);
                    break "aborted by operator".to_string();
                },
                Resolution::Interrupted => break self.interrupted(&mut session),
                Resolution::Failed(e) => {
                    error!(error = %e, "Decision prompt failed");
                    self.audit.log_error("Decision prompt failed", Some(&e), Map::new());
                    session.transition(SessionStatus::Errored);
                    break format!("decision prompt failed: {e}");
                },
            }
        };

        self.finish(session, reason, final_message)
    }

    /// Run one step unless the session is cancelled first.
    ///
    /// Cancellation is observed between tool calls: once an authorized call
    /// is running, the step is allowed to finish and `None` is returned after.
    async fn advance(&self, input: EngineInput) -> Option<EngineResult<Option<StepChunk>>> {
        let step = self.drive_step(input);
        tokio::pin!(step);
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                if self.broker.in_flight() > 0 {
                    warn!("Cancellation requested while a tool is running; letting it finish");
                    if let Err(e) = (&mut step).await {
                        warn!(error = %e, "Engine failed after cancellation");
                    }
                }
                None
            },
            result = &mut step => Some(result),
        }
    }

    /// Run one step, keeping only its last chunk.
    async fn drive_step(&self, input: EngineInput) -> EngineResult<Option<StepChunk>> {
        let mut stream = self
            .engine
            .step(&self.thread_id, input, Arc::clone(&self.broker))
            .await?;
        let mut last = None;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            debug!(kind = chunk.kind(), "Engine chunk");
            self.observer.chunk(&chunk);
            last = Some(chunk);
        }
        Ok(last)
    }

    /// Deliver an abort and discard whatever the engine does with it.
    async fn drain(&self, input: EngineInput) {
        let Some(result) = self.advance(input).await else {
            return;
        };
        match result {
            Ok(Some(last)) if last.requests_decision() => {
                debug!(
                    proposals = last.proposals().len(),
                    "Discarding proposals raised after abort"
                );
            },
            Ok(_) => {},
            Err(e) => warn!(error = %e, "Engine failed while delivering abort"),
        }
    }

    /// Surface every proposal of an interrupt and collect the resume payload.
    async fn resolve(&self, chunk: &StepChunk) -> Resolution {
        let views: Vec<Option<ProposalView>> = {
            let proposals = chunk.proposals();
            if proposals.is_empty() {
                warn!("Interrupt carried no recognizable proposal");
                vec![None]
            } else {
                proposals.into_iter().map(|p| Some(self.screen(p))).collect()
            }
        };

        let mut payload = ResumePayload::new();
        for view in &views {
            if let Some(view) = view {
                info!(proposal = %view.action, "Awaiting operator decision");
            }
            let decision = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Resolution::Interrupted,
                decision = self.decisions.prompt(view.as_ref()) => decision,
            };
            let decision = match decision {
                Ok(decision) => decision,
                Err(DecisionError::Interrupted) => return Resolution::Interrupted,
                Err(e) => return Resolution::Failed(e),
            };

            if decision.stops_session() {
                let abort = (0..views.len())
                    .map(|_| ResumeCommand::Response(ABORT_NOTICE.to_string()))
                    .collect();
                return Resolution::Abort(abort);
            }

            match &decision {
                OperatorDecision::Accept => {
                    if let Some(view) = view {
                        self.broker
                            .grant(&view.action.tool_name, view.action.arguments.clone());
                    }
                },
                OperatorDecision::Edit(edit) => {
                    self.broker.grant(&edit.action, edit.args.clone());
                },
                OperatorDecision::Respond(_) | OperatorDecision::Abort => {},
            }
            payload.push(decision.to_resume_command());
        }
        Resolution::Resume(payload)
    }

    /// Attach safety verdicts and the roster check to a proposal, writing a
    /// warning for each finding.
    fn screen(&self, action: ProposedAction) -> ProposalView {
        let verdicts = self.inspector.inspect(&action.arguments);
        for verdict in verdicts.iter().filter(|v| !v.is_safe) {
            warn!(
                tool = %action.tool_name,
                reasons = ?verdict.reasons,
                "Proposal failed safety validation"
            );
            let mut details = Map::new();
            details.insert("tool".into(), action.tool_name.clone().into());
            details.insert("subject".into(), verdict.subject.clone().into());
            details.insert("reasons".into(), Value::from(verdict.reasons.clone()));
            self.audit.log_warning("Safety validation failed", details);
        }

        let roster_warning = match self.roster.check(&action.proposer, &action.tool_name) {
            RosterCheck::Permitted => None,
            RosterCheck::ToolNotAllowed { phase } => Some(format!(
                "phase '{phase}' is not allowed to use '{}'",
                action.tool_name
            )),
            RosterCheck::UnknownPhase { phase } => {
                Some(format!("proposal came from unknown phase '{phase}'"))
            },
        };
        if let Some(message) = &roster_warning {
            warn!(tool = %action.tool_name, proposer = %action.proposer, "{message}");
            let mut details = Map::new();
            details.insert("tool".into(), action.tool_name.clone().into());
            details.insert("proposer".into(), action.proposer.clone().into());
            self.audit.log_warning(message, details);
        }

        ProposalView::new(action)
            .with_verdicts(verdicts)
            .with_roster_warning(roster_warning)
    }

    fn interrupted(&self, session: &mut Session) -> String {
        warn!("Session interrupted");
        self.audit.log_warning("Session interrupted by operator", Map::new());
        session.transition(SessionStatus::Aborted);
        "interrupted by operator".to_string()
    }

    fn record_scan_start(&self, prompt: &str) {
        let phases: Vec<Value> = self
            .roster
            .phases()
            .iter()
            .map(|p| Value::from(p.name.clone()))
            .collect();
        let mut details = Map::new();
        details.insert("prompt".into(), prompt.into());
        details.insert("thread_id".into(), self.thread_id.to_string().into());
        details.insert("engine".into(), self.engine.name().into());
        details.insert("phases".into(), Value::Array(phases));
        self.audit.log_event(
            AuditEventType::ScanStart,
            "Scan started",
            details,
            Some(self.audit.operator()),
            self.target.as_deref(),
        );
    }

    fn finish(
        &self,
        session: Session,
        reason: String,
        final_message: Option<String>,
    ) -> SessionOutcome {
        self.broker.revoke_all();
        let status = session.status;
        let mut details = Map::new();
        details.insert("status".into(), status.to_string().into());
        details.insert("steps".into(), session.steps.into());
        details.insert("reason".into(), reason.clone().into());
        self.audit.log_event(
            AuditEventType::ScanEnd,
            format!("Scan ended: {status}"),
            details,
            Some(self.audit.operator()),
            self.target.as_deref(),
        );
        let summary = self.audit.close_session();

        let level = match status {
            SessionStatus::Completed => NoticeLevel::Success,
            SessionStatus::Aborted => NoticeLevel::Warn,
            _ => NoticeLevel::Error,
        };
        self.notify(
            level,
            format!(
                "Session {status}: {reason} ({} audit events in {})",
                summary.total_events,
                summary.audit_file.display()
            ),
        );

        SessionOutcome {
            session_id: session.id,
            thread_id: session.thread_id,
            status,
            steps: session.steps,
            final_message,
            reason,
            summary,
        }
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.observer.notice(&Notice::new(level, message));
    }
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("engine", &self.engine.name())
            .field("thread_id", &self.thread_id)
            .field("limits", &self.limits)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_approval::{DecisionResult, EditedCall};
    use warden_audit::read_events;
    use warden_config::ApprovalConfig;
    use warden_core::{SessionId, ToolArgs};
    use warden_tools::{ToolAdapter, ToolOutput, ToolRegistry};

    use crate::engine::ChunkStream;
    use crate::error::EngineError;

    /// One scripted step: tool calls made through the broker, then chunks.
    struct Step {
        calls: Vec<(&'static str, Value)>,
        chunks: Vec<Value>,
        fail: bool,
    }

    fn step(chunks: Vec<Value>) -> Step {
        Step {
            calls: Vec::new(),
            chunks,
            fail: false,
        }
    }

    struct TestEngine {
        steps: Mutex<VecDeque<Step>>,
        inputs: Mutex<Vec<EngineInput>>,
        resumable: bool,
        outputs: Mutex<Vec<ToolOutput>>,
    }

    impl TestEngine {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                inputs: Mutex::new(Vec::new()),
                resumable: true,
                outputs: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AgentEngine for TestEngine {
        fn name(&self) -> &str {
            "test"
        }

        async fn step(
            &self,
            _thread_id: &ThreadId,
            input: EngineInput,
            broker: Arc<ToolBroker>,
        ) -> EngineResult<ChunkStream> {
            self.inputs.lock().unwrap().push(input);
            let next = self.steps.lock().unwrap().pop_front();
            let Some(step) = next else {
                return Ok(Box::pin(futures::stream::empty()));
            };
            if step.fail {
                return Err(EngineError::Remote("boom".into()));
            }
            for (tool, args) in step.calls {
                let args: ToolArgs = args.as_object().unwrap().clone();
                let output = broker.invoke(tool, &args).await;
                self.outputs.lock().unwrap().push(output);
            }
            let chunks: Vec<EngineResult<StepChunk>> =
                step.chunks.into_iter().map(|c| Ok(StepChunk::decode(c))).collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        async fn is_resumable(&self, _thread_id: &ThreadId) -> bool {
            self.resumable
        }
    }

    struct Script(Mutex<VecDeque<DecisionResult<OperatorDecision>>>);

    #[async_trait]
    impl DecisionSource for Script {
        async fn prompt(
            &self,
            _proposal: Option<&ProposalView>,
        ) -> DecisionResult<OperatorDecision> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(OperatorDecision::Abort))
        }
    }

    fn script(decisions: Vec<DecisionResult<OperatorDecision>>) -> Arc<dyn DecisionSource> {
        Arc::new(Script(Mutex::new(decisions.into())))
    }

    struct ScanTool(AtomicUsize);

    #[async_trait]
    impl ToolAdapter for ScanTool {
        fn name(&self) -> &'static str {
            "nmap_tool"
        }
        fn description(&self) -> &'static str {
            "scan"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _args: &ToolArgs) -> ToolOutput {
            self.0.fetch_add(1, Ordering::SeqCst);
            ToolOutput::success(Map::new())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        audit: Arc<AuditLog>,
        broker: Arc<ToolBroker>,
        tool: Arc<ScanTool>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::create(dir.path(), SessionId::new(), "alice").unwrap());
        let tool = Arc::new(ScanTool(AtomicUsize::new(0)));
        let broker = Arc::new(ToolBroker::new(
            ToolRegistry::new().with(tool.clone()),
            ApprovalConfig::default(),
            Arc::clone(&audit),
        ));
        Fixture {
            _dir: dir,
            audit,
            broker,
            tool,
        }
    }

    fn interrupt(target: &str) -> Value {
        json!({"__interrupt__": [{"value": [
            {"name": "nmap_tool", "args": {"target": target}}
        ]}]})
    }

    fn final_turn(text: &str) -> Value {
        json!({"model_request": {"messages": [{"content": text}]}})
    }

    fn event_types(audit: &AuditLog) -> Vec<AuditEventType> {
        read_events(audit.path())
            .unwrap()
            .events
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let f = fixture();
        let gate = ApprovalGate::new(TestEngine::new(vec![]), script(vec![]), f.broker, f.audit);
        assert!(matches!(gate.run("   ").await, Err(GateError::EmptyPrompt)));
    }

    #[tokio::test]
    async fn test_final_turn_completes() {
        let f = fixture();
        let engine = TestEngine::new(vec![step(vec![final_turn("All done.")])]);
        let gate = ApprovalGate::new(engine, script(vec![]), f.broker, f.audit.clone());

        let outcome = gate.run("scan 10.0.0.5").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Completed);
        assert_eq!(outcome.final_message.as_deref(), Some("All done."));
        assert_eq!(outcome.steps, 1);

        let types = event_types(&f.audit);
        assert_eq!(types.first(), Some(&AuditEventType::SessionStart));
        assert_eq!(types.get(1), Some(&AuditEventType::ScanStart));
        assert_eq!(types.last(), Some(&AuditEventType::SessionEnd));
    }

    #[tokio::test]
    async fn test_no_output_completes_with_no_further_action() {
        let f = fixture();
        let gate = ApprovalGate::new(TestEngine::new(vec![]), script(vec![]), f.broker, f.audit);
        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Completed);
        assert_eq!(outcome.reason, NO_FURTHER_ACTION);
    }

    #[tokio::test]
    async fn test_accept_grants_exactly_the_proposal() {
        let f = fixture();
        let engine = TestEngine::new(vec![
            step(vec![interrupt("10.0.0.5")]),
            Step {
                calls: vec![
                    ("nmap_tool", json!({"target": "10.0.0.5"})),
                    ("nmap_tool", json!({"target": "10.0.0.5"})),
                ],
                chunks: vec![final_turn("done")],
                fail: false,
            },
        ]);
        let gate = ApprovalGate::new(
            engine.clone(),
            script(vec![Ok(OperatorDecision::Accept)]),
            f.broker,
            f.audit.clone(),
        );

        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Completed);
        assert_eq!(f.tool.0.load(Ordering::SeqCst), 1);

        let outputs = engine.outputs.lock().unwrap();
        assert!(outputs[0].success);
        assert!(!outputs[1].success);

        let inputs = engine.inputs.lock().unwrap();
        assert_eq!(
            serde_json::to_value(&inputs[1]).unwrap(),
            json!({"type": "resume", "payload": [{"type": "accept"}]})
        );

        let types = event_types(&f.audit);
        let decision = types
            .iter()
            .position(|t| *t == AuditEventType::HumanDecision)
            .unwrap();
        let invocation = types
            .iter()
            .position(|t| *t == AuditEventType::ToolInvocation)
            .unwrap();
        assert!(decision < invocation);
    }

    #[tokio::test]
    async fn test_respond_never_runs_tool() {
        let f = fixture();
        let engine = TestEngine::new(vec![
            step(vec![interrupt("10.0.0.5")]),
            Step {
                calls: vec![("nmap_tool", json!({"target": "10.0.0.5"}))],
                chunks: vec![final_turn("ok, skipping")],
                fail: false,
            },
        ]);
        let gate = ApprovalGate::new(
            engine,
            script(vec![Ok(OperatorDecision::Respond("skip it".into()))]),
            f.broker,
            f.audit.clone(),
        );
        gate.run("scan").await.unwrap();
        assert_eq!(f.tool.0.load(Ordering::SeqCst), 0);
        assert!(!event_types(&f.audit).contains(&AuditEventType::ToolInvocation));
    }

    #[tokio::test]
    async fn test_edit_grants_edited_call() {
        let f = fixture();
        let edited = json!({"target": "10.0.0.9"});
        let engine = TestEngine::new(vec![
            step(vec![interrupt("10.0.0.5")]),
            Step {
                calls: vec![("nmap_tool", edited.clone())],
                chunks: vec![final_turn("done")],
                fail: false,
            },
        ]);
        let edit = OperatorDecision::Edit(EditedCall {
            action: "nmap_tool".into(),
            args: edited.as_object().unwrap().clone(),
        });
        let gate = ApprovalGate::new(engine, script(vec![Ok(edit)]), f.broker, f.audit);
        gate.run("scan").await.unwrap();
        assert_eq!(f.tool.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_answers_every_proposal_and_stops() {
        let f = fixture();
        let engine = TestEngine::new(vec![
            step(vec![json!({"__interrupt__": [{"value": [
                {"name": "nmap_tool", "args": {"target": "a"}},
                {"name": "nmap_tool", "args": {"target": "b"}}
            ]}]})]),
            Step {
                calls: vec![("nmap_tool", json!({"target": "a"}))],
                chunks: vec![interrupt("c")],
                fail: false,
            },
        ]);
        let gate = ApprovalGate::new(
            engine.clone(),
            script(vec![Ok(OperatorDecision::Accept), Ok(OperatorDecision::Abort)]),
            f.broker,
            f.audit,
        );

        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Aborted);
        assert_eq!(f.tool.0.load(Ordering::SeqCst), 0);
        assert!(outcome.summary.total_events > 0);

        let inputs = engine.inputs.lock().unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(
            serde_json::to_value(&inputs[1]).unwrap(),
            json!({"type": "resume", "payload": [
                {"type": "response", "args": ABORT_NOTICE},
                {"type": "response", "args": ABORT_NOTICE}
            ]})
        );
    }

    #[tokio::test]
    async fn test_interrupted_decision_aborts() {
        let f = fixture();
        let engine = TestEngine::new(vec![step(vec![interrupt("h")])]);
        let gate = ApprovalGate::new(
            engine,
            script(vec![Err(DecisionError::Interrupted)]),
            f.broker,
            f.audit.clone(),
        );
        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Aborted);
        assert!(event_types(&f.audit).contains(&AuditEventType::Warning));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_aborts() {
        let f = fixture();
        let token = CancellationToken::new();
        token.cancel();
        let gate = ApprovalGate::new(TestEngine::new(vec![]), script(vec![]), f.broker, f.audit)
            .with_cancellation(token);
        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Aborted);
    }

    #[tokio::test]
    async fn test_iteration_ceiling_errors() {
        let f = fixture();
        let steps = (0..5).map(|_| step(vec![interrupt("h")])).collect();
        let decisions = (0..5)
            .map(|_| Ok(OperatorDecision::Respond("again".into())))
            .collect();
        let gate = ApprovalGate::new(TestEngine::new(steps), script(decisions), f.broker, f.audit)
            .with_limits(GateConfig {
                max_iterations: 3,
                max_consecutive_engine_errors: 3,
            });
        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Errored);
        assert_eq!(outcome.steps, 3);
    }

    #[tokio::test]
    async fn test_engine_error_retries_when_resumable() {
        let f = fixture();
        let failing = Step {
            calls: Vec::new(),
            chunks: Vec::new(),
            fail: true,
        };
        let engine = TestEngine::new(vec![failing, step(vec![final_turn("recovered")])]);
        let gate = ApprovalGate::new(engine.clone(), script(vec![]), f.broker, f.audit.clone());

        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Completed);
        let inputs = engine.inputs.lock().unwrap();
        assert_eq!(inputs[0], inputs[1]);
        assert!(event_types(&f.audit).contains(&AuditEventType::Error));
    }

    #[tokio::test]
    async fn test_failed_resume_is_retried_with_its_grant() {
        let f = fixture();
        let failing = Step {
            calls: Vec::new(),
            chunks: Vec::new(),
            fail: true,
        };
        let engine = TestEngine::new(vec![
            step(vec![interrupt("10.0.0.5")]),
            failing,
            Step {
                calls: vec![("nmap_tool", json!({"target": "10.0.0.5"}))],
                chunks: vec![final_turn("done")],
                fail: false,
            },
        ]);
        let gate = ApprovalGate::new(
            engine.clone(),
            script(vec![Ok(OperatorDecision::Accept)]),
            Arc::clone(&f.broker),
            f.audit.clone(),
        );

        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Completed);
        assert_eq!(f.tool.0.load(Ordering::SeqCst), 1);
        assert!(engine.outputs.lock().unwrap()[0].success);
        assert_eq!(f.broker.pending_grants(), 0);

        let inputs = engine.inputs.lock().unwrap();
        assert_eq!(inputs[1], inputs[2]);
        let events = read_events(f.audit.path()).unwrap().events;
        assert!(!events.iter().any(|e| e.description.starts_with("Refused")));
    }

    struct CancellingTool {
        token: CancellationToken,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl ToolAdapter for CancellingTool {
        fn name(&self) -> &'static str {
            "nmap_tool"
        }
        fn description(&self) -> &'static str {
            "cancels the session while running"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _args: &ToolArgs) -> ToolOutput {
            self.token.cancel();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            ToolOutput::success(Map::new())
        }
    }

    #[tokio::test]
    async fn test_cancel_during_authorized_call_lets_it_finish() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::create(dir.path(), SessionId::new(), "alice").unwrap());
        let token = CancellationToken::new();
        let tool = Arc::new(CancellingTool {
            token: token.clone(),
            runs: AtomicUsize::new(0),
        });
        let broker = Arc::new(ToolBroker::new(
            ToolRegistry::new().with(tool.clone()),
            ApprovalConfig::default(),
            Arc::clone(&audit),
        ));
        let engine = TestEngine::new(vec![
            step(vec![interrupt("10.0.0.5")]),
            Step {
                calls: vec![("nmap_tool", json!({"target": "10.0.0.5"}))],
                chunks: vec![final_turn("done")],
                fail: false,
            },
        ]);
        let gate = ApprovalGate::new(
            engine,
            script(vec![Ok(OperatorDecision::Accept)]),
            broker,
            audit.clone(),
        )
        .with_cancellation(token);

        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Aborted);
        assert_eq!(tool.runs.load(Ordering::SeqCst), 1);

        let types = event_types(&audit);
        let invocation = types
            .iter()
            .position(|t| *t == AuditEventType::ToolInvocation)
            .unwrap();
        assert_eq!(types[invocation + 1], AuditEventType::ToolResult);
        assert!(!types.contains(&AuditEventType::Error));
        assert_eq!(types.last(), Some(&AuditEventType::SessionEnd));
    }

    #[tokio::test]
    async fn test_engine_error_not_resumable_errors() {
        let f = fixture();
        let engine = Arc::new(TestEngine {
            steps: Mutex::new(
                vec![Step {
                    calls: Vec::new(),
                    chunks: Vec::new(),
                    fail: true,
                }]
                .into(),
            ),
            inputs: Mutex::new(Vec::new()),
            resumable: false,
            outputs: Mutex::new(Vec::new()),
        });
        let gate = ApprovalGate::new(engine, script(vec![]), f.broker, f.audit);
        let outcome = gate.run("scan").await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Errored);
    }

    #[tokio::test]
    async fn test_roster_violation_is_flagged() {
        let f = fixture();
        let engine = TestEngine::new(vec![step(vec![json!({"__interrupt__": [{"value": [
            {"name": "nmap_tool", "args": {"target": "h"}, "proposer": "reporting"}
        ]}]})])]);
        let roster = PhaseRoster::new(vec![warden_core::PhaseDescriptor::new(
            "reporting",
            "write the report",
            ["read_file"],
        )]);
        let gate = ApprovalGate::new(
            engine,
            script(vec![Ok(OperatorDecision::Respond("no".into()))]),
            f.broker,
            f.audit.clone(),
        )
        .with_roster(roster);
        gate.run("scan").await.unwrap();

        let events = read_events(f.audit.path()).unwrap().events;
        let warning = events
            .iter()
            .position(|e| e.event_type == AuditEventType::Warning)
            .unwrap();
        let decision = events
            .iter()
            .position(|e| e.event_type == AuditEventType::HumanDecision)
            .unwrap();
        assert!(warning < decision);
        assert_eq!(
            events[decision].details["roster_warning"],
            "phase 'reporting' is not allowed to use 'nmap_tool'"
        );
    }
}
