//! End-to-end operator scenarios: accept, respond, edit and abort.

mod common;

use std::sync::Arc;

use serde_json::{Value, json};
use warden_approval::{
    ABORT_NOTICE, DecisionPrompt, DecisionSource, INVALID_EDIT_MESSAGE, OperatorDecision,
    ProposalView, ResumeCommand, ResumePayload,
};
use warden_audit::AuditEventType;
use warden_core::SessionStatus;
use warden_gate::EngineInput;
use warden_test::{GateHarness, ScriptedConsole, ScriptedEngine, ScriptedStep, proposal};

use common::{assert_gate_invariant, positions};

#[tokio::test]
async fn test_accepted_scan_runs_tool_and_resumes_with_accept() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(ScriptedStep::interrupt(vec![proposal(
                "network_scan",
                json!({"target": "10.0.0.5"}),
            )]))
            .then(ScriptedStep::final_turn("10.0.0.5 has ports 22 and 1433 open")),
    );
    let harness = GateHarness::new();
    let console = ScriptedConsole::new().accept();

    let outcome = harness
        .run(engine.clone(), console.clone(), "Scan 10.0.0.5")
        .await;

    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(
        outcome.final_message.as_deref(),
        Some("10.0.0.5 has ports 22 and 1433 open")
    );
    assert_eq!(harness.tool("network_scan").calls(), 1);
    assert_eq!(console.shown(), vec![Some("network_scan".to_string())]);

    let types = harness.event_types();
    assert_eq!(
        types,
        vec![
            AuditEventType::SessionStart,
            AuditEventType::ScanStart,
            AuditEventType::HumanDecision,
            AuditEventType::ToolInvocation,
            AuditEventType::ToolResult,
            AuditEventType::ScanEnd,
            AuditEventType::SessionEnd,
        ]
    );
    let events = harness.events();
    assert_eq!(events[3].target.as_deref(), Some("10.0.0.5"));
    assert_eq!(events[3].details["approved_by"], json!("tester"));
    assert_gate_invariant(&events);

    let inputs = engine.inputs();
    assert_eq!(inputs.len(), 2);
    assert_eq!(
        inputs[1],
        EngineInput::resume(ResumePayload(vec![ResumeCommand::Accept]))
    );
    let EngineInput::Resume { payload } = &inputs[1] else {
        panic!("second input should resume");
    };
    assert_eq!(serde_json::to_value(payload).unwrap(), json!([{"type": "accept"}]));
}

#[tokio::test]
async fn test_respond_sends_text_and_runs_nothing() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(ScriptedStep::interrupt(vec![proposal(
                "sqlmap_tool",
                json!({"url": "http://10.0.0.5/login"}),
            )]))
            .then(ScriptedStep::final_turn("Skipped injection testing")),
    );
    let harness = GateHarness::new();
    let console = ScriptedConsole::new().respond("Not in scope, move on.");

    let outcome = harness.run(engine.clone(), console, "Test the login form").await;

    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(harness.tool("sqlmap_tool").calls(), 0);
    assert!(engine.tool_calls().is_empty());
    assert!(
        !harness
            .event_types()
            .contains(&AuditEventType::ToolInvocation)
    );
    assert_eq!(
        engine.inputs()[1],
        EngineInput::resume(ResumePayload(vec![ResumeCommand::Response(
            "Not in scope, move on.".into()
        )]))
    );
}

#[tokio::test]
async fn test_edit_runs_replacement_call_only() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(ScriptedStep::interrupt(vec![proposal(
                "nmap_tool",
                json!({"target": "10.0.0.0/24", "arguments": "-A -p-"}),
            )]))
            .then(ScriptedStep::final_turn("done")),
    );
    let harness = GateHarness::new();
    let console = ScriptedConsole::new()
        .edit(r#"{"action": "nmap_tool", "args": {"target": "10.0.0.5", "arguments": "-sV -p 1433"}}"#);

    let outcome = harness.run(engine.clone(), console, "Scan the subnet").await;

    assert_eq!(outcome.status, SessionStatus::Completed);
    let seen = harness.tool("nmap_tool").seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["target"], json!("10.0.0.5"));
    assert_eq!(seen[0]["arguments"], json!("-sV -p 1433"));

    let events = harness.events();
    let decision = events
        .iter()
        .find(|e| e.event_type == AuditEventType::HumanDecision)
        .unwrap();
    assert_eq!(decision.details["decision"], json!("edit"));
    assert_eq!(decision.details["payload"]["action"], json!("nmap_tool"));
    assert_gate_invariant(&events);
}

#[tokio::test]
async fn test_malformed_edit_degrades_to_respond() {
    let console = ScriptedConsole::new().edit("not valid json");
    let prompt = DecisionPrompt::new(console.clone());
    let view = ProposalView::new(proposal("nmap_tool", json!({"target": "10.0.0.5"})));

    let decision = prompt.prompt(Some(&view)).await.unwrap();

    assert_eq!(
        decision,
        OperatorDecision::Respond(INVALID_EDIT_MESSAGE.to_string())
    );
    assert!(!decision.authorizes_tool());
    assert_eq!(console.notices().len(), 1);
}

#[tokio::test]
async fn test_malformed_edit_in_session_runs_nothing() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(ScriptedStep::interrupt(vec![proposal(
                "nmap_tool",
                json!({"target": "10.0.0.5"}),
            )]))
            .then(ScriptedStep::final_turn("ok")),
    );
    let harness = GateHarness::new();
    let console = ScriptedConsole::new().edit(r#"{"action": "nmap_tool"}"#);

    let outcome = harness.run(engine.clone(), console, "Scan").await;

    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(harness.tool("nmap_tool").calls(), 0);
    assert_eq!(
        engine.inputs()[1],
        EngineInput::resume(ResumePayload(vec![ResumeCommand::Response(
            INVALID_EDIT_MESSAGE.into()
        )]))
    );
    let decision = harness
        .events()
        .into_iter()
        .find(|e| e.event_type == AuditEventType::HumanDecision)
        .unwrap();
    assert_eq!(decision.details["decision"], json!("respond"));
}

#[tokio::test]
async fn test_abort_mid_session_stops_processing() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(ScriptedStep::interrupt(vec![proposal(
                "nmap_tool",
                json!({"target": "10.0.0.5"}),
            )]))
            .then(ScriptedStep::interrupt(vec![proposal(
                "sqlmap_tool",
                json!({"url": "http://10.0.0.5/"}),
            )]))
            .then(ScriptedStep::final_turn("never reached")),
    );
    let harness = GateHarness::new();
    let console = ScriptedConsole::new().abort();

    let outcome = harness.run(engine.clone(), console.clone(), "Assess 10.0.0.5").await;

    assert_eq!(outcome.status, SessionStatus::Aborted);
    assert_eq!(outcome.final_message, None);
    assert_eq!(console.shown().len(), 1);
    assert_eq!(engine.remaining_steps(), 1);
    assert_eq!(harness.tool("nmap_tool").calls(), 0);
    assert_eq!(harness.tool("sqlmap_tool").calls(), 0);
    assert_eq!(
        engine.inputs()[1],
        EngineInput::resume(ResumePayload(vec![ResumeCommand::Response(
            ABORT_NOTICE.into()
        )]))
    );

    let types = harness.event_types();
    assert!(!types.contains(&AuditEventType::ToolInvocation));
    let ends = positions(&types, AuditEventType::SessionEnd);
    assert_eq!(ends, vec![types.len() - 1]);

    let events = harness.events();
    let closing = events.last().unwrap();
    let recorded = closing.details["summary"]["total_events"]
        .as_u64()
        .unwrap();
    assert!(recorded > 0);
    assert_eq!(outcome.summary.total_events, usize::try_from(recorded).unwrap());
    assert_eq!(
        closing.details["summary"]["event_counts"]["human_decision"],
        Value::from(1)
    );
}

#[tokio::test]
async fn test_abort_answers_every_proposal_of_the_interrupt() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(ScriptedStep::interrupt(vec![
                proposal("nmap_tool", json!({"target": "10.0.0.5"})),
                proposal("sqlmap_tool", json!({"url": "http://10.0.0.5/"})),
            ]))
            .then(ScriptedStep::final_turn("stopped")),
    );
    let harness = GateHarness::new();
    let console = ScriptedConsole::new().accept().abort();

    let outcome = harness.run(engine.clone(), console.clone(), "Assess").await;

    assert_eq!(outcome.status, SessionStatus::Aborted);
    assert_eq!(console.shown().len(), 2);
    assert_eq!(harness.tool("nmap_tool").calls(), 0);
    assert_eq!(
        engine.inputs()[1],
        EngineInput::resume(ResumePayload(vec![
            ResumeCommand::Response(ABORT_NOTICE.into()),
            ResumeCommand::Response(ABORT_NOTICE.into()),
        ]))
    );
}
