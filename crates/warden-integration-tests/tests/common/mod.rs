//! Shared assertions for integration tests.

use serde_json::Value;
use warden_audit::{AuditEvent, AuditEventType};

/// A tool call an operator authorized, as recorded in its decision.
#[derive(Debug, Clone, PartialEq)]
struct Authorized {
    tool: String,
    args: Value,
}

fn authorized_call(decision: &AuditEvent) -> Option<Authorized> {
    let details = &decision.details;
    match details.get("decision").and_then(Value::as_str) {
        Some("accept") => {
            let proposal = details.get("proposal")?;
            Some(Authorized {
                tool: proposal.get("tool_name")?.as_str()?.to_string(),
                args: proposal.get("arguments").cloned().unwrap_or(Value::Null),
            })
        },
        Some("edit") => {
            let payload = details.get("payload")?;
            Some(Authorized {
                tool: payload.get("action")?.as_str()?.to_string(),
                args: payload.get("args").cloned().unwrap_or(Value::Null),
            })
        },
        _ => None,
    }
}

/// Check that every `tool_invocation` consumes exactly one earlier
/// accept/edit decision for the same tool and arguments.
///
/// # Panics
///
/// Panics with the offending event when the invariant does not hold.
#[allow(dead_code)]
pub fn assert_gate_invariant(events: &[AuditEvent]) {
    let mut unconsumed: Vec<Authorized> = Vec::new();
    for event in events {
        match event.event_type {
            AuditEventType::HumanDecision => {
                if let Some(call) = authorized_call(event) {
                    unconsumed.push(call);
                }
            },
            AuditEventType::ToolInvocation => {
                let invoked = Authorized {
                    tool: event
                        .details
                        .get("tool")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    args: event.details.get("arguments").cloned().unwrap_or(Value::Null),
                };
                let position = unconsumed.iter().position(|c| *c == invoked);
                assert!(
                    position.is_some(),
                    "tool_invocation without a matching accept/edit decision: {event:?}"
                );
                if let Some(index) = position {
                    unconsumed.remove(index);
                }
            },
            _ => {},
        }
    }
}

/// Positions of `event_type` in `types`.
#[allow(dead_code)]
pub fn positions(types: &[AuditEventType], event_type: AuditEventType) -> Vec<usize> {
    types
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == event_type)
        .map(|(i, _)| i)
        .collect()
}
