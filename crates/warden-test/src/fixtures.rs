//! Test fixtures for common types.

use serde_json::{Value, json};
use warden_core::{ProposedAction, SessionId, ToolArgs};

/// Create a test session ID.
#[must_use]
pub fn test_session_id() -> SessionId {
    SessionId::new()
}

/// Turn a JSON object into tool arguments. Non-objects become empty.
#[must_use]
pub fn args(value: Value) -> ToolArgs {
    match value {
        Value::Object(map) => map,
        _ => ToolArgs::new(),
    }
}

/// A top-level proposal for `tool` with `arguments` (a JSON object).
#[must_use]
pub fn proposal(tool: &str, arguments: Value) -> ProposedAction {
    ProposedAction::new(tool, args(arguments))
}

/// Raw interrupt chunk carrying `proposals`, in the shape engines emit.
#[must_use]
pub fn interrupt_chunk(proposals: &[ProposedAction]) -> Value {
    let entries: Vec<Value> = proposals
        .iter()
        .map(|p| {
            let mut entry = json!({
                "name": p.tool_name,
                "args": p.arguments,
                "proposer": p.proposer,
            });
            if let Some(description) = &p.description {
                entry["description"] = description.clone().into();
            }
            entry
        })
        .collect();
    json!({"__interrupt__": [{"value": entries}]})
}

/// Raw final model turn showing `text`.
#[must_use]
pub fn final_chunk(text: &str) -> Value {
    json!({"model_request": {"messages": [{"content": text}]}})
}

/// Raw model turn that writes one tool call.
#[must_use]
pub fn tool_call_chunk(tool: &str, arguments: Value) -> Value {
    json!({"model_request": {"messages": [
        {"content": "", "tool_calls": [{"name": tool, "args": arguments, "id": "call_1"}]}
    ]}})
}

/// Raw tool-results chunk.
#[must_use]
pub fn tool_results_chunk(tool: &str, result: Value) -> Value {
    json!({"tools": {tool: result}})
}
