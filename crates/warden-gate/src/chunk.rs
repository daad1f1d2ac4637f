//! Decoding of engine step output.
//!
//! Engines emit one JSON object per chunk, keyed by the node that produced
//! it (`model_request`, `tools`, `__interrupt__`, ...). Each chunk is
//! decoded once, here, into a [`StepChunk`]; nothing downstream inspects
//! raw keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use warden_core::{ProposedAction, ToolArgs};

/// Key of an approval interrupt.
pub const INTERRUPT_KEY: &str = "__interrupt__";
/// Key of a model turn.
pub const MODEL_REQUEST_KEY: &str = "model_request";
/// Key of tool execution results.
pub const TOOLS_KEY: &str = "tools";
/// Key of a context summarization hook.
pub const SUMMARY_HOOK_KEY: &str = "SummarizationMiddleware.before_model";

/// A tool call written into a model message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub args: ToolArgs,
    /// Engine-assigned call id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One message of a model turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentMessage {
    /// Text content, flattened from content parts.
    pub content: String,
    /// Tool calls the model wrote.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// One decoded chunk of engine output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepChunk {
    /// The model produced messages.
    ModelRequest {
        /// Messages in order.
        messages: Vec<AgentMessage>,
    },
    /// Tools ran and returned results, keyed by tool or channel name.
    ToolResults {
        /// Raw results.
        results: Map<String, Value>,
    },
    /// The engine paused for operator approval.
    Interrupt {
        /// Proposed tool calls, in the order the engine listed them.
        proposals: Vec<ProposedAction>,
    },
    /// The engine summarized its context.
    SummaryHook {
        /// Hook payload.
        summary: Value,
    },
    /// Anything else.
    Unknown {
        /// Top-level key, or empty when the chunk was not an object.
        source: String,
        /// Raw chunk body.
        value: Value,
    },
}

impl StepChunk {
    /// Decode one raw chunk. Never fails; unrecognized shapes become
    /// [`StepChunk::Unknown`].
    #[must_use]
    pub fn decode(raw: Value) -> Self {
        let Value::Object(mut object) = raw else {
            return Self::Unknown {
                source: String::new(),
                value: raw,
            };
        };

        if let Some(interrupts) = object.remove(INTERRUPT_KEY) {
            let proposals = interrupt_entries(&interrupts)
                .into_iter()
                .filter_map(proposal_from_entry)
                .collect();
            return Self::Interrupt { proposals };
        }

        let Some(source) = object.keys().next().cloned() else {
            return Self::Unknown {
                source: String::new(),
                value: Value::Object(object),
            };
        };
        let body = object.remove(&source).unwrap_or(Value::Null);

        match source.as_str() {
            MODEL_REQUEST_KEY => match body.get("messages").and_then(Value::as_array) {
                Some(messages) => Self::ModelRequest {
                    messages: messages.iter().map(decode_message).collect(),
                },
                None => Self::Unknown { source, value: body },
            },
            TOOLS_KEY => match body {
                Value::Object(results) => Self::ToolResults { results },
                other => Self::Unknown {
                    source,
                    value: other,
                },
            },
            SUMMARY_HOOK_KEY => Self::SummaryHook { summary: body },
            _ => Self::Unknown { source, value: body },
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelRequest { .. } => "model_request",
            Self::ToolResults { .. } => "tool_results",
            Self::Interrupt { .. } => "interrupt",
            Self::SummaryHook { .. } => "summary_hook",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Whether a step ending on this chunk waits for an operator decision.
    ///
    /// True for interrupts and for model turns that wrote tool calls.
    #[must_use]
    pub fn requests_decision(&self) -> bool {
        match self {
            Self::Interrupt { .. } => true,
            Self::ModelRequest { messages } => messages.iter().any(|m| !m.tool_calls.is_empty()),
            _ => false,
        }
    }

    /// Proposals carried by this chunk.
    #[must_use]
    pub fn proposals(&self) -> Vec<ProposedAction> {
        match self {
            Self::Interrupt { proposals } => proposals.clone(),
            Self::ModelRequest { messages } => messages
                .iter()
                .flat_map(|m| &m.tool_calls)
                .map(|call| ProposedAction::new(call.name.clone(), call.args.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Text a final model turn showed, joined by blank lines.
    #[must_use]
    pub fn final_content(&self) -> Option<String> {
        let Self::ModelRequest { messages } = self else {
            return None;
        };
        let parts: Vec<&str> = messages
            .iter()
            .map(|m| m.content.trim())
            .filter(|c| !c.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }
}

/// Flatten the interrupt shapes engines use into individual entries:
/// `[{"value": [entry, ...]}]`, `[{"value": {"action_requests": [...]}}]`,
/// or bare entries.
fn interrupt_entries(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Array(items) => items.iter().flat_map(interrupt_entries).collect(),
        Value::Object(object) => {
            if let Some(inner) = object.get("value") {
                interrupt_entries(inner)
            } else if let Some(requests) = object.get("action_requests") {
                interrupt_entries(requests)
            } else if object.get("name").is_some_and(Value::is_string) {
                vec![object]
            } else {
                Vec::new()
            }
        },
        _ => Vec::new(),
    }
}

fn proposal_from_entry(entry: &Map<String, Value>) -> Option<ProposedAction> {
    let name = entry.get("name")?.as_str()?;
    let args = entry
        .get("args")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let mut proposal = ProposedAction::new(name, args);
    if let Some(proposer) = ["proposer", "subagent"]
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_str))
    {
        proposal = proposal.with_proposer(proposer);
    }
    if let Some(description) = entry
        .get("description")
        .and_then(Value::as_str)
        .filter(|d| !d.trim().is_empty())
    {
        proposal = proposal.with_description(description);
    }
    Some(proposal)
}

fn decode_message(raw: &Value) -> AgentMessage {
    let content = match raw.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.as_str().or_else(|| p.get("text").and_then(Value::as_str)))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };
    let tool_calls = raw
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| serde_json::from_value(c.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    AgentMessage {
        content,
        tool_calls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interrupt_with_value_list() {
        let chunk = StepChunk::decode(json!({
            "__interrupt__": [{"value": [
                {"name": "nmap_tool", "args": {"target": "10.0.0.5"}, "description": "scan it"},
                {"name": "sqlmap_tool", "args": {"url": "http://t"}, "proposer": "vuln_scan"}
            ]}]
        }));
        let proposals = chunk.proposals();
        assert!(chunk.requests_decision());
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].tool_name, "nmap_tool");
        assert_eq!(proposals[0].description.as_deref(), Some("scan it"));
        assert_eq!(proposals[1].proposer, "vuln_scan");
    }

    #[test]
    fn test_interrupt_with_action_requests() {
        let chunk = StepChunk::decode(json!({
            "__interrupt__": [{"value": {"action_requests": [
                {"name": "mssql_agent_tool", "args": {"host": "db"}}
            ], "review_configs": []}}]
        }));
        assert_eq!(chunk.proposals()[0].tool_name, "mssql_agent_tool");
    }

    #[test]
    fn test_empty_interrupt_still_requests_decision() {
        let chunk = StepChunk::decode(json!({"__interrupt__": []}));
        assert!(chunk.requests_decision());
        assert!(chunk.proposals().is_empty());
    }

    #[test]
    fn test_final_model_turn() {
        let chunk = StepChunk::decode(json!({
            "model_request": {"messages": [
                {"content": "Scan complete."},
                {"content": [{"type": "text", "text": "No SQL Server found."}]}
            ]}
        }));
        assert!(!chunk.requests_decision());
        assert_eq!(
            chunk.final_content().as_deref(),
            Some("Scan complete.\n\nNo SQL Server found.")
        );
    }

    #[test]
    fn test_model_tool_calls_request_decision() {
        let chunk = StepChunk::decode(json!({
            "model_request": {"messages": [
                {"content": "", "tool_calls": [{"name": "nmap_tool", "args": {"target": "h"}, "id": "c1"}]}
            ]}
        }));
        assert!(chunk.requests_decision());
        assert_eq!(chunk.proposals()[0].tool_name, "nmap_tool");
        assert!(chunk.final_content().is_none());
    }

    #[test]
    fn test_other_kinds() {
        assert_eq!(StepChunk::decode(json!({"tools": {"nmap_tool": {"success": true}}})).kind(), "tool_results");
        assert_eq!(StepChunk::decode(json!({SUMMARY_HOOK_KEY: null})).kind(), "summary_hook");
        assert!(matches!(
            StepChunk::decode(json!({"todos": []})),
            StepChunk::Unknown { source, .. } if source == "todos"
        ));
        assert!(matches!(StepChunk::decode(json!("text")), StepChunk::Unknown { .. }));
    }
}
