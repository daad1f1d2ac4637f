//! Client for an agent engine served over HTTP.
//!
//! Wire contract:
//! - `POST {base}/threads/{thread}/steps` with `{"input": ..., "tools": [...]}`
//!   answers with newline-delimited JSON. Each line is one chunk object,
//!   or one of two control lines:
//!   - `{"tool_call": {"id", "name", "args"}}`: the engine wants a tool run.
//!     The client runs it through the broker and posts
//!     `{"call_id", "output"}` to `{base}/threads/{thread}/tool_results`.
//!   - `{"error": "..."}`: the step failed.
//! - `GET {base}/threads/{thread}` answers `{"resumable": bool}`.

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, warn};
use warden_config::EngineConfig;
use warden_core::ThreadId;

use crate::broker::ToolBroker;
use crate::chunk::{StepChunk, ToolCallRequest};
use crate::engine::{AgentEngine, ChunkStream, EngineInput};
use crate::error::{EngineError, EngineResult};

/// One decoded stream line.
#[derive(Debug)]
enum StreamLine {
    Chunk(StepChunk),
    ToolCall(ToolCallRequest),
    Failure(String),
}

impl StreamLine {
    fn parse(line: &str) -> EngineResult<Self> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| EngineError::Decode(format!("{e}: {line}")))?;
        if let Value::Object(object) = &value
            && object.len() == 1
        {
            if let Some(call) = object.get("tool_call") {
                let call = serde_json::from_value(call.clone())
                    .map_err(|e| EngineError::Decode(format!("tool_call: {e}")))?;
                return Ok(Self::ToolCall(call));
            }
            if let Some(message) = object.get("error") {
                let message = message
                    .as_str()
                    .map_or_else(|| message.to_string(), str::to_owned);
                return Ok(Self::Failure(message));
            }
        }
        Ok(Self::Chunk(StepChunk::decode(value)))
    }
}

/// Splits a byte stream into lines, decoding each line only once it is
/// complete so multi-byte characters split across reads stay intact.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<EngineResult<String>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        Some(decode_line(line))
    }

    fn finish(&mut self) -> Option<EngineResult<String>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(decode_line(std::mem::take(&mut self.pending)))
    }
}

fn decode_line(bytes: Vec<u8>) -> EngineResult<String> {
    String::from_utf8(bytes)
        .map(|line| line.trim().to_string())
        .map_err(|e| EngineError::Decode(format!("engine sent invalid UTF-8: {e}")))
}

#[derive(Debug, Deserialize)]
struct ThreadState {
    #[serde(default)]
    resumable: bool,
}

/// [`AgentEngine`] backed by a remote service.
#[derive(Debug, Clone)]
pub struct HttpAgentEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgentEngine {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the `[engine]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unavailable`] if no URL is configured.
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| EngineError::Unavailable("no engine URL configured".to_string()))?;
        Self::new(url, Duration::from_secs(config.request_timeout_secs))
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn thread_url(&self, thread_id: &ThreadId) -> String {
        format!("{}/threads/{}", self.base_url, thread_id.0)
    }
}

#[async_trait]
impl AgentEngine for HttpAgentEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn step(
        &self,
        thread_id: &ThreadId,
        input: EngineInput,
        broker: Arc<ToolBroker>,
    ) -> EngineResult<ChunkStream> {
        let thread_url = self.thread_url(thread_id);
        let body = json!({
            "input": input,
            "tools": broker.definitions(),
        });

        debug!(url = %thread_url, "Starting engine step");
        let response = self
            .client
            .post(format!("{thread_url}/steps"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Engine step rejected");
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let client = self.client.clone();
        let results_url = format!("{thread_url}/tool_results");

        let stream = try_stream! {
            let mut bytes_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(bytes) = bytes_stream.next().await {
                lines.push(&bytes?);

                while let Some(line) = lines.next_line() {
                    let line = line?;
                    if line.is_empty() {
                        continue;
                    }

                    match StreamLine::parse(&line)? {
                        StreamLine::Chunk(chunk) => yield chunk,
                        StreamLine::ToolCall(call) => {
                            let output = broker.invoke(&call.name, &call.args).await;
                            let reply = client
                                .post(&results_url)
                                .json(&json!({"call_id": call.id, "output": output.to_value()}))
                                .send()
                                .await?;
                            if !reply.status().is_success() {
                                warn!(status = %reply.status(), tool = %call.name, "Engine rejected tool result");
                            }
                        },
                        StreamLine::Failure(message) => {
                            Err::<(), _>(EngineError::Remote(message))?;
                        },
                    }
                }
            }

            if let Some(tail) = lines.finish() {
                let tail = tail?;
                if !tail.is_empty() {
                    match StreamLine::parse(&tail)? {
                        StreamLine::Chunk(chunk) => yield chunk,
                        StreamLine::Failure(message) => Err::<(), _>(EngineError::Remote(message))?,
                        StreamLine::ToolCall(call) => {
                            warn!(tool = %call.name, "Ignoring tool call at end of stream");
                        },
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn is_resumable(&self, thread_id: &ThreadId) -> bool {
        let response = match self.client.get(self.thread_url(thread_id)).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "Thread state unavailable");
                return false;
            },
            Err(e) => {
                debug!(error = %e, "Thread state request failed");
                return false;
            },
        };
        response
            .json::<ThreadState>()
            .await
            .is_ok_and(|state| state.resumable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chunk_line() {
        let line = StreamLine::parse(r#"{"model_request": {"messages": [{"content": "done"}]}}"#)
            .unwrap();
        assert!(matches!(line, StreamLine::Chunk(StepChunk::ModelRequest { .. })));
    }

    #[test]
    fn test_parse_control_lines() {
        let call = StreamLine::parse(
            r#"{"tool_call": {"id": "c1", "name": "nmap_tool", "args": {"target": "h"}}}"#,
        )
        .unwrap();
        assert!(matches!(call, StreamLine::ToolCall(ref c) if c.name == "nmap_tool"));

        let failure = StreamLine::parse(r#"{"error": "model overloaded"}"#).unwrap();
        assert!(matches!(failure, StreamLine::Failure(ref m) if m == "model overloaded"));
    }

    #[test]
    fn test_line_split_inside_a_character_decodes_intact() {
        let line = "{\"tool_call\": {\"id\": \"c1\", \"name\": \"nmap_tool\", \"args\": {\"target\": \"h\u{f4}st\"}}}\n";
        let bytes = line.as_bytes();
        let split = line.find('\u{f4}').unwrap() + 1;

        let mut lines = LineBuffer::default();
        lines.push(&bytes[..split]);
        assert!(lines.next_line().is_none());
        lines.push(&bytes[split..]);

        let decoded = lines.next_line().unwrap().unwrap();
        let StreamLine::ToolCall(call) = StreamLine::parse(&decoded).unwrap() else {
            panic!("expected a tool call");
        };
        assert_eq!(call.args["target"], "h\u{f4}st");
        assert!(lines.finish().is_none());
    }

    #[test]
    fn test_line_buffer_keeps_unterminated_tail() {
        let mut lines = LineBuffer::default();
        lines.push(b"{\"a\": 1}\n\n{\"b\"");
        assert_eq!(lines.next_line().unwrap().unwrap(), "{\"a\": 1}");
        assert_eq!(lines.next_line().unwrap().unwrap(), "");
        assert!(lines.next_line().is_none());
        lines.push(b": 2}");
        assert_eq!(lines.finish().unwrap().unwrap(), "{\"b\": 2}");
    }

    #[test]
    fn test_invalid_utf8_line_is_a_decode_error() {
        let mut lines = LineBuffer::default();
        lines.push(&[b'{', 0xC3, b'}', b'\n']);
        assert!(matches!(lines.next_line(), Some(Err(EngineError::Decode(_)))));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            StreamLine::parse("not json"),
            Err(EngineError::Decode(_))
        ));
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = EngineConfig::default();
        assert!(matches!(
            HttpAgentEngine::from_config(&config),
            Err(EngineError::Unavailable(_))
        ));

        let config = EngineConfig {
            url: Some("http://127.0.0.1:8123/".to_string()),
            request_timeout_secs: 5,
        };
        let engine = HttpAgentEngine::from_config(&config).unwrap();
        assert_eq!(engine.base_url(), "http://127.0.0.1:8123");
        let thread = ThreadId::new();
        assert_eq!(
            engine.thread_url(&thread),
            format!("http://127.0.0.1:8123/threads/{}", thread.0)
        );
    }
}
