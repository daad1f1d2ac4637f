//! Scripted agent engine.
//!
//! [`ScriptedEngine`] replays pre-configured steps. Like a real engine, when
//! it is resumed it runs the calls the operator accepted or edited through
//! the broker it was handed, and sends nothing for responses.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use warden_approval::ResumeCommand;
use warden_core::{ProposedAction, ThreadId, ToolArgs};
use warden_gate::{AgentEngine, ChunkStream, EngineError, EngineInput, EngineResult, StepChunk, ToolBroker};
use warden_tools::ToolOutput;

use crate::fixtures::{final_chunk, interrupt_chunk};

/// One scripted step.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStep {
    /// Raw chunks yielded in order.
    pub chunks: Vec<Value>,
    /// Calls made through the broker before any chunk, without any decision.
    pub unsolicited_calls: Vec<(String, ToolArgs)>,
    /// Fail the step with this message instead of yielding chunks.
    pub failure: Option<String>,
}

impl ScriptedStep {
    /// A step yielding `chunks`.
    #[must_use]
    pub fn chunks(chunks: Vec<Value>) -> Self {
        Self {
            chunks,
            ..Self::default()
        }
    }

    /// A step ending on an interrupt carrying `proposals`.
    #[must_use]
    pub fn interrupt(proposals: Vec<ProposedAction>) -> Self {
        Self::chunks(vec![interrupt_chunk(&proposals)])
    }

    /// A step ending on a final model turn.
    #[must_use]
    pub fn final_turn(text: &str) -> Self {
        Self::chunks(vec![final_chunk(text)])
    }

    /// A step that fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Also call `tool` through the broker at the start of the step.
    #[must_use]
    pub fn with_unsolicited_call(mut self, tool: impl Into<String>, args: ToolArgs) -> Self {
        self.unsolicited_calls.push((tool.into(), args));
        self
    }
}

/// A broker call made by the engine.
#[derive(Debug, Clone)]
pub struct EngineToolCall {
    /// Tool requested.
    pub tool: String,
    /// Arguments sent.
    pub args: ToolArgs,
    /// What the broker returned.
    pub output: ToolOutput,
}

/// Deterministic, queue-based [`AgentEngine`].
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    steps: Mutex<VecDeque<ScriptedStep>>,
    inputs: Mutex<Vec<EngineInput>>,
    pending: Mutex<Vec<ProposedAction>>,
    calls: Mutex<Vec<EngineToolCall>>,
    not_resumable: AtomicBool,
}

impl ScriptedEngine {
    /// An engine with no steps; every step yields nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a step.
    #[must_use]
    pub fn then(self, step: ScriptedStep) -> Self {
        lock(&self.steps).push_back(step);
        self
    }

    /// Report threads as not resumable after a failure.
    #[must_use]
    pub fn not_resumable(self) -> Self {
        self.not_resumable.store(true, Ordering::SeqCst);
        self
    }

    /// Inputs received, in order.
    #[must_use]
    pub fn inputs(&self) -> Vec<EngineInput> {
        lock(&self.inputs).clone()
    }

    /// Broker calls made, in order.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<EngineToolCall> {
        lock(&self.calls).clone()
    }

    /// Steps not yet replayed.
    #[must_use]
    pub fn remaining_steps(&self) -> usize {
        lock(&self.steps).len()
    }

    async fn call(&self, broker: &ToolBroker, tool: &str, args: ToolArgs) {
        let output = broker.invoke(tool, &args).await;
        lock(&self.calls).push(EngineToolCall {
            tool: tool.to_string(),
            args,
            output,
        });
    }
}

#[async_trait]
impl AgentEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn step(
        &self,
        _thread_id: &ThreadId,
        input: EngineInput,
        broker: Arc<ToolBroker>,
    ) -> EngineResult<ChunkStream> {
        lock(&self.inputs).push(input.clone());

        if let EngineInput::Resume { payload } = &input {
            let pending = std::mem::take(&mut *lock(&self.pending));
            for (proposal, command) in pending.iter().zip(payload.iter()) {
                match command {
                    ResumeCommand::Accept => {
                        self.call(&broker, &proposal.tool_name, proposal.arguments.clone())
                            .await;
                    },
                    ResumeCommand::Edit(edit) => {
                        self.call(&broker, &edit.action, edit.args.clone()).await;
                    },
                    ResumeCommand::Response(_) => {},
                }
            }
        }

        let next = lock(&self.steps).pop_front();
        let Some(step) = next else {
            return Ok(Box::pin(stream::empty()));
        };
        if let Some(message) = step.failure {
            return Err(EngineError::Remote(message));
        }
        for (tool, args) in step.unsolicited_calls {
            self.call(&broker, &tool, args).await;
        }

        let chunks: Vec<StepChunk> = step.chunks.into_iter().map(StepChunk::decode).collect();
        if let Some(last) = chunks.last() {
            *lock(&self.pending) = last.proposals();
        }
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    async fn is_resumable(&self, _thread_id: &ThreadId) -> bool {
        !self.not_resumable.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
