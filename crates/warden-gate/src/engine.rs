//! The agent engine seam.
//!
//! An engine plans tool calls and streams its progress as [`StepChunk`]s.
//! It never runs a tool itself: tool execution goes through the
//! [`ToolBroker`] it is handed, which refuses anything the operator has
//! not authorized.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use warden_approval::ResumePayload;
use warden_core::{PhaseDescriptor, ThreadId};

use crate::broker::ToolBroker;
use crate::chunk::StepChunk;
use crate::error::EngineResult;

/// Stream of decoded chunks for one step.
pub type ChunkStream = Pin<Box<dyn Stream<Item = EngineResult<StepChunk>> + Send>>;

/// Input for one engine step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineInput {
    /// First step of a session.
    Start {
        /// Operator's objective.
        prompt: String,
        /// Phase roster the engine should plan with.
        phases: Vec<PhaseDescriptor>,
    },
    /// Continue a paused thread with the operator's decisions.
    Resume {
        /// One command per pending proposal.
        payload: ResumePayload,
    },
}

impl EngineInput {
    /// Start input.
    #[must_use]
    pub fn start(prompt: impl Into<String>, phases: Vec<PhaseDescriptor>) -> Self {
        Self::Start {
            prompt: prompt.into(),
            phases,
        }
    }

    /// Resume input.
    #[must_use]
    pub fn resume(payload: ResumePayload) -> Self {
        Self::Resume { payload }
    }
}

/// An external planner driven one step at a time.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Run one step on `thread_id` and stream what it produces.
    ///
    /// The step ends when the stream ends. Tools the engine wants to run
    /// during the step must be invoked through `broker`.
    async fn step(
        &self,
        thread_id: &ThreadId,
        input: EngineInput,
        broker: Arc<ToolBroker>,
    ) -> EngineResult<ChunkStream>;

    /// Whether `thread_id` has saved state a retried step can pick up.
    async fn is_resumable(&self, thread_id: &ThreadId) -> bool;
}
