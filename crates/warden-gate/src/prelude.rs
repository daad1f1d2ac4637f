//! Common imports for running approval gate sessions.

pub use crate::{
    AgentEngine, ApprovalGate, ChunkStream, EngineError, EngineInput, EngineResult, GateError,
    GateResult, HttpAgentEngine, Notice, NoticeLevel, SessionObserver, SessionOutcome, StepChunk,
    ToolBroker,
};
