//! Warden Gate - The approval gate between an agent engine and its tools.
//!
//! This crate provides:
//! - [`StepChunk`]: engine output decoded once into a tagged enum
//! - [`AgentEngine`]: the step/resume seam, with [`HttpAgentEngine`] for
//!   engines served over HTTP
//! - [`ToolBroker`]: the only path to tool adapters, honoring one-shot
//!   operator grants
//! - [`ApprovalGate`]: the session loop
//!
//! # Session loop
//!
//! ```text
//! Running --(proposal)--> AwaitingDecision --(accept/edit/respond)--> Running
//!    |                          |
//!    |                          +--(abort / Ctrl-C)--> Aborted
//!    +--(final turn / no output)--> Completed
//!    +--(iteration ceiling / unrecoverable engine error)--> Errored
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod broker;
mod chunk;
mod engine;
mod error;
mod gate;
mod http;
mod observer;
mod session;

pub use broker::{NOT_AUTHORIZED, ToolBroker};
pub use chunk::{
    AgentMessage, INTERRUPT_KEY, MODEL_REQUEST_KEY, SUMMARY_HOOK_KEY, StepChunk, TOOLS_KEY,
    ToolCallRequest,
};
pub use engine::{AgentEngine, ChunkStream, EngineInput};
pub use error::{EngineError, EngineResult, GateError, GateResult};
pub use gate::{ApprovalGate, NO_FURTHER_ACTION};
pub use http::HttpAgentEngine;
pub use observer::{Notice, NoticeLevel, SessionObserver, SilentObserver};
pub use session::{Session, SessionOutcome};
