//! Common imports for warden tests.

pub use crate::{
    GateHarness, MemoryConnector, MemoryDatabase, RecordingTool, ScriptedConsole, ScriptedEngine,
    ScriptedStep, final_chunk, interrupt_chunk, proposal,
};
