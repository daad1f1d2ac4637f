//! Warden Test - Shared test utilities for warden crates.
//!
//! This crate provides scripted stand-ins for everything the approval gate
//! talks to, so sessions can be driven end to end without a model, a
//! terminal or a database.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_test::{GateHarness, ScriptedConsole, ScriptedEngine, ScriptedStep, proposal};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_accepted_scan() {
//!     let engine = Arc::new(
//!         ScriptedEngine::new()
//!             .then(ScriptedStep::interrupt(vec![proposal("network_scan", json!({"target": "10.0.0.5"}))]))
//!             .then(ScriptedStep::final_turn("done")),
//!     );
//!     let harness = GateHarness::new();
//!     harness.run(engine, ScriptedConsole::new().accept(), "scan 10.0.0.5").await;
//!     assert_eq!(harness.tool("network_scan").calls(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod console;
pub mod database;
pub mod engine;
pub mod fixtures;
pub mod harness;

pub use console::*;
pub use database::*;
pub use engine::*;
pub use fixtures::*;
pub use harness::*;
