//! Warden Audit - Append-only, tamper-evident session audit log.
//!
//! This crate provides:
//! - [`AuditLog`], a per-session NDJSON writer (one file per session)
//! - Helpers for the common event shapes (tool invocation, tool result,
//!   human decision, database query, error, warning)
//! - Hash chaining of records (each carries the BLAKE3 hash of the previous)
//! - Tolerant read-back: [`read_events`], [`summarize_file`], [`list_audit_files`]
//! - Chain verification with [`verify_file`]
//!
//! # Durability
//!
//! Every record is written with append-open, write, sync, close. A failed
//! write is reported through `tracing` and never interrupts the caller.
//!
//! # Example
//!
//! ```
//! use warden_audit::{AuditLog, verify_file};
//! use warden_core::SessionId;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let log = AuditLog::create(dir.path(), SessionId::new(), "alice").unwrap();
//! log.log_human_decision("accept", "network_scan", "alice", Default::default());
//! let summary = log.close_session();
//! assert_eq!(summary.total_events, 2);
//!
//! assert!(verify_file(log.path()).unwrap().valid);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod event;
mod log;
mod reader;
mod verify;

pub use error::{AuditError, AuditResult};
pub use event::{AuditEvent, AuditEventType, GENESIS_HASH, SYSTEM_ACTOR};
pub use log::{AuditLog, MAX_LOGGED_QUERY_CHARS};
pub use reader::{
    AuditFileInfo, AuditSummary, ParsedAuditFile, list_audit_files, read_events, summarize_file,
};
pub use verify::{ChainIssue, ChainVerification, verify_file};
