//! Warden Core - Foundation types shared by every warden crate.
//!
//! This crate provides:
//! - Session and thread identifiers
//! - The [`Timestamp`] wrapper used for audit records
//! - [`ProposedAction`], the candidate tool call emitted by an agent engine
//! - [`SessionStatus`], the approval gate's lifecycle states
//! - The phase/subagent roster ([`PhaseDescriptor`], [`PhaseRoster`])

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod phase;
pub mod proposal;
pub mod session;
pub mod types;

pub use phase::{PhaseDescriptor, PhaseRoster, RosterCheck, TOP_LEVEL_PROPOSER};
pub use proposal::{ProposedAction, ToolArgs};
pub use session::SessionStatus;
pub use types::{SessionId, ThreadId, Timestamp};
