//! Warden Telemetry - Diagnostic logging for warden.
//!
//! This crate provides:
//! - [`setup_logging`] with configurable level, directives, format and target
//! - [`SessionContext`], whose span tags diagnostics with the session and
//!   thread IDs
//!
//! # Example
//!
//! ```rust,no_run
//! use warden_telemetry::{LogConfig, LogFormat, SessionContext, setup_logging};
//! use warden_core::{SessionId, ThreadId};
//!
//! # fn main() -> Result<(), warden_telemetry::TelemetryError> {
//! setup_logging(&LogConfig::new("debug").with_format(LogFormat::Pretty))?;
//!
//! let ctx = SessionContext::new(SessionId::new(), ThreadId::new(), "alice");
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("Session running");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::SessionContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
