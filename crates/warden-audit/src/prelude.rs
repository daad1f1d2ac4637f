//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_audit::prelude::*;` to import all essential types.

pub use crate::{
    AuditError, AuditEvent, AuditEventType, AuditLog, AuditResult, AuditSummary,
    ChainVerification,
};
