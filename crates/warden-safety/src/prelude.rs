//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_safety::prelude::*;` to import all essential types.

pub use crate::{ArgumentInspector, FlagFilter, SafetyVerdict, SqlValidator, validate_sql};
