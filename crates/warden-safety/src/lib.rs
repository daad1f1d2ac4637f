//! Warden Safety - Content-level validation beneath the human approval gate.
//!
//! This crate provides:
//! - [`SqlValidator`] / [`validate_sql`]: forbidden-keyword and schema
//!   allow-list checks for agent-generated SQL
//! - [`FlagFilter`]: a blacklist that strips dangerous flags from process
//!   argument lists
//! - [`ArgumentInspector`]: finds SQL and flag text inside proposed tool
//!   arguments so verdicts can be shown alongside the proposal
//! - [`split_args`]: quote-aware splitting of argument strings
//! - [`validate_target`]: syntax check for engagement targets
//!
//! Validation is pure. A rejected input is a [`SafetyVerdict`] with
//! `is_safe == false`, never an error.
//!
//! # Example
//!
//! ```
//! use warden_safety::{FlagFilter, validate_sql};
//!
//! let verdict = validate_sql("DROP TABLE accounts", None);
//! assert!(!verdict.is_safe);
//!
//! let kept = FlagFilter::default().filter(&["-p", "id", "--os-shell", "--risk=2"]);
//! assert_eq!(kept, vec!["-p", "id", "--risk=2"]);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod flags;
mod inspect;
mod split;
mod sql;
mod target;
mod verdict;

pub use error::{SafetyError, SafetyResult};
pub use flags::{DEFAULT_BLOCKED_FLAGS, FilteredArgs, FlagFilter};
pub use inspect::{ArgumentInspector, FLAG_ARGUMENT_KEYS, SQL_ARGUMENT_KEYS, inspect_arguments};
pub use split::split_args;
pub use sql::{EMPTY_QUERY_REASON, SqlRiskCategory, SqlValidator, validate_sql};
pub use target::{Target, is_valid_ip, is_valid_url, validate_target};
pub use verdict::SafetyVerdict;
