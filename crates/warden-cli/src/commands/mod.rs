//! CLI subcommands.

pub(crate) mod audit;
pub(crate) mod config;
pub(crate) mod doctor;
pub(crate) mod run;
pub(crate) mod validate;
