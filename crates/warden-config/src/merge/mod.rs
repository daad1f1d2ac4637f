//! Layered merging of TOML trees with source tracking.

mod deep;
mod restrict;

pub use deep::{deep_merge, deep_merge_tracking, record_leaves};
pub use restrict::enforce_restrictions;

use std::collections::BTreeMap;
use std::fmt;

/// Which layer set a config value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigLayer {
    /// Embedded `defaults.toml`.
    Defaults,
    /// `~/.warden/config.toml`, `$WARDEN_HOME/config.toml` or `--config`.
    User,
    /// `{workspace}/.warden/config.toml`.
    Workspace,
    /// A `WARDEN_*` environment variable.
    Environment,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Defaults => "defaults",
            Self::User => "user",
            Self::Workspace => "workspace",
            Self::Environment => "env",
        })
    }
}

/// Dotted field path to the layer that last set it.
pub type FieldSources = BTreeMap<String, ConfigLayer>;

pub(crate) fn get_nested<'a>(value: &'a toml::Value, path: &[&str]) -> Option<&'a toml::Value> {
    path.iter().try_fold(value, |v, key| v.as_table()?.get(*key))
}

pub(crate) fn set_nested(value: &mut toml::Value, path: &[&str], new: toml::Value) {
    let Some((last, parents)) = path.split_last() else {
        *value = new;
        return;
    };
    let mut current = value;
    for key in parents {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry((*key).to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    if let Some(table) = current.as_table_mut() {
        table.insert((*last).to_owned(), new);
    }
}
