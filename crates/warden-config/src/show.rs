//! Resolved configuration display for `warden config show`.

use std::fmt::Write as _;

use crate::merge::{ConfigLayer, FieldSources};
use crate::types::Config;

/// A resolved configuration together with where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Dotted field path to the layer that set it.
    pub field_sources: FieldSources,
    /// Config files that were loaded, in precedence order.
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with a header listing non-default sources.
    Toml,
    /// Pretty JSON.
    Json,
}

/// Errors from rendering a resolved config.
#[derive(Debug, thiserror::Error)]
pub enum ShowError {
    /// TOML rendering failed.
    #[error("failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
    /// JSON rendering failed.
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The requested section does not exist.
    #[error("no such config section '{0}'")]
    UnknownSection(String),
}

impl ResolvedConfig {
    /// Render the config, optionally a single top-level section.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or `section` is unknown.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> Result<String, ShowError> {
        let mut value = serde_json::to_value(&self.config)?;
        if let Some(name) = section {
            value = value
                .get(name)
                .cloned()
                .ok_or_else(|| ShowError::UnknownSection(name.to_owned()))?;
        }

        match format {
            ShowFormat::Json => Ok(serde_json::to_string_pretty(&value)?),
            ShowFormat::Toml => {
                strip_nulls(&mut value);
                let mut out = String::from("# Resolved warden configuration\n");
                for file in &self.loaded_files {
                    let _ = writeln!(out, "# loaded: {file}");
                }
                for (field, layer) in self.overridden_fields(section) {
                    let _ = writeln!(out, "# {field} <- [{layer}]");
                }
                out.push('\n');
                out.push_str(&toml::to_string_pretty(&value)?);
                Ok(out)
            },
        }
    }

    /// Fields set by something other than the embedded defaults.
    fn overridden_fields<'a>(
        &'a self,
        section: Option<&'a str>,
    ) -> impl Iterator<Item = (&'a String, &'a ConfigLayer)> + 'a {
        self.field_sources.iter().filter(move |(field, layer)| {
            **layer != ConfigLayer::Defaults
                && section.is_none_or(|s| field.split('.').next() == Some(s))
        })
    }
}

/// TOML has no null; unset optional fields are omitted.
fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        },
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {},
    }
}
