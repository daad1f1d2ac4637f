//! Environment variable fallbacks.
//!
//! Environment variables are fallbacks, not overrides: they only apply to
//! fields that no config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, set_nested};

/// Kind of value an environment variable carries.
#[derive(Clone, Copy)]
enum EnvKind {
    Str,
    Int,
}

struct EnvMapping {
    var_name: &'static str,
    field_path: &'static [&'static str],
    kind: EnvKind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "WARDEN_AUDIT_DIR",
        field_path: &["audit", "directory"],
        kind: EnvKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_OPERATOR",
        field_path: &["operator", "id"],
        kind: EnvKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_LOG_LEVEL",
        field_path: &["logging", "level"],
        kind: EnvKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_ENGINE_URL",
        field_path: &["engine", "url"],
        kind: EnvKind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_MAX_ITERATIONS",
        field_path: &["gate", "max_iterations"],
        kind: EnvKind::Int,
    },
];

/// Snapshot the `WARDEN_*` environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("WARDEN_"))
        .collect()
}

/// Apply fallbacks for fields still at their default. Returns how many
/// were applied.
///
/// # Errors
///
/// Returns an error if a numeric variable does not parse.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied: usize = 0;
    for mapping in ENV_MAPPINGS {
        let Some(raw) = env.get(mapping.var_name).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let path = mapping.field_path.join(".");
        let set_by_file = sources
            .get(&path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        let value = match mapping.kind {
            EnvKind::Str => toml::Value::String(raw.clone()),
            EnvKind::Int => toml::Value::Integer(raw.trim().parse().map_err(|_| {
                ConfigError::EnvError {
                    var_name: mapping.var_name.to_owned(),
                    message: format!("expected an integer, got '{raw}'"),
                }
            })?),
        };
        debug!(var = mapping.var_name, field = %path, "applying environment fallback");
        set_nested(merged, mapping.field_path, value);
        sources.insert(path, ConfigLayer::Environment);
        applied = applied.saturating_add(1);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_fills_defaults_only() {
        let mut merged: toml::Value =
            toml::from_str("[operator]\nid = \"from-file\"\n[audit]\ndirectory = \"logs\"\n").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("operator.id".into(), ConfigLayer::User);
        sources.insert("audit.directory".into(), ConfigLayer::Defaults);

        let env = HashMap::from([
            ("WARDEN_OPERATOR".to_owned(), "from-env".to_owned()),
            ("WARDEN_AUDIT_DIR".to_owned(), "/var/audit".to_owned()),
        ]);
        let applied = apply_env_fallbacks(&mut merged, &mut sources, &env).unwrap();

        assert_eq!(applied, 1);
        assert_eq!(merged["operator"]["id"].as_str(), Some("from-file"));
        assert_eq!(merged["audit"]["directory"].as_str(), Some("/var/audit"));
        assert_eq!(sources["audit.directory"], ConfigLayer::Environment);
    }

    #[test]
    fn test_bad_integer() {
        let mut merged: toml::Value = toml::from_str("[gate]\n").unwrap();
        let env = HashMap::from([("WARDEN_MAX_ITERATIONS".to_owned(), "lots".to_owned())]);
        let err = apply_env_fallbacks(&mut merged, &mut FieldSources::new(), &env).unwrap_err();
        assert!(matches!(err, ConfigError::EnvError { .. }));
    }
}
