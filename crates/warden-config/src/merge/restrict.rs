//! Workspace restriction semantics: a workspace config may only tighten.

use tracing::warn;

use super::{get_nested, set_nested};

/// Undo any loosening the workspace layer applied to `merged`.
///
/// `baseline` is the merged tree before the workspace layer and
/// `workspace` is the raw workspace overlay.
pub fn enforce_restrictions(
    merged: &mut toml::Value,
    baseline: &toml::Value,
    workspace: &toml::Value,
) {
    keep_true(merged, baseline, workspace, &["approval", "default_requires_approval"]);
    keep_tool_approvals(merged, baseline, workspace);

    clamp_int(merged, baseline, workspace, &["gate", "max_iterations"]);
    clamp_int(merged, baseline, workspace, &["gate", "max_consecutive_engine_errors"]);

    keep_false(merged, baseline, workspace, &["tools", "database", "allow_agent_sql"]);
    keep_true(merged, baseline, workspace, &["tools", "database", "dry_run"]);

    union_strings(merged, baseline, workspace, &["safety", "blocked_flags"]);
    narrow_schemas(merged, baseline, workspace);
}

fn bool_at(value: &toml::Value, path: &[&str]) -> Option<bool> {
    get_nested(value, path).and_then(toml::Value::as_bool)
}

fn strings_at(value: &toml::Value, path: &[&str]) -> Option<Vec<toml::Value>> {
    get_nested(value, path).and_then(|v| v.as_array().cloned())
}

/// A flag the baseline has `true` stays `true`.
fn keep_true(merged: &mut toml::Value, baseline: &toml::Value, workspace: &toml::Value, path: &[&str]) {
    if bool_at(workspace, path) == Some(false) && bool_at(baseline, path) == Some(true) {
        warn!(field = %path.join("."), "Workspace config tried to disable a safety flag; keeping true");
        set_nested(merged, path, toml::Value::Boolean(true));
    }
}

/// A flag the baseline has `false` stays `false`.
fn keep_false(merged: &mut toml::Value, baseline: &toml::Value, workspace: &toml::Value, path: &[&str]) {
    if bool_at(workspace, path) == Some(true) && bool_at(baseline, path) != Some(true) {
        warn!(field = %path.join("."), "Workspace config tried to enable a dangerous flag; keeping false");
        set_nested(merged, path, toml::Value::Boolean(false));
    }
}

fn keep_tool_approvals(merged: &mut toml::Value, baseline: &toml::Value, workspace: &toml::Value) {
    let Some(ws_tools) = get_nested(workspace, &["approval", "tools"]).and_then(toml::Value::as_table)
    else {
        return;
    };
    let baseline_default =
        bool_at(baseline, &["approval", "default_requires_approval"]).unwrap_or(true);

    for (tool, value) in ws_tools {
        if value.as_bool() != Some(false) {
            continue;
        }
        let baseline_value =
            bool_at(baseline, &["approval", "tools", tool.as_str()]).unwrap_or(baseline_default);
        if baseline_value {
            warn!(tool = %tool, "Workspace config tried to waive approval for a tool; keeping it gated");
            set_nested(merged, &["approval", "tools", tool.as_str()], toml::Value::Boolean(true));
        }
    }
}

fn clamp_int(merged: &mut toml::Value, baseline: &toml::Value, workspace: &toml::Value, path: &[&str]) {
    let base = get_nested(baseline, path).and_then(toml::Value::as_integer);
    let ws = get_nested(workspace, path).and_then(toml::Value::as_integer);
    if let (Some(base_v), Some(ws_v)) = (base, ws)
        && ws_v > base_v
    {
        warn!(field = %path.join("."), from = base_v, to = ws_v, "Workspace config tried to raise a limit; clamping");
        set_nested(merged, path, toml::Value::Integer(base_v));
    }
}

/// Workspace may add entries but not remove baseline ones.
fn union_strings(merged: &mut toml::Value, baseline: &toml::Value, workspace: &toml::Value, path: &[&str]) {
    let (Some(base_items), Some(_)) = (strings_at(baseline, path), strings_at(workspace, path)) else {
        return;
    };
    let mut result = strings_at(merged, path).unwrap_or_default();
    for item in base_items {
        if !result.contains(&item) {
            warn!(field = %path.join("."), "Workspace config removed a baseline entry; restoring it");
            result.push(item);
        }
    }
    set_nested(merged, path, toml::Value::Array(result));
}

/// A non-empty baseline schema list can only shrink. An empty result would
/// disable the check, so it falls back to the baseline.
fn narrow_schemas(merged: &mut toml::Value, baseline: &toml::Value, workspace: &toml::Value) {
    let path = &["safety", "allowed_schemas"];
    let (Some(base_items), Some(ws_items)) = (strings_at(baseline, path), strings_at(workspace, path))
    else {
        return;
    };
    if base_items.is_empty() {
        return;
    }
    let narrowed: Vec<toml::Value> = ws_items.into_iter().filter(|s| base_items.contains(s)).collect();
    let result = if narrowed.is_empty() { base_items } else { narrowed };
    set_nested(merged, path, toml::Value::Array(result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::deep_merge;

    const BASE: &str = r#"
        [approval]
        default_requires_approval = true
        [approval.tools]
        ls = false
        [gate]
        max_iterations = 100
        [tools.database]
        allow_agent_sql = false
        dry_run = true
        [safety]
        allowed_schemas = ["dbo", "sys"]
        blocked_flags = ["--os-shell"]
    "#;

    fn apply(ws: &str) -> toml::Value {
        let baseline: toml::Value = toml::from_str(BASE).unwrap();
        let overlay: toml::Value = toml::from_str(ws).unwrap();
        let mut merged = baseline.clone();
        deep_merge(&mut merged, &overlay);
        enforce_restrictions(&mut merged, &baseline, &overlay);
        merged
    }

    #[test]
    fn test_cannot_waive_approval() {
        let merged = apply(
            "[approval]\ndefault_requires_approval = false\n[approval.tools]\nnmap_tool = false\nls = false\n",
        );
        assert_eq!(bool_at(&merged, &["approval", "default_requires_approval"]), Some(true));
        assert_eq!(bool_at(&merged, &["approval", "tools", "nmap_tool"]), Some(true));
        // Already waived above the workspace layer.
        assert_eq!(bool_at(&merged, &["approval", "tools", "ls"]), Some(false));
    }

    #[test]
    fn test_can_tighten() {
        let merged = apply("[gate]\nmax_iterations = 10\n[approval.tools]\nls = true\n");
        assert_eq!(merged["gate"]["max_iterations"].as_integer(), Some(10));
        assert_eq!(bool_at(&merged, &["approval", "tools", "ls"]), Some(true));
    }

    #[test]
    fn test_limits_and_database_flags() {
        let merged = apply(
            "[gate]\nmax_iterations = 5000\n[tools.database]\nallow_agent_sql = true\ndry_run = false\n",
        );
        assert_eq!(merged["gate"]["max_iterations"].as_integer(), Some(100));
        assert_eq!(bool_at(&merged, &["tools", "database", "allow_agent_sql"]), Some(false));
        assert_eq!(bool_at(&merged, &["tools", "database", "dry_run"]), Some(true));
    }

    #[test]
    fn test_lists() {
        let merged = apply(
            "[safety]\nblocked_flags = [\"--dump\"]\nallowed_schemas = [\"dbo\", \"hr\"]\n",
        );
        let flags = strings_at(&merged, &["safety", "blocked_flags"]).unwrap();
        assert!(flags.contains(&toml::Value::from("--dump")));
        assert!(flags.contains(&toml::Value::from("--os-shell")));
        let schemas = strings_at(&merged, &["safety", "allowed_schemas"]).unwrap();
        assert_eq!(schemas, vec![toml::Value::from("dbo")]);

        let widened = apply("[safety]\nallowed_schemas = []\n");
        assert_eq!(strings_at(&widened, &["safety", "allowed_schemas"]).unwrap().len(), 2);
    }
}
