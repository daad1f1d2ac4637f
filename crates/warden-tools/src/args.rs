//! Typed access to loosely-shaped tool arguments.

use serde_json::Value;
use warden_core::ToolArgs;

use crate::error::{ToolError, ToolResult};

/// A required, non-blank string.
pub(crate) fn required_str<'a>(args: &'a ToolArgs, key: &str) -> ToolResult<&'a str> {
    optional_str(args, key).ok_or_else(|| ToolError::InvalidArguments(format!("{key} is required")))
}

/// A non-blank string, if present.
pub(crate) fn optional_str<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// An unsigned integer given as a number or numeric string.
pub(crate) fn optional_u64(args: &ToolArgs, key: &str) -> ToolResult<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(key, "a non-negative integer")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, "a non-negative integer")),
        Some(_) => Err(invalid(key, "a non-negative integer")),
    }
}

/// A boolean given as a bool or `"true"`/`"false"`.
pub(crate) fn optional_bool(args: &ToolArgs, key: &str) -> ToolResult<Option<bool>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(invalid(key, "a boolean")),
        },
        Some(_) => Err(invalid(key, "a boolean")),
    }
}

/// A list of strings, also accepting a single string.
pub(crate) fn string_list(args: &ToolArgs, key: &str) -> ToolResult<Vec<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(ToString::to_string)
                    .ok_or_else(|| invalid(key, "a list of strings"))
            })
            .collect(),
        Some(_) => Err(invalid(key, "a list of strings")),
    }
}

fn invalid(key: &str, expected: &str) -> ToolError {
    ToolError::InvalidArguments(format!("{key} must be {expected}"))
}
