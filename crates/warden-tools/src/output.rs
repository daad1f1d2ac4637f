//! The uniform adapter result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// What every adapter returns: `{success, ...fields, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Whether the tool did what was asked.
    pub success: bool,
    /// Adapter-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    /// A successful result.
    #[must_use]
    pub fn success(fields: Map<String, Value>) -> Self {
        Self {
            success: true,
            fields,
            error: None,
        }
    }

    /// A failed result with no extra fields.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            fields: Map::new(),
            error: Some(error.into()),
        }
    }

    /// Add one field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Short text for the `tool_result` audit record.
    #[must_use]
    pub fn summary(&self) -> String {
        if let Some(err) = &self.error {
            return format!("failed: {err}");
        }
        let status = if self.success { "succeeded" } else { "failed" };
        match self.fields.get("returncode").and_then(Value::as_i64) {
            Some(code) => format!("{status} (exit code {code})"),
            None => status.to_string(),
        }
    }

    /// The flattened JSON object handed back to the engine.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"success": false, "error": format!("unserializable output: {e}")})
        })
    }
}

impl From<ToolError> for ToolOutput {
    fn from(err: ToolError) -> Self {
        Self::failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattened_shape() {
        let out = ToolOutput::success(Map::new())
            .with_field("returncode", 0)
            .with_field("stdout", "done");
        assert_eq!(
            out.to_value(),
            json!({"success": true, "returncode": 0, "stdout": "done"})
        );
        assert_eq!(out.summary(), "succeeded (exit code 0)");
    }

    #[test]
    fn test_error_converts_to_failure() {
        let out = ToolOutput::from(ToolError::Timeout(30));
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("timeout after 30s"));
        assert_eq!(out.to_value(), json!({"success": false, "error": "timeout after 30s"}));
        assert_eq!(out.summary(), "failed: timeout after 30s");
    }
}
