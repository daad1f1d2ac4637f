//! Pre-screening of proposed tool arguments for display to the operator.

use serde_json::Value;
use warden_core::ToolArgs;

use crate::flags::FlagFilter;
use crate::split::split_args;
use crate::sql::SqlValidator;
use crate::verdict::SafetyVerdict;

/// Argument keys whose values are SQL text.
pub const SQL_ARGUMENT_KEYS: &[&str] = &["query", "sql", "custom_queries"];

/// Argument keys whose values are command-line arguments.
pub const FLAG_ARGUMENT_KEYS: &[&str] = &["arguments", "extra_args"];

/// Finds command and query text embedded in tool arguments and validates it.
#[derive(Debug, Clone, Default)]
pub struct ArgumentInspector {
    sql: SqlValidator,
    flags: FlagFilter,
}

impl ArgumentInspector {
    /// Create an inspector from its two validators.
    #[must_use]
    pub fn new(sql: SqlValidator, flags: FlagFilter) -> Self {
        Self { sql, flags }
    }

    /// The SQL validator.
    #[must_use]
    pub fn sql(&self) -> &SqlValidator {
        &self.sql
    }

    /// The flag filter.
    #[must_use]
    pub fn flags(&self) -> &FlagFilter {
        &self.flags
    }

    /// Validate every piece of command or query text in `args`.
    ///
    /// Returns one verdict per SQL string and one per argument list, in
    /// key order. Arguments without such text yield no verdicts.
    #[must_use]
    pub fn inspect(&self, args: &ToolArgs) -> Vec<SafetyVerdict> {
        let mut verdicts = Vec::new();

        for key in SQL_ARGUMENT_KEYS {
            for text in string_values(args.get(*key)) {
                verdicts.push(self.sql.validate(&text));
            }
        }

        for key in FLAG_ARGUMENT_KEYS {
            if let Some(value) = args.get(*key) {
                verdicts.push(self.inspect_flags(value));
            }
        }

        verdicts
    }

    fn inspect_flags(&self, value: &Value) -> SafetyVerdict {
        let (subject, tokens) = match value {
            Value::String(s) => match split_args(s) {
                Ok(tokens) => (s.clone(), tokens),
                Err(e) => {
                    return SafetyVerdict::rejected(s.clone(), format!("unparseable arguments: {e}"));
                },
            },
            Value::Array(items) => {
                let tokens: Vec<String> = items.iter().map(scalar_to_string).collect();
                (tokens.join(" "), tokens)
            },
            other => (other.to_string(), vec![scalar_to_string(other)]),
        };

        let reasons = self
            .flags
            .find_blocked(&tokens)
            .into_iter()
            .map(|flag| format!("blocked flag '{flag}' will be stripped"))
            .collect();
        SafetyVerdict::from_reasons(subject, reasons)
    }
}

/// Convenience wrapper around [`ArgumentInspector::inspect`].
#[must_use]
pub fn inspect_arguments(
    args: &ToolArgs,
    sql: &SqlValidator,
    flags: &FlagFilter,
) -> Vec<SafetyVerdict> {
    ArgumentInspector::new(sql.clone(), flags.clone()).inspect(args)
}

fn string_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().map(scalar_to_string).collect(),
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
