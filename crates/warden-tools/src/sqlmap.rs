//! Injection tester adapter.
//!
//! Builds a `sqlmap` command line from structured arguments and free-form
//! extra arguments. `--batch` is always present and blocked flags are
//! stripped from the final argv, whatever their source.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::info;
use warden_core::ToolArgs;
use warden_safety::{FlagFilter, split_args};

use crate::adapter::ToolAdapter;
use crate::args::{optional_bool, optional_str, optional_u64, string_list};
use crate::error::{ToolError, ToolResult};
use crate::output::ToolOutput;
use crate::process::{ProcessRunner, locate_binary};

/// Registered name of the injection tester.
pub const SQLMAP_TOOL_NAME: &str = "sqlmap_tool";

/// Numeric options passed through as `--<name> <n>`.
const NUMERIC_OPTIONS: &[&str] = &["level", "risk", "threads"];

/// Boolean switches passed through as `--<name>`.
const SWITCHES: &[(&str, &str)] = &[
    ("tor", "--tor"),
    ("dbs", "--dbs"),
    ("dump", "--dump"),
    ("exclude_sysdbs", "--exclude-sysdbs"),
];

/// `sqlmap` wrapper.
#[derive(Debug, Clone)]
pub struct SqlmapTool {
    binary: Option<PathBuf>,
    runner: ProcessRunner,
    flags: FlagFilter,
}

impl SqlmapTool {
    /// A tester using `runner` and the `sqlmap` found on `PATH`.
    #[must_use]
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            binary: None,
            runner,
            flags: FlagFilter::default(),
        }
    }

    /// Use an explicit binary.
    #[must_use]
    pub fn with_binary(mut self, binary: Option<PathBuf>) -> Self {
        self.binary = binary;
        self
    }

    /// Replace the flag blacklist.
    #[must_use]
    pub fn with_flag_filter(mut self, flags: FlagFilter) -> Self {
        self.flags = flags;
        self
    }

    /// Build argv (without the program). Returns the argv and any
    /// stripped tokens.
    pub(crate) fn build_args(&self, args: &ToolArgs) -> ToolResult<(Vec<String>, Vec<String>)> {
        let mut argv = match optional_str(args, "arguments") {
            Some(raw) => split_args(raw)?,
            None => Vec::new(),
        };
        argv.extend(
            string_list(args, "extra_args")?
                .iter()
                .map(|raw| split_args(raw))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten(),
        );

        if !has_any(&argv, &["--batch"]) {
            argv.insert(0, "--batch".to_string());
        }

        if let Some(url) = optional_str(args, "url")
            && !has_any(&argv, &["-u", "--url"])
        {
            argv.extend(["-u".to_string(), url.to_string()]);
        }
        if let Some(data) = optional_str(args, "data")
            && !has_any(&argv, &["--data", "-d"])
        {
            argv.extend(["--data".to_string(), data.to_string()]);
        }
        if let Some(cookie) = optional_str(args, "cookie")
            && !has_any(&argv, &["--cookie"])
        {
            argv.extend(["--cookie".to_string(), cookie.to_string()]);
        }
        if !has_any(&argv, &["--headers", "-H"]) {
            argv.extend(header_args(args)?);
        }

        let params = string_list(args, "params")?;
        if !params.is_empty() && !has_any(&argv, &["-p"]) {
            argv.extend(["-p".to_string(), params.join(",")]);
        }
        for option in NUMERIC_OPTIONS {
            if let Some(n) = optional_u64(args, option)? {
                argv.extend([format!("--{option}"), n.to_string()]);
            }
        }
        if let Some(proxy) = optional_str(args, "proxy") {
            argv.extend(["--proxy".to_string(), proxy.to_string()]);
        }
        for (key, flag) in SWITCHES {
            if optional_bool(args, key)? == Some(true) && !has_any(&argv, &[flag]) {
                argv.push((*flag).to_string());
            }
        }

        if !has_any(&argv, &["-u", "--url", "-r", "-l", "-m", "-g", "-d"]) {
            return Err(ToolError::InvalidArguments(
                "url is required (or a target option in arguments)".into(),
            ));
        }

        let filtered = self.flags.filter_with_report(&argv);
        Ok((filtered.kept, filtered.removed))
    }

    async fn test_injection(&self, args: &ToolArgs) -> ToolResult<ToolOutput> {
        let binary = locate_binary(self.binary.as_deref(), &["sqlmap", "sqlmap.py"])?;
        let (argv, removed) = self.build_args(args)?;
        let runner = self.runner.with_timeout(optional_u64(args, "timeout")?);

        info!(url = ?optional_str(args, "url"), "Running sqlmap");
        let process = runner.run(&binary, &argv).await?;
        let success = process.succeeded();
        let mut output = ToolOutput::success(process.into_fields());
        output.success = success;
        if !removed.is_empty() {
            output = output.with_field("removed_flags", removed);
        }
        Ok(output)
    }
}

fn has_any(argv: &[String], names: &[&str]) -> bool {
    argv.iter().any(|a| {
        names
            .iter()
            .any(|n| a == n || a.strip_prefix(n).is_some_and(|rest| rest.starts_with('=')))
    })
}

/// `{"Name": "Value"}` becomes repeated `--headers "Name: Value"`.
fn header_args(args: &ToolArgs) -> ToolResult<Vec<String>> {
    let Some(headers) = args.get("headers") else {
        return Ok(Vec::new());
    };
    match headers {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .flat_map(|(name, value)| {
                let value = value
                    .as_str()
                    .map_or_else(|| value.to_string(), ToString::to_string);
                ["--headers".to_string(), format!("{name}: {value}")]
            })
            .collect()),
        Value::String(raw) if !raw.trim().is_empty() => {
            Ok(vec!["--headers".to_string(), raw.clone()])
        },
        _ => Err(ToolError::InvalidArguments(
            "headers must be an object of name to value".into(),
        )),
    }
}

#[async_trait]
impl ToolAdapter for SqlmapTool {
    fn name(&self) -> &'static str {
        SQLMAP_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Run sqlmap non-interactively against a URL to test for SQL injection. \
         Dangerous options (OS shell, privilege escalation, SMB relay) are removed."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Target URL"},
                "arguments": {"type": "string", "description": "Extra sqlmap arguments"},
                "extra_args": {"type": "array", "items": {"type": "string"}},
                "data": {"type": "string", "description": "POST body passed via --data"},
                "cookie": {"type": "string"},
                "headers": {"type": "object", "additionalProperties": {"type": "string"}},
                "params": {"type": "array", "items": {"type": "string"}, "description": "Parameters to test (-p)"},
                "level": {"type": "integer"},
                "risk": {"type": "integer"},
                "threads": {"type": "integer"},
                "proxy": {"type": "string"},
                "tor": {"type": "boolean"},
                "dbs": {"type": "boolean"},
                "dump": {"type": "boolean"},
                "exclude_sysdbs": {"type": "boolean"},
                "timeout": {"type": "integer", "description": "Timeout in seconds"}
            },
            "required": ["url"]
        })
    }

    async fn call(&self, args: &ToolArgs) -> ToolOutput {
        self.test_injection(args).await.unwrap_or_else(ToolOutput::from)
    }
}
