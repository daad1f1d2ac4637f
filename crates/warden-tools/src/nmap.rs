//! Network scanner adapter.
//!
//! Always runs `nmap` as a subprocess with `-oX <tempfile>` so the engine
//! receives machine-readable XML alongside stdout.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use warden_core::ToolArgs;
use warden_safety::{FlagFilter, split_args};

use crate::adapter::ToolAdapter;
use crate::args::{optional_str, optional_u64, required_str};
use crate::error::ToolResult;
use crate::output::ToolOutput;
use crate::process::{ProcessRunner, locate_binary};

/// Registered name of the scanner.
pub const NMAP_TOOL_NAME: &str = "nmap_tool";

/// `nmap` wrapper.
#[derive(Debug, Clone)]
pub struct NmapTool {
    binary: Option<PathBuf>,
    runner: ProcessRunner,
    flags: FlagFilter,
}

impl NmapTool {
    /// A scanner using `runner` and the `nmap` found on `PATH`.
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

    /// Strip these flags from agent-supplied arguments.
    #[must_use]
    pub fn with_flag_filter(mut self, flags: FlagFilter) -> Self {
        self.flags = flags;
        self
    }

    /// Build argv (without the program). Returns the argv and any
    /// stripped tokens.
    pub(crate) fn build_args(
        &self,
        args: &ToolArgs,
        xml_path: &Path,
    ) -> ToolResult<(Vec<String>, Vec<String>)> {
        let target = required_str(args, "target")?;
        let mut argv = Vec::new();

        if let Some(ports) = optional_str(args, "ports") {
            argv.extend(["-p".to_string(), ports.to_string()]);
        }
        argv.extend(["-oX".to_string(), xml_path.display().to_string()]);

        let extra = optional_str(args, "arguments")
            .map(split_args)
            .transpose()?
            .unwrap_or_default();
        let filtered = self.flags.filter_with_report(&extra);
        argv.extend(filtered.kept);
        argv.push(target.to_string());

        Ok((argv, filtered.removed))
    }

    async fn scan(&self, args: &ToolArgs) -> ToolResult<ToolOutput> {
        let binary = locate_binary(self.binary.as_deref(), &["nmap"])?;
        let xml_file = tempfile::Builder::new()
            .prefix("warden-nmap-")
            .suffix(".xml")
            .tempfile()?;
        let (argv, removed) = self.build_args(args, xml_file.path())?;
        let runner = self.runner.with_timeout(optional_u64(args, "timeout")?);

        info!(target = ?optional_str(args, "target"), "Running nmap");
        let process = runner.run(&binary, &argv).await?;
        let success = process.succeeded();
        let mut output = ToolOutput::success(process.into_fields());
        output.success = success;

        match tokio::fs::read_to_string(xml_file.path()).await {
            Ok(xml) if xml.is_empty() => {},
            Ok(xml) => output = output.with_field("xml", xml),
            Err(e) => {
                warn!(error = %e, "Failed to read nmap XML output");
                output = output.with_field("xml_error", e.to_string());
            },
        }
        if !removed.is_empty() {
            output = output.with_field("removed_flags", removed);
        }
        Ok(output)
    }
}

#[async_trait]
impl ToolAdapter for NmapTool {
    fn name(&self) -> &'static str {
        NMAP_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Run an nmap scan against a host, IP, or CIDR range and return XML output. \
         Only scan systems you are authorized to test."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target": {"type": "string", "description": "Host, IP, CIDR, or host list"},
                "arguments": {"type": "string", "description": "Extra nmap arguments, e.g. '-sV -O'"},
                "ports": {"type": "string", "description": "Port list or range passed as -p"},
                "timeout": {"type": "integer", "description": "Timeout in seconds"}
            },
            "required": ["target"]
        })
    }

    async fn call(&self, args: &ToolArgs) -> ToolOutput {
        self.scan(args).await.unwrap_or_else(ToolOutput::from)
    }
}
