//! Configuration struct definitions.
//!
//! Every struct derives `Default` with the same values as the embedded
//! `defaults.toml`, except the phase roster which only the file defines.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level warden configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Who is operating.
    pub operator: OperatorConfig,
    /// Where audit files go.
    pub audit: AuditConfig,
    /// Orchestration loop bounds.
    pub gate: GateConfig,
    /// Per-tool approval requirements.
    pub approval: ApprovalConfig,
    /// Content-level validation settings.
    pub safety: SafetyConfig,
    /// Tool adapter settings.
    pub tools: ToolsConfig,
    /// External agent engine connection.
    pub engine: EngineConfig,
    /// Diagnostic logging.
    pub logging: LoggingConfig,
    /// Phase roster, in order.
    pub phases: Vec<PhaseConfig>,
}

/// Operator identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Identifier recorded as the actor of human decisions.
    pub id: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            id: "operator".to_owned(),
        }
    }
}

/// Audit log location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory holding one `audit_*.jsonl` file per session.
    pub directory: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
        }
    }
}

/// Approval gate loop bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Hard ceiling on engine steps per session.
    pub max_iterations: u32,
    /// Engine errors tolerated in a row before the session errors out.
    pub max_consecutive_engine_errors: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_consecutive_engine_errors: 3,
        }
    }
}

/// Which tools need operator approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Applies to every tool not listed in `tools`.
    pub default_requires_approval: bool,
    /// Per-tool overrides.
    pub tools: BTreeMap<String, bool>,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            default_requires_approval: true,
            tools: BTreeMap::new(),
        }
    }
}

impl ApprovalConfig {
    /// Whether `tool` needs an operator decision before it may run.
    #[must_use]
    pub fn requires_approval(&self, tool: &str) -> bool {
        self.tools
            .get(tool)
            .copied()
            .unwrap_or(self.default_requires_approval)
    }
}

/// Content-level validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Schemas SQL may reference. Empty disables the check.
    pub allowed_schemas: Vec<String>,
    /// Flags stripped from external process arguments.
    pub blocked_flags: Vec<String>,
}

/// Flags stripped by default.
pub const DEFAULT_BLOCKED_FLAGS: &[&str] = &[
    "--os-shell",
    "--os-pwn",
    "--os-smbrelay",
    "--os-bof",
    "--priv-esc",
    "--os-cmd",
    "--msfvenom",
    "--os-smbexec",
];

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            allowed_schemas: Vec::new(),
            blocked_flags: DEFAULT_BLOCKED_FLAGS.iter().map(|f| (*f).to_owned()).collect(),
        }
    }
}

/// Tool adapter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Subprocess timeout when the call does not give one.
    pub default_timeout_secs: u64,
    /// Explicit `nmap` binary; looked up on `PATH` when unset.
    pub nmap_path: Option<PathBuf>,
    /// Explicit `sqlmap` binary; looked up on `PATH` when unset.
    pub sqlmap_path: Option<PathBuf>,
    /// Cap on captured stdout/stderr per stream.
    pub max_output_bytes: usize,
    /// Directory report files are confined to.
    pub report_dir: PathBuf,
    /// Database probe settings.
    pub database: DatabaseProbeConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 600,
            nmap_path: None,
            sqlmap_path: None,
            max_output_bytes: 20_000,
            report_dir: PathBuf::from("reports"),
            database: DatabaseProbeConfig::default(),
        }
    }
}

/// Defaults for the database probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseProbeConfig {
    /// Whether agent-written SQL may run at all.
    pub allow_agent_sql: bool,
    /// Plan and validate without executing.
    pub dry_run: bool,
    /// Rows fetched per query.
    pub max_rows: usize,
    /// Per-query timeout.
    pub timeout_secs: u64,
}

impl Default for DatabaseProbeConfig {
    fn default() -> Self {
        Self {
            allow_agent_sql: false,
            dry_run: true,
            max_rows: 1000,
            timeout_secs: 30,
        }
    }
}

/// External agent engine connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the engine service.
    pub url: Option<String>,
    /// Timeout for one engine step.
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_secs: 300,
        }
    }
}

/// Diagnostic logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level.
    pub level: String,
    /// `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Per-target overrides.
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

/// One phase of the task and the tools it may propose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Unique phase name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Instructions handed to the engine.
    pub prompt: String,
    /// Tool names this phase may propose.
    pub allowed_tools: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_approval_defaults_true() {
        let approval = ApprovalConfig::default();
        assert!(approval.requires_approval("nmap_tool"));
    }

    #[test]
    fn test_requires_approval_override() {
        let mut approval = ApprovalConfig::default();
        approval.tools.insert("ls".to_owned(), false);
        assert!(!approval.requires_approval("ls"));
        assert!(approval.requires_approval("sqlmap_tool"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[gate]\nmax_iterations = 7\n").unwrap();
        assert_eq!(config.gate.max_iterations, 7);
        assert_eq!(config.gate.max_consecutive_engine_errors, 3);
        assert_eq!(config.audit.directory, PathBuf::from("logs"));
    }
}
