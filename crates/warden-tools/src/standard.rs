//! The adapter set a session starts with.

use std::sync::Arc;
use warden_audit::AuditLog;
use warden_config::Config;
use warden_safety::{FlagFilter, SqlValidator};

use crate::adapter::ToolRegistry;
use crate::database::{CredentialCheckTool, DatabaseProbeTool, QueryConnector};
use crate::nmap::NmapTool;
use crate::process::ProcessRunner;
use crate::report::ReportWriterTool;
use crate::sqlmap::SqlmapTool;

/// Build the scanner, injection tester, database probe, credential check
/// and report writer from `config`.
///
/// The database tools connect through `connectors` in order. Every adapter
/// given `audit` records its side effects there.
#[must_use]
pub fn standard_registry(
    config: &Config,
    audit: Option<Arc<AuditLog>>,
    connectors: Vec<Arc<dyn QueryConnector>>,
) -> ToolRegistry {
    let runner = ProcessRunner::new(
        config.tools.default_timeout_secs,
        config.tools.max_output_bytes,
    );
    let flags = FlagFilter::with_flags(config.safety.blocked_flags.iter().cloned());
    let validator = SqlValidator::with_allowed_schemas(config.safety.allowed_schemas.iter().cloned());

    let mut probe = DatabaseProbeTool::new(config.tools.database.clone(), validator);
    let mut credentials = CredentialCheckTool::new();
    for connector in connectors {
        probe = probe.with_connector(Arc::clone(&connector));
        credentials = credentials.with_connector(connector);
    }
    let mut reports = ReportWriterTool::new(config.tools.report_dir.clone());
    if let Some(audit) = audit {
        probe = probe.with_audit(Arc::clone(&audit));
        credentials = credentials.with_audit(Arc::clone(&audit));
        reports = reports.with_audit(audit);
    }

    ToolRegistry::new()
        .with(Arc::new(
            NmapTool::new(runner)
                .with_binary(config.tools.nmap_path.clone())
                .with_flag_filter(flags.clone()),
        ))
        .with(Arc::new(
            SqlmapTool::new(runner)
                .with_binary(config.tools.sqlmap_path.clone())
                .with_flag_filter(flags),
        ))
        .with(Arc::new(probe))
        .with(Arc::new(credentials))
        .with(Arc::new(reports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CREDENTIAL_CHECK_TOOL_NAME, DATABASE_PROBE_TOOL_NAME, NMAP_TOOL_NAME,
        REPORT_WRITER_TOOL_NAME, SQLMAP_TOOL_NAME,
    };

    #[test]
    fn test_standard_registry_names() {
        let registry = standard_registry(&Config::default(), None, Vec::new());
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec![
                DATABASE_PROBE_TOOL_NAME,
                CREDENTIAL_CHECK_TOOL_NAME,
                NMAP_TOOL_NAME,
                SQLMAP_TOOL_NAME,
                REPORT_WRITER_TOOL_NAME,
            ]
        );
    }
}
