//! Post-merge configuration validation.

use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound on `gate.max_iterations`.
pub const MAX_ITERATIONS_UPPER_BOUND: u32 = 10_000;

const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_identity(config)?;
    validate_gate(config)?;
    validate_tools(config)?;
    validate_logging(config)?;
    validate_phases(config)?;
    Ok(())
}

fn validate_identity(config: &Config) -> ConfigResult<()> {
    if config.operator.id.trim().is_empty() {
        return Err(invalid("operator.id", "operator id must not be empty"));
    }
    if config.audit.directory.as_os_str().is_empty() {
        return Err(invalid("audit.directory", "audit directory must not be empty"));
    }
    Ok(())
}

fn validate_gate(config: &Config) -> ConfigResult<()> {
    let gate = &config.gate;
    if gate.max_iterations == 0 || gate.max_iterations > MAX_ITERATIONS_UPPER_BOUND {
        return Err(invalid(
            "gate.max_iterations",
            format!("must be between 1 and {MAX_ITERATIONS_UPPER_BOUND}"),
        ));
    }
    if gate.max_consecutive_engine_errors == 0 {
        return Err(invalid(
            "gate.max_consecutive_engine_errors",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn validate_tools(config: &Config) -> ConfigResult<()> {
    if config.tools.default_timeout_secs == 0 {
        return Err(invalid("tools.default_timeout_secs", "must be at least 1"));
    }
    if config.tools.max_output_bytes == 0 {
        return Err(invalid("tools.max_output_bytes", "must be at least 1"));
    }
    if config.tools.report_dir.as_os_str().is_empty() {
        return Err(invalid("tools.report_dir", "must not be empty"));
    }
    if config.engine.request_timeout_secs == 0 {
        return Err(invalid("engine.request_timeout_secs", "must be at least 1"));
    }
    if let Some(url) = &config.engine.url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        return Err(invalid("engine.url", format!("'{url}' is not an http(s) URL")));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let format = config.logging.format.to_ascii_lowercase();
    if !LOG_FORMATS.contains(&format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }
    if config.logging.level.trim().is_empty() {
        return Err(invalid("logging.level", "level must not be empty"));
    }
    Ok(())
}

fn validate_phases(config: &Config) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for (idx, phase) in config.phases.iter().enumerate() {
        let field = format!("phases[{idx}]");
        if phase.name.trim().is_empty() {
            return Err(invalid(format!("{field}.name"), "phase name must not be empty"));
        }
        if !seen.insert(phase.name.as_str()) {
            return Err(invalid(
                format!("{field}.name"),
                format!("duplicate phase name '{}'", phase.name),
            ));
        }
        if phase.allowed_tools.iter().any(|t| t.trim().is_empty()) {
            return Err(invalid(
                format!("{field}.allowed_tools"),
                "tool names must not be empty",
            ));
        }
    }
    Ok(())
}
