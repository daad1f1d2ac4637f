//! Bridge from `warden_config::Config` to the domain types the gate uses.

use warden_config::Config;
use warden_core::{PhaseDescriptor, PhaseRoster};
use warden_safety::{ArgumentInspector, FlagFilter, SqlValidator};
use warden_telemetry::{LogConfig, LogFormat};

/// Convert `[logging]` to a [`LogConfig`]. Unknown formats fall back to compact.
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or(LogFormat::Compact);

    let mut log_config = LogConfig::new(&cfg.logging.level).with_format(format);
    for directive in &cfg.logging.directives {
        log_config = log_config.with_directive(directive);
    }
    log_config
}

/// Build the proposal inspector from `[safety]`.
pub(crate) fn to_inspector(cfg: &Config) -> ArgumentInspector {
    ArgumentInspector::new(
        SqlValidator::with_allowed_schemas(cfg.safety.allowed_schemas.iter().cloned()),
        FlagFilter::with_flags(cfg.safety.blocked_flags.iter().cloned()),
    )
}

/// Build the phase roster from `[[phases]]`.
pub(crate) fn to_roster(cfg: &Config) -> PhaseRoster {
    PhaseRoster::new(
        cfg.phases
            .iter()
            .map(|phase| {
                let mut descriptor = PhaseDescriptor::new(
                    &phase.name,
                    &phase.prompt,
                    phase.allowed_tools.iter().cloned(),
                );
                descriptor.description.clone_from(&phase.description);
                descriptor
            })
            .collect(),
    )
}
