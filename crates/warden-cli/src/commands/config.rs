//! Config command - show and validate the resolved configuration.

use colored::Colorize;
use warden_config::{ResolvedConfig, ShowFormat};

use crate::theme::Theme;

/// Print the resolved configuration, optionally one section.
pub(crate) fn show_config(
    resolved: &ResolvedConfig,
    format: ShowFormat,
    section: Option<&str>,
) -> anyhow::Result<()> {
    let rendered = resolved.show(format, section)?;
    println!("{rendered}");
    Ok(())
}

/// Report whether the configuration loaded and validated.
pub(crate) fn validate_config(loaded: &anyhow::Result<ResolvedConfig>) {
    match loaded {
        Ok(resolved) => {
            println!("{}", Theme::success("Configuration is valid"));
            if resolved.loaded_files.is_empty() {
                println!("  {}", Theme::dimmed("(defaults only, no config files found)"));
            }
            for file in &resolved.loaded_files {
                println!("  {} {file}", "loaded".dimmed());
            }
            println!(
                "  {}",
                Theme::kv("Phases", &resolved.config.phases.len().to_string())
            );
        },
        Err(e) => {
            println!("{}", Theme::error("Configuration is invalid"));
            println!("  {e:#}");
        },
    }
}
