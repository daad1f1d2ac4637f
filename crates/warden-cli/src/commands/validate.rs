//! Validate command - run the safety checks by hand.

use anyhow::Context;
use colored::Colorize;
use warden_config::Config;
use warden_safety::{FlagFilter, SafetyVerdict, SqlValidator, Target, split_args, validate_target};

use crate::theme::Theme;

fn print_verdict(verdict: &SafetyVerdict) {
    if verdict.is_safe {
        println!("{}", Theme::success(&format!("{}: allowed", verdict.subject)));
        return;
    }
    println!("{}", Theme::error(&format!("{}: rejected", verdict.subject)));
    for reason in &verdict.reasons {
        println!("  - {reason}");
    }
}

/// Check SQL text. `schemas` overrides `[safety] allowed_schemas` when given.
pub(crate) fn validate_sql_text(
    config: &Config,
    query: &str,
    schemas: Vec<String>,
) -> anyhow::Result<()> {
    let schemas = if schemas.is_empty() {
        config.safety.allowed_schemas.clone()
    } else {
        schemas
    };
    let validator = SqlValidator::with_allowed_schemas(schemas);
    if !validator.allowed_schemas().is_empty() {
        println!(
            "{}",
            Theme::dimmed(&format!(
                "allowed schemas: {}",
                validator.allowed_schemas().join(", ")
            ))
        );
    }

    let verdict = validator.validate(query);
    print_verdict(&verdict);
    if !verdict.is_safe {
        anyhow::bail!("query rejected");
    }
    Ok(())
}

/// Show which tokens of `arguments` the flag blacklist would remove.
pub(crate) fn validate_flags(config: &Config, arguments: &str) -> anyhow::Result<()> {
    let args = split_args(arguments).context("could not split arguments")?;
    let filter = FlagFilter::with_flags(config.safety.blocked_flags.iter().cloned());
    let report = filter.filter_with_report(&args);

    println!("  {} {}", "kept:".bold(), report.kept.join(" "));
    if report.removed.is_empty() {
        println!("{}", Theme::success("no blocked flags"));
    } else {
        println!("  {} {}", "removed:".bold(), report.removed.join(" ").red());
        println!(
            "{}",
            Theme::warning(&format!("{} token(s) would be stripped", report.removed.len()))
        );
    }
    Ok(())
}

/// Check that `target` is an address, CIDR range or URL.
pub(crate) fn validate_target_text(target: &str) -> anyhow::Result<()> {
    let target = validate_target(target)?;
    let kind = match target {
        Target::Ip(_) => "IP address",
        Target::Network { .. } => "CIDR range",
        Target::Url(_) => "URL",
    };
    println!("{}", Theme::success(&format!("{target}: valid {kind}")));
    Ok(())
}
