//! Doctor command - check the environment before a session.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use warden_config::{Config, ResolvedConfig};
use warden_tools::locate_binary;

/// Check one external binary, preferring an explicit path.
fn check_binary(label: &str, explicit: Option<&Path>, names: &[&str]) -> bool {
    print!("  {label}... ");
    match locate_binary(explicit, names) {
        Ok(path) => {
            println!("{} ({})", "OK".green(), path.display());
            true
        },
        Err(e) => {
            println!("{} ({e})", "WARN".yellow());
            println!("    Install {label} or set its path under [tools]");
            false
        },
    }
}

fn check_audit_dir(dir: &Path) -> bool {
    print!("  Audit directory... ");
    if dir.is_dir() {
        let writable = std::fs::metadata(dir).is_ok_and(|m| !m.permissions().readonly());
        if writable {
            println!("{} ({})", "OK".green(), dir.display());
        } else {
            println!("{} ({} is read-only)", "FAIL".red(), dir.display());
        }
        writable
    } else {
        println!("{} ({} will be created)", "OK".dimmed(), dir.display());
        true
    }
}

/// Run environment checks.
pub(crate) fn run_doctor(loaded: &Result<ResolvedConfig>) {
    println!("{}", "Warden Doctor - Environment Check".cyan().bold());
    println!();
    println!(
        "  Platform: {} {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    print!("  Checking configuration... ");
    let fallback = Config::default();
    let config = match loaded {
        Ok(resolved) => {
            println!("{}", "OK".green());
            println!("    Operator: {}", resolved.config.operator.id);
            println!("    Phases: {}", resolved.config.phases.len());
            &resolved.config
        },
        Err(e) => {
            println!("{}", "FAIL".red());
            println!("    {e:#}");
            println!("    Continuing with defaults");
            &fallback
        },
    };
    let mut healthy = loaded.is_ok();

    println!("\n{}", "External tools:".cyan());
    healthy &= check_binary("nmap", config.tools.nmap_path.as_deref(), &["nmap"]);
    healthy &= check_binary(
        "sqlmap",
        config.tools.sqlmap_path.as_deref(),
        &["sqlmap", "sqlmap.py"],
    );

    println!("\n{}", "Session:".cyan());
    healthy &= check_audit_dir(&config.audit.directory);

    print!("  Agent engine... ");
    match &config.engine.url {
        Some(url) => println!("{} ({url})", "OK".green()),
        None => {
            println!("{} (no [engine] url)", "WARN".yellow());
            println!("    Set [engine] url, WARDEN_ENGINE_URL, or pass --engine-url to run");
        },
    }

    println!();
    if healthy {
        println!("{}", "Warden is ready to use!".green().bold());
    } else {
        println!(
            "{}",
            "Please address the issues above before running a session."
                .yellow()
                .bold()
        );
    }
}
