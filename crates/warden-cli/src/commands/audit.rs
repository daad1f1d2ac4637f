//! Audit command - list, read and verify audit files.

use std::path::Path;

use colored::Colorize;
use warden_audit::{list_audit_files, read_events, summarize_file, verify_file};

use crate::theme::{Theme, truncate};

/// List audit files in `dir`.
pub(crate) fn list_audit_files_in(dir: &Path) -> anyhow::Result<()> {
    let files = list_audit_files(dir)?;

    if files.is_empty() {
        println!(
            "{}",
            Theme::info(&format!("No audit files in {}", dir.display()))
        );
        return Ok(());
    }

    println!("\n{}", Theme::header("Audit Files"));
    println!("{:<48} {:>10}", "FILE".dimmed(), "BYTES".dimmed());
    println!("{}", Theme::separator());
    for file in files {
        println!("{:<48} {:>10}", file.name, file.size);
    }

    println!();
    Ok(())
}

/// Print every event in an audit file.
pub(crate) fn show_audit_file(path: &Path) -> anyhow::Result<()> {
    let parsed = read_events(path)?;

    if parsed.events.is_empty() {
        println!("{}", Theme::info("No events in this file"));
    } else {
        println!("\n{}", Theme::header("Audit Events"));
        println!(
            "{:>19} {:<18} {:<12} {}",
            "TIMESTAMP".dimmed(),
            "EVENT".dimmed(),
            "ACTOR".dimmed(),
            "DESCRIPTION".dimmed()
        );
        println!("{}", Theme::separator());

        for event in &parsed.events {
            let kind = event.event_type.as_str();
            let kind = match kind {
                "error" => kind.red().to_string(),
                "warning" => kind.yellow().to_string(),
                "human_decision" => kind.cyan().to_string(),
                _ => kind.to_string(),
            };
            let mut line = event.description.clone();
            if let Some(target) = &event.target {
                line = format!("{line} [{target}]");
            }
            println!(
                "{:>19} {:<18} {:<12} {}",
                Theme::timestamp(&event.timestamp.0),
                kind,
                truncate(&event.actor, 12),
                truncate(&line, 80)
            );
        }
    }

    if !parsed.skipped.is_empty() {
        println!(
            "\n{}",
            Theme::warning(&format!(
                "Skipped {} unparseable line(s): {:?}",
                parsed.skipped.len(),
                parsed.skipped
            ))
        );
    }

    println!();
    Ok(())
}

/// Print event counts for an audit file.
pub(crate) fn show_summary(path: &Path) -> anyhow::Result<()> {
    let summary = summarize_file(path)?;

    println!("\n{}", Theme::header("Audit Summary"));
    if let Some(session_id) = &summary.session_id {
        println!(
            "  {}",
            Theme::kv("Session", &Theme::session_id(&session_id.to_string()))
        );
    }
    println!("  {}", Theme::kv("Events", &summary.total_events.to_string()));
    for (event_type, count) in &summary.event_counts {
        println!("    {event_type:<18} {count:>6}");
    }
    if summary.skipped_lines > 0 {
        println!(
            "  {}",
            Theme::warning(&format!("{} line(s) could not be parsed", summary.skipped_lines))
        );
    }

    println!();
    Ok(())
}

/// Verify the hash chain of an audit file.
pub(crate) fn verify_audit_file(path: &Path) -> anyhow::Result<()> {
    let result = verify_file(path)?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    if result.valid {
        println!(
            "{}",
            Theme::success(&format!(
                "{name} verified: {} entries, no issues",
                result.entries_verified
            ))
        );
    } else {
        println!(
            "{}",
            Theme::error(&format!("{name} has {} issues:", result.issues.len()))
        );
        for issue in &result.issues {
            println!("  - {issue}");
        }
        anyhow::bail!("audit chain verification failed");
    }

    Ok(())
}
