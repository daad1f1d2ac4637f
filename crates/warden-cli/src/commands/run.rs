//! Run command - drive one gated agent session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warden_approval::DecisionPrompt;
use warden_audit::AuditLog;
use warden_config::ResolvedConfig;
use warden_core::{SessionId, SessionStatus};
use warden_gate::{AgentEngine, ApprovalGate, HttpAgentEngine, SessionOutcome, ToolBroker};
use warden_safety::validate_target;
use warden_tools::standard_registry;

use crate::config_bridge;
use crate::console::{TerminalConsole, TerminalObserver};
use crate::theme::Theme;

const AUTHORIZATION_PROMPT: &str =
    "Do you confirm you have authorization to test systems you will specify?";

const INSTRUCTION_PROMPT: &str = "Enter the security testing instruction for the agent \
(e.g. 'Scan 192.168.1.100 for open ports and vulnerabilities')";

/// Options for `warden run`.
pub(crate) struct RunOptions {
    /// Task for the agent.
    pub(crate) prompt: Option<String>,
    /// Asset under test.
    pub(crate) target: Option<String>,
    /// Engine URL override.
    pub(crate) engine_url: Option<String>,
    /// Skip the authorization confirmation.
    pub(crate) authorized: bool,
    /// Echo raw tool results.
    pub(crate) verbose: bool,
}

fn confirm_authorization() -> Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(AUTHORIZATION_PROMPT)
        .default(false)
        .interact()
        .context("failed to read authorization confirmation")
}

fn read_instruction() -> Result<String> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(INSTRUCTION_PROMPT)
        .interact_text()
        .context("failed to read instruction")
}

fn build_engine(resolved: &ResolvedConfig, url: Option<&str>) -> Result<Arc<dyn AgentEngine>> {
    let engine = match url {
        Some(url) => HttpAgentEngine::new(
            url,
            Duration::from_secs(resolved.config.engine.request_timeout_secs),
        ),
        None => HttpAgentEngine::from_config(&resolved.config.engine),
    }
    .context("no usable agent engine; set [engine] url or pass --engine-url")?;
    Ok(Arc::new(engine))
}

/// Normalize `--target`, refusing anything that is not an address, CIDR
/// range or URL.
fn checked_target(target: Option<String>) -> Result<Option<String>> {
    target
        .map(|t| validate_target(&t).map(|t| t.to_string()))
        .transpose()
        .context("refusing to start session")
}

/// Run one session end to end.
pub(crate) async fn run_session(resolved: ResolvedConfig, options: RunOptions) -> Result<()> {
    let target = checked_target(options.target)?;
    if !options.authorized && !confirm_authorization()? {
        println!("{}", Theme::warning("Authorization not confirmed. Exiting."));
        return Ok(());
    }

    let engine = build_engine(&resolved, options.engine_url.as_deref())?;
    let prompt = match options.prompt {
        Some(prompt) => prompt,
        None => read_instruction()?,
    };

    let config = &resolved.config;
    let audit = Arc::new(
        AuditLog::create(&config.audit.directory, SessionId::new(), &config.operator.id)
            .context("failed to open audit log")?,
    );
    let registry = standard_registry(config, Some(Arc::clone(&audit)), Vec::new());
    let broker = Arc::new(ToolBroker::new(
        registry,
        config.approval.clone(),
        Arc::clone(&audit),
    ));

    let cancel = CancellationToken::new();
    let gate = ApprovalGate::new(
        engine,
        Arc::new(DecisionPrompt::new(TerminalConsole)),
        broker,
        Arc::clone(&audit),
    )
    .with_inspector(config_bridge::to_inspector(config))
    .with_roster(config_bridge::to_roster(config))
    .with_limits(config.gate.clone())
    .with_observer(Arc::new(TerminalObserver::new(options.verbose)))
    .with_target(target)
    .with_cancellation(cancel.clone());

    println!("\n{}", Theme::header("Warden session"));
    println!("  {}", Theme::kv("Session", &Theme::session_id(&audit.session_id().to_string())));
    println!("  {}", Theme::kv("Thread", &gate.thread_id().to_string()));
    println!("  {}", Theme::kv("Audit file", &audit.path().display().to_string()));
    println!("{}", Theme::separator());

    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received; stopping session");
                cancel.cancel();
            }
        }
    });

    info!(session_id = %audit.session_id(), "Starting gated session");
    let outcome = gate.run(&prompt).await;
    interrupt.abort();

    print_outcome(&outcome?);
    Ok(())
}

fn print_outcome(outcome: &SessionOutcome) {
    println!("{}", Theme::separator());
    if let Some(message) = &outcome.final_message {
        println!("{}\n", message.trim());
    }
    println!("  {}", Theme::kv("Status", &Theme::status(outcome.status)));
    println!("  {}", Theme::kv("Reason", &outcome.reason));
    println!("  {}", Theme::kv("Steps", &outcome.steps.to_string()));
    println!(
        "  {}",
        Theme::kv("Audit events", &outcome.summary.total_events.to_string())
    );
    for (event_type, count) in &outcome.summary.event_counts {
        println!("    {event_type}: {count}");
    }
    println!(
        "  {}",
        Theme::kv("Audit file", &outcome.summary.audit_file.display().to_string())
    );

    let closing = match outcome.status {
        SessionStatus::Completed => Theme::success("Session completed"),
        SessionStatus::Aborted => Theme::warning("Session aborted"),
        _ => Theme::error("Session ended with an error"),
    };
    println!("\n{closing}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_target_normalizes() {
        assert_eq!(checked_target(None).unwrap(), None);
        assert_eq!(
            checked_target(Some(" 192.168.1.100 ".into())).unwrap().as_deref(),
            Some("192.168.1.100")
        );
        assert_eq!(
            checked_target(Some("https://shop.example.com/login".into())).unwrap().as_deref(),
            Some("https://shop.example.com/login")
        );
    }

    #[test]
    fn test_checked_target_rejects_injection() {
        let err = checked_target(Some("10.0.0.5; nc -e /bin/sh".into())).unwrap_err();
        assert!(format!("{err:#}").contains("invalid target"));
    }
}
