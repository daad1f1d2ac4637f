//! Terminal implementations of the operator console and session observer.

use std::io;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use warden_approval::{OperatorConsole, ProposalView};
use warden_gate::{Notice, NoticeLevel, SessionObserver, StepChunk};

use crate::theme::{Theme, truncate};

/// Longest agent message echoed while a session runs.
const MESSAGE_PREVIEW_CHARS: usize = 400;

/// `dialoguer`-backed console. Ctrl-C surfaces as
/// [`io::ErrorKind::Interrupted`].
#[derive(Debug, Default)]
pub(crate) struct TerminalConsole;

/// Render a proposal as the lines shown inside its box.
pub(crate) fn describe_proposal(view: &ProposalView) -> String {
    let action = &view.action;
    let mut lines = vec![
        Theme::kv("Proposer", &action.proposer),
        Theme::kv("Tool", &action.tool_name),
    ];
    if let Some(target) = action.target() {
        lines.push(Theme::kv("Target", &target));
    }
    if let Some(description) = &action.description {
        lines.push(Theme::kv("Reason", description));
    }

    lines.push(String::new());
    lines.push(Theme::kv("Arguments", ""));
    if action.arguments.is_empty() {
        lines.push(format!("  {}", Theme::dimmed("(none)")));
    }
    for (key, value) in &action.arguments {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        lines.push(format!("  {key} = {}", truncate(&rendered, 60)));
    }

    if let Some(warning) = &view.roster_warning {
        lines.push(String::new());
        lines.push(Theme::warning(warning));
    }
    for verdict in view.unsafe_verdicts() {
        lines.push(Theme::warning(&format!("{} rejected:", verdict.subject)));
        for reason in &verdict.reasons {
            lines.push(format!("    - {}", truncate(reason, 60)));
        }
    }
    lines.join("\n")
}

impl OperatorConsole for TerminalConsole {
    fn show_proposal(&self, proposal: Option<&ProposalView>) -> io::Result<()> {
        println!();
        match proposal {
            Some(view) => println!(
                "{}",
                Theme::proposal_box(
                    "Tool call awaiting approval",
                    &describe_proposal(view),
                    view.has_findings()
                )
            ),
            None => println!(
                "{}",
                Theme::warning("The agent paused without a readable proposal.")
            ),
        }
        Ok(())
    }

    fn select(&self, title: &str, items: &[&str]) -> io::Result<usize> {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(title)
            .items(items)
            .default(0)
            .interact()
            .map_err(|dialoguer::Error::IO(e)| e)
    }

    fn read_line(&self, prompt: &str) -> io::Result<String> {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt.trim_end().trim_end_matches(':'))
            .allow_empty(true)
            .interact_text()
            .map_err(|dialoguer::Error::IO(e)| e)
    }

    fn notify(&self, message: &str) -> io::Result<()> {
        println!("{}", Theme::warning(message));
        Ok(())
    }
}

/// Prints session progress to stdout.
#[derive(Debug, Default)]
pub(crate) struct TerminalObserver {
    verbose: bool,
}

impl TerminalObserver {
    /// Create an observer; `verbose` also echoes raw tool results.
    pub(crate) fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl SessionObserver for TerminalObserver {
    fn chunk(&self, chunk: &StepChunk) {
        match chunk {
            StepChunk::ModelRequest { messages } => {
                for message in messages {
                    if !message.content.trim().is_empty() {
                        println!(
                            "{} {}",
                            Theme::header("agent>"),
                            truncate(message.content.trim(), MESSAGE_PREVIEW_CHARS)
                        );
                    }
                    for call in &message.tool_calls {
                        println!("{}", Theme::dimmed(&format!("  wants {}", call.name)));
                    }
                }
            },
            StepChunk::ToolResults { results } => {
                for (name, value) in results {
                    if self.verbose {
                        println!(
                            "{}",
                            Theme::dimmed(&format!(
                                "  {name}: {}",
                                truncate(&value.to_string(), MESSAGE_PREVIEW_CHARS)
                            ))
                        );
                    } else {
                        println!("{}", Theme::dimmed(&format!("  {name} returned")));
                    }
                }
            },
            StepChunk::Interrupt { proposals } => {
                println!(
                    "{}",
                    Theme::info(&format!("{} tool call(s) need approval", proposals.len()))
                );
            },
            StepChunk::SummaryHook { .. } => {
                println!("{}", Theme::dimmed("  (context summarized)"));
            },
            StepChunk::Unknown { source, .. } => {
                if self.verbose {
                    println!("{}", Theme::dimmed(&format!("  unhandled chunk '{source}'")));
                }
            },
        }
    }

    fn notice(&self, notice: &Notice) {
        let line = match notice.level {
            NoticeLevel::Info => Theme::info(&notice.message),
            NoticeLevel::Success => Theme::success(&notice.message),
            NoticeLevel::Warn => Theme::warning(&notice.message),
            NoticeLevel::Error => Theme::error(&notice.message),
        };
        println!("{line}");
    }
}
