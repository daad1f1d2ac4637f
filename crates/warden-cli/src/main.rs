//! Warden CLI - operator console for the approval gate.
//!
//! `warden run` drives an agent engine and stops at every proposed tool
//! call for an operator decision. The remaining subcommands inspect audit
//! files, try the safety validator, show configuration and check which
//! external tools are installed.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use warden_config::{Config, ResolvedConfig, ShowFormat};

mod commands;
mod config_bridge;
mod console;
mod theme;

use commands::{audit, config, doctor, run, validate};

/// Warden - human-in-the-loop gate for agent-driven security testing
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the layered user/workspace files
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent session with operator approval of every tool call
    Run {
        /// Task for the agent; asked interactively when omitted
        prompt: Option<String>,

        /// IP address, CIDR range or URL under test, recorded in the audit log
        #[arg(short, long)]
        target: Option<String>,

        /// Agent engine base URL (overrides [engine] url)
        #[arg(long, env = "WARDEN_ENGINE_URL")]
        engine_url: Option<String>,

        /// Skip the authorization confirmation
        #[arg(long)]
        i_am_authorized: bool,
    },

    /// Inspect audit files
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },

    /// Try the safety validator
    Validate {
        #[command(subcommand)]
        command: ValidateCommands,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Check external tools and configuration
    Doctor,
}

#[derive(Subcommand)]
enum AuditCommands {
    /// List audit files, newest first
    List {
        /// Audit directory (defaults to [audit] directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Print the events of one audit file
    Show {
        /// Audit file
        file: PathBuf,
    },
    /// Print event counts for one audit file
    Summary {
        /// Audit file
        file: PathBuf,
    },
    /// Verify the hash chain of one audit file
    Verify {
        /// Audit file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ValidateCommands {
    /// Check SQL text against the forbidden-keyword rules
    Sql {
        /// Query text
        query: String,
        /// Allowed schema (repeatable; overrides [safety] allowed_schemas)
        #[arg(short, long = "schema")]
        schemas: Vec<String>,
    },
    /// Show which flags would be stripped from a command line
    Flags {
        /// Arguments, as one shell-quoted string
        arguments: String,
    },
    /// Check that a target is an IP address, CIDR range or URL
    Target {
        /// Target text
        target: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved configuration with source annotations
    Show {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
        /// Show only one section (e.g. gate, approval, phases)
        #[arg(short, long)]
        section: Option<String>,
    },
    /// Validate the current configuration
    Validate,
}

fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    match explicit {
        Some(path) => Config::load_file(path)
            .with_context(|| format!("failed to load config file {}", path.display())),
        None => {
            let workspace_root = std::env::current_dir().ok();
            Config::load(workspace_root.as_deref()).context("failed to load configuration")
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref());

    let mut log_config = match &loaded {
        Ok(resolved) => config_bridge::to_log_config(&resolved.config),
        Err(_) => warden_telemetry::LogConfig::new("warn")
            .with_format(warden_telemetry::LogFormat::Compact),
    };
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = warden_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Run {
            prompt,
            target,
            engine_url,
            i_am_authorized,
        } => {
            let options = run::RunOptions {
                prompt,
                target,
                engine_url,
                authorized: i_am_authorized,
                verbose: cli.verbose,
            };
            run::run_session(loaded?, options).await?;
        },
        Commands::Audit { command } => handle_audit(command, loaded)?,
        Commands::Validate { command } => {
            let config = loaded.map(|r| r.config).unwrap_or_default();
            match command {
                ValidateCommands::Sql { query, schemas } => {
                    validate::validate_sql_text(&config, &query, schemas)?;
                },
                ValidateCommands::Flags { arguments } => {
                    validate::validate_flags(&config, &arguments)?;
                },
                ValidateCommands::Target { target } => {
                    validate::validate_target_text(&target)?;
                },
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { format, section } => {
                let format = match format.as_str() {
                    "json" => ShowFormat::Json,
                    _ => ShowFormat::Toml,
                };
                config::show_config(&loaded?, format, section.as_deref())?;
            },
            ConfigCommands::Validate => config::validate_config(&loaded),
        },
        Commands::Doctor => doctor::run_doctor(&loaded),
    }

    Ok(())
}

fn handle_audit(command: AuditCommands, loaded: Result<ResolvedConfig>) -> Result<()> {
    match command {
        AuditCommands::List { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => loaded?.config.audit.directory,
            };
            audit::list_audit_files_in(&dir)
        },
        AuditCommands::Show { file } => audit::show_audit_file(&file),
        AuditCommands::Summary { file } => audit::show_summary(&file),
        AuditCommands::Verify { file } => audit::verify_audit_file(&file),
    }
}
