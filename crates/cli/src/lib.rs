pub mod commands;
pub mod console;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "guardchat",
    about = "Moderated chat with a hosted agent",
    long_about = "Chat with a remotely hosted agent while every message in both directions is screened by a content-safety service.",
    after_help = "Examples:\n  guardchat chat --agent Mobilito\n  guardchat agents\n  guardchat doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a guardchat.toml file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive, moderated chat session")]
    Chat {
        #[arg(long, help = "Agent id or configured name (defaults to the first configured agent)")]
        agent: Option<String>,
        #[arg(long, help = "Customer id added as context to every submitted message")]
        customer_id: Option<String>,
        #[arg(long, help = "Cancel a run still active after this many seconds")]
        run_deadline_secs: Option<u64>,
        #[arg(long, help = "Show the content-safety breakdown of each message and reply")]
        show_safety_analysis: bool,
    },
    #[command(about = "List the agents known to the configuration")]
    Agents {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, moderation mode, and agent-service reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config;

    let result = match cli.command {
        Command::Chat { agent, customer_id, run_deadline_secs, show_safety_analysis } => {
            commands::chat::run(commands::chat::ChatOptions {
                config_path,
                agent,
                customer_id,
                run_deadline_secs,
                show_safety_analysis,
            })
        }
        Command::Agents { json } => commands::agents::run(config_path.as_deref(), json),
        Command::Config => commands::config::run(config_path.as_deref()),
        Command::Doctor { json } => commands::doctor::run(config_path.as_deref(), json),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
