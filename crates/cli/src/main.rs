//! handoff CLI: the main entry point.
//!
//! Commands:
//! - (none)  - Chat with the root agent, interactively or with `-m`
//! - `roles` - List the available roles and their delegation tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod display;
mod input;

#[derive(Parser)]
#[command(
    name = "handoff",
    about = "handoff — a lead agent that delegates to a tree of sub-agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Role of the root agent (defaults to `root_role` from the config)
    #[arg(long, env = "HANDOFF_ROLE")]
    role: Option<String>,

    /// Override the model
    #[arg(long)]
    model: Option<String>,

    /// Workspace directory the file tools are confined to
    #[arg(long)]
    root: Option<PathBuf>,

    /// Send a single message instead of entering interactive mode
    #[arg(short, long)]
    message: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List roles and the agents they delegate to
    Roles,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with streamed model output.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Some(Commands::Roles) => commands::roles::run()?,
        None => {
            commands::chat::run(commands::chat::ChatOptions {
                role: cli.role,
                model: cli.model,
                root: cli.root,
                message: cli.message,
                verbose: cli.verbose,
            })
            .await?
        }
    }

    Ok(())
}
