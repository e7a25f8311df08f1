//! `handoff`: chat with the root agent, interactively or with `-m`.

use std::io::Write;
use std::path::PathBuf;

use handoff_agent::{RoleRegistry, Runner, RunnerFactory, RunnerSettings, TurnResult};
use handoff_config::{AppConfig, ConfigError};
use handoff_security::Sandbox;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

use crate::display::Display;
use crate::input::{InputAction, InputBuffer};

pub struct ChatOptions {
    pub role: Option<String>,
    pub model: Option<String>,
    pub root: Option<PathBuf>,
    pub message: Option<String>,
    pub verbose: bool,
}

pub async fn run(options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(model) = options.model {
        config.default_model = model;
    }
    if let Some(root) = options.root {
        config.workspace_root = Some(root);
    }

    let credentials = match config.credentials() {
        Ok(credentials) => credentials,
        Err(e @ ConfigError::MissingCredentials { .. }) => {
            eprintln!();
            eprintln!("  ERROR: No API key configured!");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    HANDOFF_API_KEY=sk-...");
            eprintln!("    OPENAI_API_KEY=sk-...");
            eprintln!();
            eprintln!("  Or add `api_key` to {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let sandbox = Sandbox::new(config.workspace_root())?;
    let catalog = handoff_tools::builtin_tools(&sandbox, &config.tools);
    let provider = handoff_providers::build_from_config(&config, credentials.clone())?;
    let factory = RunnerFactory::new(
        provider,
        RunnerSettings::from_config(&config),
        catalog,
        RoleRegistry::from_config(&config),
        sandbox.root(),
    );

    let role = options.role.unwrap_or_else(|| config.root_role.clone());
    let root = factory.root(&role, credentials)?;
    let mut display = Display::terminal(options.verbose);

    if let Some(message) = options.message {
        run_turn(&root, message, &mut display).await?;
        println!();
        return Ok(());
    }

    eprintln!();
    eprintln!("  handoff — {role} on {}", config.default_model);
    eprintln!("  Workspace: {}", sandbox.root().display());
    eprintln!("  Enter a blank line to send. Type 'exit' to quit.");
    eprintln!();

    let mut input = InputBuffer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        match input.push(&line) {
            InputAction::Continue => continue,
            InputAction::Exit => break,
            InputAction::Submit(text) => {
                if let Err(e) = run_turn(&root, text, &mut display).await {
                    display.error(e);
                }
                println!();
                prompt()?;
            }
        }
    }

    // EOF with a message still buffered: send it.
    if let Some(text) = input.finish() {
        run_turn(&root, text, &mut display).await?;
        println!();
    }

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

/// Drive one turn while rendering the root's events. The thinking
/// indicator is cleared when the waiting state fires, or when the turn
/// ends without any output.
async fn run_turn<O: Write, E: Write>(
    root: &Runner,
    text: String,
    display: &mut Display<O, E>,
) -> handoff_core::Result<TurnResult> {
    let mut events = root.subscribe();
    let mut busy = root.busy_signal();
    let turn = root.send_message(text);
    tokio::pin!(turn);

    display.start_thinking();
    loop {
        tokio::select! {
            biased;
            Some(_) = busy.busy(), if display.is_thinking() => display.stop_thinking(),
            event = events.recv() => match event {
                Ok(event) => display.render(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Display fell behind the event stream"),
                Err(RecvError::Closed) => {}
            },
            result = &mut turn => {
                loop {
                    match events.try_recv() {
                        Ok(event) => display.render(&event),
                        Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "Display fell behind the event stream"),
                        Err(_) => break,
                    }
                }
                display.stop_thinking();
                return result;
            }
        }
    }
}
