#![expect(clippy::print_stdout)]

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use medscan_api_client::HealthApiClient;
use medscan_chat_core::{
    ChatNodeKind, ControllerError, ControllerOptions, MessageBody, RevealHandle, RevealOutcome,
    SelectedFile, SendOutcome, SessionController, Tab, UiAction, UserProfile,
};

pub mod command;
pub mod config;
pub mod terminal;

use command::{HELP, LineBuffer, SessionRef, ShellCommand, parse_command};
use config::ShellConfig;
use terminal::{TerminalPrompt, render_history, render_surface, unseen_suffix};

const REVEAL_POLL: Duration = Duration::from_millis(30);

#[derive(Parser, Debug)]
#[command(name = "medscan")]
#[command(about = "Terminal client for the MedScan health assistant")]
pub struct ShellCli {
    /// Backend base URL (overrides MEDSCAN_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,
    /// Request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Delay between revealed characters; 0 renders replies at once
    #[arg(long)]
    pub reveal_interval_ms: Option<u64>,
    #[arg(long)]
    pub age: Option<u32>,
    #[arg(long)]
    pub language: Option<String>,
    #[arg(long)]
    pub literacy_level: Option<String>,
}

type Controller = SessionController<HealthApiClient>;

pub async fn run(cli: ShellCli) -> Result<()> {
    let mut config = ShellConfig::from_env().context("load MEDSCAN_* configuration")?;
    config.apply_cli(&cli);

    let api = HealthApiClient::new(config.api_config()).context("build API client")?;
    tracing::info!(base_url = %api.base_url(), "starting medscan shell");
    let controller = SessionController::new(
        Arc::new(api),
        Arc::new(TerminalPrompt),
        ControllerOptions {
            reveal: config.reveal_mode(),
        },
    );
    let mut profile = config.profile.clone();

    controller.initialize().await;
    println!("{HELP}\n");
    println!("{}", render_surface(&controller.snapshot().await));

    let stdin = io::stdin();
    let mut buffer = LineBuffer::default();
    loop {
        print!("{}", if buffer.is_continuing() { "… " } else { "> " });
        io::stdout().flush().context("flush stdout")?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("read stdin")? == 0 {
            break;
        }
        let Some(input) = buffer.push(&line) else {
            continue;
        };
        let command = match parse_command(&input) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                println!("{error}");
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        if let Err(error) = execute(&controller, &mut profile, command).await {
            tracing::debug!(error = %error, "command failed");
            if let Some(api_error) = error.api().filter(|api_error| api_error.is_transport()) {
                println!("✗ {}", api_error.user_message());
            }
        }
    }
    Ok(())
}

async fn execute(
    controller: &Controller,
    profile: &mut UserProfile,
    command: ShellCommand,
) -> Result<(), ControllerError> {
    match command {
        ShellCommand::Send(text) => {
            let outcome = controller.send_message(&text, profile).await?;
            match outcome {
                SendOutcome::Delivered {
                    reveal: Some(handle),
                } => {
                    stream_reveal(controller, handle).await;
                    print_fairness(controller).await;
                }
                SendOutcome::Delivered { reveal: None } | SendOutcome::Failed { .. } => {
                    print_surface(controller).await;
                }
                SendOutcome::Ignored | SendOutcome::Stale => {}
            }
            return Ok(());
        }
        ShellCommand::NewSession => controller.dispatch(UiAction::NewSession, profile).await?,
        ShellCommand::History => {
            controller.refresh_history().await;
            println!("{}", render_history(&controller.snapshot().await.history));
            return Ok(());
        }
        ShellCommand::Open(target) => {
            let Some(session_id) = resolve_session(controller, target).await else {
                println!("Conversation introuvable.");
                return Ok(());
            };
            controller
                .dispatch(UiAction::SelectSession(session_id), profile)
                .await?;
        }
        ShellCommand::Delete(target) => {
            let Some(session_id) = resolve_session(controller, target).await else {
                println!("Conversation introuvable.");
                return Ok(());
            };
            controller
                .dispatch(UiAction::DeleteSession(session_id), profile)
                .await?;
        }
        ShellCommand::DeleteAll => {
            controller
                .dispatch(UiAction::DeleteAllSessions, profile)
                .await?;
        }
        ShellCommand::File(path) => match SelectedFile::from_path(&path).await {
            Ok(file) => {
                controller.switch_tab(Tab::Scan).await;
                controller.select_file(Some(file)).await;
            }
            Err(error) => {
                println!("Impossible de lire {} : {error}", path.display());
                controller.select_file(None).await;
                return Ok(());
            }
        },
        ShellCommand::Analyze => {
            controller.switch_tab(Tab::Scan).await;
            println!("Analyse en cours...");
            controller.dispatch(UiAction::Analyze, profile).await?;
        }
        ShellCommand::ScanReset => controller.dispatch(UiAction::ResetScan, profile).await?,
        ShellCommand::Tab(tab) => controller.dispatch(UiAction::SwitchTab(tab), profile).await?,
        ShellCommand::Profile(update) => {
            update.apply(profile);
            println!(
                "Profil : {} ans, {}, {}",
                profile.age, profile.language, profile.literacy_level
            );
            return Ok(());
        }
        ShellCommand::Help => {
            println!("{HELP}");
            return Ok(());
        }
        ShellCommand::Quit => return Ok(()),
    }
    print_surface(controller).await;
    Ok(())
}

async fn resolve_session(controller: &Controller, target: SessionRef) -> Option<String> {
    match target {
        SessionRef::Id(id) => Some(id),
        SessionRef::Index(index) => controller
            .snapshot()
            .await
            .history
            .rows
            .get(index.checked_sub(1)?)
            .map(|row| row.session_id.clone()),
    }
}

async fn print_surface(controller: &Controller) {
    println!("{}", render_surface(&controller.snapshot().await));
}

async fn print_fairness(controller: &Controller) {
    let surface = controller.snapshot().await;
    let card = surface
        .chat_nodes()
        .iter()
        .rev()
        .find(|node| matches!(node.kind, ChatNodeKind::FairnessCard(_)));
    if let Some(node) = card {
        println!("{}", terminal::render_node(node));
    }
}

/// Prints the reply as the controller reveals it, by polling the node.
async fn stream_reveal(controller: &Controller, handle: RevealHandle) {
    let node = handle.node();
    let mut printed = 0usize;
    print!("Assistant > ");
    loop {
        let surface = controller.snapshot().await;
        let (text, done) = match surface.node(node).map(|node| &node.kind) {
            Some(ChatNodeKind::Message {
                body: MessageBody::Revealing { shown, .. },
                ..
            }) => (shown.clone(), false),
            Some(ChatNodeKind::Message { body, .. }) => (body.source().to_string(), true),
            _ => break,
        };
        let fresh = unseen_suffix(&text, printed);
        if !fresh.is_empty() {
            print!("{fresh}");
            printed += fresh.chars().count();
            if let Err(error) = io::stdout().flush() {
                tracing::warn!(error = %error, "flush stdout failed");
            }
        }
        if done {
            break;
        }
        tokio::time::sleep(REVEAL_POLL).await;
    }
    println!();
    if handle.wait().await == RevealOutcome::Superseded {
        tracing::debug!(node = %node, "reveal superseded");
    }
}
