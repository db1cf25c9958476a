//! # maira-link
//!
//! Terminal client for the MAIRA realtime session link. Joins an operation,
//! prints chat and connection notices, and sends each stdin line as a chat
//! message.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use maira_core::protocol::{events, wire_timestamp};
use maira_core::{MessageCategory, ParticipantIdentity};
use maira_link::{LinkConfig, Notification, SendOutcome, SessionClient, Severity};
use maira_settings::LinkSettings;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};

/// MAIRA realtime session client.
#[derive(Parser, Debug)]
#[command(name = "maira-link", about = "MAIRA realtime session client")]
struct Cli {
    /// Collaboration server address (overrides settings).
    #[arg(long)]
    server: Option<String>,

    /// Display name shown to other participants.
    #[arg(long)]
    user: Option<String>,

    /// Participant ID (generated when unset).
    #[arg(long)]
    user_id: Option<String>,

    /// Operation to join.
    #[arg(long)]
    operation: Option<String>,

    /// Working element.
    #[arg(long)]
    element: Option<String>,

    /// Settings file (defaults to `~/.maira/link.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, settings: &mut LinkSettings) {
        if let Some(ref v) = self.server {
            settings.server.url.clone_from(v);
        }
        if let Some(ref v) = self.user {
            settings.participant.display_name.clone_from(v);
        }
        if let Some(ref v) = self.user_id {
            settings.participant.id.clone_from(v);
        }
        if let Some(ref v) = self.operation {
            settings.participant.operation_id.clone_from(v);
        }
        if let Some(ref v) = self.element {
            settings.participant.working_element_id.clone_from(v);
        }
        if let Some(ref v) = self.log_level {
            settings.logging.level.clone_from(v);
        }
    }
}

fn load(args: &Cli) -> Result<LinkSettings> {
    let path = args
        .settings
        .clone()
        .unwrap_or_else(maira_settings::settings_path);
    let mut settings = maira_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    args.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

/// Chat payload as the server expects it.
fn chat_payload(identity: &ParticipantIdentity, text: &str) -> Value {
    json!({
        "id": uuid::Uuid::now_v7().to_string(),
        "usuario": identity.display_name,
        "operacion": identity.operation_id,
        "mensaje": text,
        "timestamp": wire_timestamp(Utc::now()),
    })
}

fn print_chat(payload: &Value) {
    let from = payload
        .get("usuario")
        .and_then(Value::as_str)
        .unwrap_or("?");
    let text = payload
        .get("mensaje")
        .and_then(Value::as_str)
        .unwrap_or_default();
    println!("[{from}] {text}");
}

fn print_notification(notification: &Notification) {
    let marker = match notification.severity {
        Severity::High => "!!",
        Severity::Low => "--",
    };
    eprintln!("{marker} {}", notification.message);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = load(&args)?;
    maira_core::logging::init_subscriber(&settings.logging.level);

    let config = LinkConfig::from_settings(&settings);
    let identity = config.session.identity.clone();
    let (client, mut notifications) =
        SessionClient::start(&config).context("Failed to start session link")?;

    let _chat = client
        .on(events::CHAT_MESSAGE, print_chat)
        .await
        .context("Session link stopped")?;

    if !client
        .initialize(config.session.clone())
        .await
        .context("Session link stopped")?
    {
        while let Ok(notification) = notifications.try_recv() {
            print_notification(&notification);
        }
        client.shutdown().await;
        anyhow::bail!("Could not create a connection to {}", settings.server.url);
    }
    tracing::info!(
        server = %settings.server.url,
        participant = %identity.id,
        operation = %identity.operation_id,
        "session link started"
    );

    let mut state = client.subscribe_state();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                break;
            }
            Some(notification) = notifications.recv() => print_notification(&notification),
            Ok(()) = state.changed() => {
                let snapshot = state.borrow_and_update().clone();
                tracing::debug!(state = %snapshot.state, queued = snapshot.queued, "connection state");
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else { break };
                let text = line.trim();
                match text {
                    "" => {}
                    "/quit" => break,
                    "/status" => {
                        println!("{}", serde_json::to_string(&client.snapshot())?);
                    }
                    _ => {
                        let outcome = client
                            .send(MessageCategory::Chat, chat_payload(&identity, text))
                            .await
                            .context("Session link stopped")?;
                        if outcome == SendOutcome::Queued {
                            eprintln!("-- message queued until the connection is back");
                        }
                    }
                }
            }
        }
    }

    tracing::info!("Shutting down...");
    client.shutdown().await;
    Ok(())
}
