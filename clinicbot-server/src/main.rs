use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use clinicbot_common::models::{Channel, InboundMessage, TicketStatus};
use clinicbot_common::traits::TicketRepository;
use clinicbot_core::config::AppConfig;
use clinicbot_core::Error;

mod context;
use context::ServerContext;

#[derive(Parser, Debug, Clone)]
#[command(name = "clinicbot")]
#[command(author, version, about = "Clinic chatbot triage and escalation engine")]
struct Args {
    /// TOML config file. Secrets may also come from the environment or `.env`.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Postgres connection URL. Overrides the config file and DATABASE_URL.
    #[arg(long)]
    db_url: Option<String>,

    /// Continue an existing conversation instead of starting a new one.
    #[arg(long)]
    conversation_id: Option<Uuid>,

    /// Channel the console session is recorded as.
    #[arg(long, default_value = "cli")]
    channel: Channel,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("clinicbot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).with_writer(std::io::stderr).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    info!("Clinicbot starting. channel={}", args.channel);

    if let Err(e) = run(args).await {
        error!("Server error: {:?}", e);
        return Err(anyhow::Error::new(e).context("clinicbot session failed"));
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run(args: Args) -> Result<(), Error> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(url) = args.db_url.clone() {
        config.database_url = Some(url);
    }

    let ctx = ServerContext::new(config).await?;
    let mut conversation_id = args.conversation_id.unwrap_or_else(Uuid::new_v4);
    info!("Conversation {} ready; type a message, or /help", conversation_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            match run_command(&ctx, &mut conversation_id, command).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    error!("Command failed: {}", e);
                    continue;
                }
            }
        }

        let response = ctx
            .conversation_service
            .handle_message(InboundMessage::new(conversation_id, line, args.channel))
            .await;
        print_json(&response);
    }

    ctx.shutdown().await;
    Ok(())
}

/// Console commands. Returns `Ok(false)` to end the session.
async fn run_command(ctx: &ServerContext, conversation_id: &mut Uuid, command: &str) -> Result<bool, Error> {
    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or_default() {
        "quit" | "exit" => return Ok(false),
        "new" => {
            *conversation_id = Uuid::new_v4();
            println!("conversation {}", conversation_id);
        }
        "tickets" => {
            let status = parts.next().map(str::parse::<TicketStatus>).transpose()?;
            let tickets = ctx.ticket_repo.list_tickets(status, 50).await?;
            print_json(&tickets);
        }
        "ticket" => {
            let (Some(id), Some(status)) = (parts.next(), parts.next()) else {
                return Err(Error::Parse(
                    "usage: /ticket <id> <open|in_progress|resolved> [notes...]".into(),
                ));
            };
            let id = Uuid::parse_str(id).map_err(|e| Error::Parse(e.to_string()))?;
            let status = status.parse::<TicketStatus>()?;
            let notes = parts.collect::<Vec<_>>().join(" ");
            let notes = (!notes.is_empty()).then_some(notes);
            let ticket = ctx
                .conversation_service
                .tickets()
                .update_status(id, status, notes)
                .await?;
            print_json(&ticket);
        }
        "trend" => {
            let trend = ctx.conversation_service.conversation_trend(*conversation_id).await?;
            print_json(&trend);
        }
        _ => {
            println!("commands: /new  /tickets [status]  /ticket <id> <status> [notes]  /trend  /quit");
        }
    }
    Ok(true)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => error!("Could not serialise output: {}", e),
    }
}
