use std::path::PathBuf;
use std::sync::Arc;

use chrono_tz::Tz;
use clap::{Parser, Subcommand};

use crate::models::event::{Intent, normalize_datetime};
use crate::service::dispatcher::CommandDispatcher;
use crate::service::session_manager::SessionManager;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the browser session and report authentication state.
    Init {
        #[arg(long)]
        headless: bool,
        #[arg(long)]
        profile_dir: Option<PathBuf>,
    },
    /// Run a natural-language calendar command.
    Command { text: String },
    /// Create an event from structured fields, bypassing NLP.
    Create {
        title: String,
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List today's events.
    Today,
}

pub async fn cli(session: Arc<SessionManager>, dispatcher: Arc<CommandDispatcher>, tz: Tz) {
    // Fine to panic here
    let cli = Cli::parse();
    match cli.command {
        Commands::Init {
            headless,
            profile_dir,
        } => match session.ensure_ready(headless, profile_dir).await {
            Ok(status) => println!(
                "{}",
                serde_json::json!({ "status": "ready", "authenticated": status.authenticated })
            ),
            Err(e) => println!("Failed to initialize session: {}", e),
        },
        Commands::Command { text } => {
            if ensure_session(&session).await {
                println!("{}", dispatcher.handle(&text).await.to_json());
            }
            session.close().await;
        }
        Commands::Create {
            title,
            start,
            end,
            description,
        } => {
            let Some(start_dt) = normalize_datetime(&start, tz) else {
                println!("Unparsable start time: {}", start);
                return;
            };
            let end_dt = match &end {
                Some(end) => match normalize_datetime(end, tz) {
                    Some(end) => Some(end),
                    None => {
                        println!("Unparsable end time: {}", end);
                        return;
                    }
                },
                None => None,
            };
            let intent = Intent {
                title,
                start: start_dt,
                end: end_dt,
                description: description.unwrap_or_default(),
            };
            if ensure_session(&session).await {
                println!("{}", dispatcher.create_structured(&intent).await.to_json());
            }
            session.close().await;
        }
        Commands::Today => {
            if ensure_session(&session).await {
                println!("{}", dispatcher.read_today().await.to_json());
            }
            session.close().await;
        }
    }
}

async fn ensure_session(session: &Arc<SessionManager>) -> bool {
    match session.ensure_ready(false, None).await {
        Ok(_) => true,
        Err(e) => {
            println!("Failed to initialize session: {}", e);
            false
        }
    }
}
