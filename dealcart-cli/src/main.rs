//! Dealcart CLI - chat with a shopping assistant and manage the cart.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dealcart::api::MemoryShopApi;
use dealcart::config::{ClientConfig, config_path, load_config, save_config};
use dealcart::session::MemoryStorage;
use dealcart::{AssistantBuilder, ShoppingAssistant};
use dealcart_cli::chat::{self, ChatCommand, ChatSession};
use dealcart_cli::demo;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Dealcart CLI - conversational deal search with a remote cart
#[derive(Parser, Debug)]
#[command(name = "dealcart")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (defaults to ~/.dealcart/config.json)
    #[arg(long, global = true, env = "DEALCART_CONFIG")]
    config: Option<PathBuf>,

    /// Use a built-in demo catalog instead of the remote service
    #[arg(long, global = true)]
    offline: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat (the default)
    Chat,
    /// Send a single query and print the reply
    Ask {
        /// What you're looking for
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Show the cart
    Cart,
    /// Inspect or forget the session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    /// Print the session id
    Show,
    /// Forget the session id
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("dealcart=warn,dealcart_cli=info"),
        1 => EnvFilter::new("dealcart=debug,dealcart_cli=debug"),
        _ => EnvFilter::new("dealcart=trace,dealcart_cli=trace"),
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn assistant(config: ClientConfig, offline: bool) -> anyhow::Result<ShoppingAssistant> {
    let mut builder = AssistantBuilder::new().config(config);
    if offline {
        debug!("offline mode, using the demo catalog");
        builder = builder
            .api(Arc::new(MemoryShopApi::with_catalog(demo::catalog())))
            .storage(Arc::new(MemoryStorage::new()));
    }
    builder
        .build()
        .await
        .context("failed to start the assistant")
}

async fn run_config(action: ConfigAction, path: PathBuf, config: &ClientConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.api.token.is_some() {
                shown.api.token = Some("***".into());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            save_config(&path, &ClientConfig::default()).await?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let path = args.config.unwrap_or_else(config_path);
    let mut config = load_config(&path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;
    config.apply_env();

    let command = match args.command.unwrap_or(Command::Chat) {
        Command::Config { action } => return run_config(action, path, &config).await,
        other => other,
    };

    let session = ChatSession::new(assistant(config, args.offline).await?);
    match command {
        Command::Chat => session.run().await?,
        Command::Ask { query } => {
            println!("{}", session.execute(ChatCommand::Query(query.join(" "))).await);
        }
        Command::Cart => println!("{}", session.execute(ChatCommand::Cart).await),
        Command::Session { action } => match action {
            SessionAction::Show => println!("{}", session.execute(ChatCommand::Session).await),
            SessionAction::Clear { yes } => {
                if yes || chat::confirm("Forget this session and its cart?").await? {
                    session.assistant().forget_session().await?;
                    println!("Session cleared.");
                } else {
                    println!("Cancelled.");
                }
            }
        },
        Command::Config { .. } => {}
    }

    Ok(())
}
