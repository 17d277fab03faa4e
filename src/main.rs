use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use fleetbot::cli::{Cli, Commands};
use fleetbot::core::init_logger;
use fleetbot::telegram::TelegramTransport;
use fleetbot::{config::Config, Dispatcher, Engine, SqliteStorage, Storage, Transport};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to the chosen subcommand.
///
/// # Errors
/// Returns an error if initialization fails (config, logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::CheckConfig) => check_config(&config),
        Some(Commands::Run) | None => run_bot(config).await,
    }
}

fn check_config(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    println!("bot_token: {}", if config.bot_token.is_some() { "set" } else { "missing" });
    Ok(())
}

async fn run_bot(config: Config) -> Result<()> {
    init_logger(config.log_file.as_deref())?;
    log::info!("Starting fleetbot v{}", env!("CARGO_PKG_VERSION"));

    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::open(&config.database_path)
            .with_context(|| format!("failed to open database {}", config.database_path))?,
    );
    bootstrap_admins(storage.as_ref(), &config.bootstrap_admins).await?;

    let token = config
        .bot_token
        .as_ref()
        .context("bot token is not set (FLEETBOT_BOT_TOKEN, TELOXIDE_TOKEN or BOT_TOKEN)")?;
    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(
        token,
        config.api_url.as_deref(),
        config.dispatch.poll_timeout(),
    )?);

    let engine = Arc::new(Engine::new(Arc::clone(&storage), &config));

    transport.reset_pending().await?;
    if let Err(e) = transport.set_commands(&engine.command_menu()).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(signal::ctrl_c(), shutdown.clone()));

    Dispatcher::new(transport, engine, &config.dispatch).run(shutdown).await;
    log::info!("Bye");
    Ok(())
}

/// Makes sure every configured admin exists and carries the admin flag.
async fn bootstrap_admins(storage: &dyn Storage, admins: &[i64]) -> Result<()> {
    for &user_id in admins {
        if storage.get_user(user_id).await?.is_none() {
            storage.register_user(user_id, None, None).await?;
        }
        storage.set_admin_status(user_id, true).await?;
        log::info!("Bootstrap admin {} registered", user_id);
    }
    Ok(())
}

/// Cancels `shutdown` once `signal` fires. A handler that fails to install
/// leaves the bot running.
async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            log::info!("Received Ctrl+C, stopping...");
            shutdown.cancel();
        }
        Err(e) => log::error!("Failed to listen for Ctrl+C, the bot only stops when killed: {}", e),
    }
}
