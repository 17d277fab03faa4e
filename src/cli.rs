use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fleetbot")]
#[command(author, version, about = "Telegram bot for vehicle fleet bookkeeping", long_about = None)]
pub struct Cli {
    /// Config file (defaults to fleetbot.toml in the working directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot (default)
    Run,
    /// Load and validate the configuration, then print it with the token redacted
    CheckConfig,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
