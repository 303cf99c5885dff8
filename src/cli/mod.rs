//! CLI interface for poly-pair
//!
//! Provides subcommands for:
//! - `run`: start the trading loop
//! - `sessions`: report recent sessions and fills
//! - `config`: show configuration

pub mod run;
mod sessions;

pub use sessions::SessionsArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-pair")]
#[command(about = "Session-based paper trading bot for Polymarket BTC up/down markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the trading loop
    Run,
    /// Show recent sessions and their fills
    Sessions(SessionsArgs),
    /// Show current configuration
    Config,
}
