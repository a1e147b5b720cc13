//! Abel Wallet CLI
//!
//! Chain inspection and wallet-store housekeeping for an Abel wallet.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "abel-wallet")]
#[command(about = "Abel wallet - inspect the chain and manage the wallet store")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the latest and the latest safe chain height
    Info,

    /// Show the ring a block height belongs to
    Ring {
        /// Block height
        height: u64,
    },

    /// Show a block, if it is safe to use in a ring
    Block {
        /// Block height
        height: u64,
    },

    /// List coins in the wallet store
    Coins {
        /// Include spent coins
        #[arg(long)]
        all: bool,
    },

    /// List or drop pending transactions in the wallet store
    Pending {
        /// Remove the pending transaction with this key
        #[arg(long)]
        remove: Option<String>,
    },

    /// Validate and print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => commands::info::run(&config),
        Commands::Ring { height } => commands::ring::run(&config, height),
        Commands::Block { height } => commands::block::run(&config, height),
        Commands::Coins { all } => commands::coins::run(&config, all),
        Commands::Pending { remove } => commands::pending::run(&config, remove.as_deref()),
        Commands::Config => commands::config::run(&config),
    }
}
