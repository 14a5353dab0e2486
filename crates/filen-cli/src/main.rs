//! Filen local filesystem CLI
//!
//! Provides commands for:
//! - Building and inspecting directory tree snapshots
//! - Checking why a path is or is not synced
//! - Managing the per-location local trash
//! - Registering sync locations
//! - Running the scheduled trash purge in the foreground

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    check::CheckCommand, config::ConfigCommand, daemon::DaemonCommand,
    locations::LocationsCommand, snapshot::SnapshotCommand, trash::TrashCommand, AppContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "filen-localfs",
    version,
    about = "Local filesystem snapshots and trash management for Filen"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build (or reuse) the directory tree snapshot of a sync location
    Snapshot(SnapshotCommand),
    /// Explain whether a path would be included in snapshots
    Check(CheckCommand),
    /// Manage the local trash
    #[command(subcommand)]
    Trash(TrashCommand),
    /// Manage configured sync locations
    #[command(subcommand)]
    Locations(LocationsCommand),
    /// Run the scheduled trash purge until interrupted
    Daemon(DaemonCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn default_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = AppContext::load(cli.config.clone());

    let filter = default_filter(cli.verbose, &ctx.config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Snapshot(cmd) => cmd.execute(&ctx, format).await,
        Commands::Check(cmd) => cmd.execute(&ctx, format).await,
        Commands::Trash(cmd) => cmd.execute(&ctx, format).await,
        Commands::Locations(cmd) => cmd.execute(&ctx, format).await,
        Commands::Daemon(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(cmd) => cmd.execute(&ctx, format).await,
    }
}
