//! Larsen CLI - command-line interface for the Larsen feedback monitor.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "larsen")]
#[command(author, version, about = "Acoustic feedback detection and prevention", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a WAV file for sustained feedback
    Analyze(commands::analyze::AnalyzeArgs),

    /// Monitor a live capture device
    Live(commands::live::LiveArgs),

    /// List available capture devices
    Devices(commands::devices::DevicesArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => commands::analyze::run(args),
        Commands::Live(args) => commands::live::run(args),
        Commands::Devices(args) => commands::devices::run(args),
    }
}
