//! SolarForge CLI — Command-line interface for a SolarForge node.
//!
//! Subcommands: status, stats, fund, forge, rollup, space.

mod commands;

use clap::{Parser, Subcommand};

/// SolarForge — turns issue sunshines into stars.
#[derive(Parser, Debug)]
#[command(name = "solarforge", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Query the status of a running node.
    Status(commands::status::StatusArgs),
    /// Show platform-wide totals.
    Stats(commands::stats::StatsArgs),
    /// Attach sunshines to an issue.
    Fund(commands::fund::FundArgs),
    /// Forge one issue.
    Forge(commands::forge::ForgeArgs),
    /// Forge every issue of a version.
    Rollup(commands::rollup::RollupArgs),
    /// Show a galaxy's user stars.
    Space(commands::space::SpaceArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Status(args) => commands::status::run(args).await,
        Commands::Stats(args) => commands::stats::run(args).await,
        Commands::Fund(args) => commands::fund::run(args).await,
        Commands::Forge(args) => commands::forge::run(args).await,
        Commands::Rollup(args) => commands::rollup::run(args).await,
        Commands::Space(args) => commands::space::run(args).await,
    }
}
