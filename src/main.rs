use clap::Parser;
use colored::*;
use scilab_speed_check::core::{BridgeEngine, CheckOptions};
use scilab_speed_check::{logging, run_speed_check};
use std::path::PathBuf;

/// Checks the speed penalty of the Scilab bridge: raw command latency, then
/// progressively larger array transfers.
#[derive(Parser)]
#[command(name = "scilab-speed-check", version)]
struct Cli {
    /// Settings file; defaults are used when it does not exist
    #[arg(long, default_value = "appsettings.json")]
    config: PathBuf,

    /// Engine to measure, overriding the settings file
    #[arg(long, value_enum)]
    engine: Option<BridgeEngine>,

    /// Save the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Save one CSV row per trial
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print a per-trial summary table after the report
    #[arg(long)]
    summary: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let options = CheckOptions {
        config: cli.config,
        engine: cli.engine,
        json: cli.json,
        csv: cli.csv,
        summary: cli.summary,
    };

    if let Err(e) = run_speed_check(&options).await {
        eprintln!("{} {}", "Fatal error:".bold().red(), e);
        std::process::exit(1);
    }
}
