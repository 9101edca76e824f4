//! schouwen-toetsen - acceptance tests for the volgindicaties API
//!
//! Places and expires tracking indicators for scenario cohorts, then checks
//! that the change feed reports the persons each scenario expects.

use clap::Parser;
use std::path::PathBuf;

use schouwen::cli::{self, GlobalOptions};
use schouwen::commands::Commands;
use schouwen::common::logging;

#[derive(Parser)]
#[command(name = "schouwen", about = "Acceptance-test harness for the volgindicaties API")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: config.toml in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every remote call and show resolved BSNs
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    let global = GlobalOptions {
        config: cli.config,
        verbose: cli.verbose,
    };

    if let Err(e) = cli::dispatch(cli.command, &global).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
