//! CLI command definitions
//!
//! Defines the clap commands for the harness CLI.

use chrono::NaiveDate;
use clap::Subcommand;
use std::path::PathBuf;

use crate::scenario::ScenarioName;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one scenario against the configured API
    Run {
        /// Scenario to run
        #[arg(value_enum)]
        part: ScenarioName,

        /// PL export (CSV) mapping PL numbers to BSNs
        #[arg(long)]
        pl_file: PathBuf,

        /// YAML catalog overriding the built-in scenarios
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Run ledger file (default: in the data directory)
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Print the scenario report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show scenario descriptors
    Catalog {
        /// Only show this scenario
        #[arg(value_enum)]
        part: Option<ScenarioName>,

        /// YAML catalog overriding the built-in scenarios
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Resolve PL numbers to BSNs
    Resolve {
        /// PL numbers to resolve
        #[arg(required = true)]
        pl_numbers: Vec<String>,

        /// PL export (CSV) mapping PL numbers to BSNs
        #[arg(long)]
        pl_file: PathBuf,
    },

    /// Query the change feed
    Changes {
        /// Start date, inclusive (default: today)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Print the BSNs as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clear the run ledger
    #[command(subcommand)]
    Ledger(LedgerCommands),
}

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Print the recorded action scenarios
    Show {
        /// Run ledger file (default: in the data directory)
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// Forget all recorded action scenarios
    Clear {
        /// Run ledger file (default: in the data directory)
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
}
