//! CLI command handling
//!
//! Builds the collaborators a command needs (config, API client, PL lookup,
//! catalog, ledger) and formats output.

use chrono::NaiveDate;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::api::{ApiClient, PlNumber, RemoteApi};
use crate::commands::{Commands, LedgerCommands};
use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::lookup::PlLookup;
use crate::scenario::{run_scenario, Catalog, RunLedger, RunOptions, Scenario, ScenarioReport};

/// Options shared by all commands
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, global: &GlobalOptions) -> Result<()> {
    match command {
        Commands::Run {
            part,
            pl_file,
            catalog,
            ledger,
            json,
        } => {
            let config = Config::load(global.config.as_deref())?;
            let client = ApiClient::new(&config)?;
            let lookup = PlLookup::from_path(&pl_file, &config.lookup)?;
            let catalog = load_catalog(catalog.as_deref())?;
            let ledger_path = resolve_ledger_path(ledger)?;
            let mut ledger = RunLedger::load(&ledger_path)?;

            let options = RunOptions {
                today: today(),
                verbose: global.verbose,
                quiet: json,
            };
            let report =
                run_scenario(part, &catalog, &lookup, &client, &mut ledger, &options).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }

            conclude_run(report, &ledger, &ledger_path)
        }

        Commands::Catalog { part, catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            for (name, scenario) in catalog.iter() {
                if part.is_some_and(|p| p != *name) {
                    continue;
                }
                print_scenario(name.as_str(), scenario);
            }
            Ok(())
        }

        Commands::Resolve {
            pl_numbers,
            pl_file,
        } => {
            let config = Config::load(global.config.as_deref())?;
            let lookup = PlLookup::from_path(&pl_file, &config.lookup)?;
            for pl in pl_numbers {
                let pl = PlNumber::new(pl);
                let bsn = lookup.resolve(&pl)?;
                println!("{} -> {}", pl, bsn);
            }
            Ok(())
        }

        Commands::Changes { since, json } => {
            let config = Config::load(global.config.as_deref())?;
            let client = ApiClient::new(&config)?;
            let since = since.unwrap_or_else(today);
            let changed = client.changed_since(since).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&changed)?);
            } else if changed.is_empty() {
                println!("No changes since {}", since);
            } else {
                println!("Changed since {} ({}):", since, changed.len());
                for bsn in &changed {
                    println!("  {}", bsn);
                }
            }
            Ok(())
        }

        Commands::Ledger(ledger_cmd) => match ledger_cmd {
            LedgerCommands::Show { ledger } => {
                let path = resolve_ledger_path(ledger)?;
                let ledger = RunLedger::load(&path)?;
                if ledger.is_empty() {
                    println!("No scenarios recorded in {}", path.display());
                    return Ok(());
                }
                for (name, record) in ledger.iter() {
                    println!(
                        "{} {}",
                        name.as_str().bold(),
                        format!("(ran {})", record.executed_on).dimmed()
                    );
                    println!("  placed:  {}", join(&record.placed));
                    println!("  expired: {}", join(&record.expired));
                }
                Ok(())
            }

            LedgerCommands::Clear { ledger } => {
                let path = resolve_ledger_path(ledger)?;
                RunLedger::clear(&path)?;
                println!("Run ledger cleared");
                Ok(())
            }
        },
    }
}

/// Turn a finished run into the command result
///
/// Only completed action scenarios are written back to the ledger. A failed
/// run leaves the file as it was.
fn conclude_run(report: ScenarioReport, ledger: &RunLedger, ledger_path: &Path) -> Result<()> {
    if !report.passed {
        return Err(Error::ScenarioFailed {
            name: report.name.to_string(),
            reason: report.error.unwrap_or_else(|| "unknown failure".to_string()),
        });
    }
    if report.kind.is_action() {
        ledger.save(ledger_path)?;
    }
    Ok(())
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::load(path),
        None => Ok(Catalog::builtin()),
    }
}

fn resolve_ledger_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    explicit.or_else(paths::ledger_path).ok_or_else(|| {
        Error::Config("Could not determine a data directory; pass --ledger".to_string())
    })
}

fn join<T: std::fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    let joined = items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}

fn print_scenario(name: &str, scenario: &Scenario) {
    match scenario {
        Scenario::Place {
            place,
            expire,
            place_status,
            expire_status,
        } => {
            println!("{} {}", name.bold(), "(place)".dimmed());
            println!("  place  [{}]: {}", place_status, join(place));
            println!("  expire [{}]: {}", expire_status, join(expire));
        }
        Scenario::Reset { reset, status } => {
            println!("{} {}", name.bold(), "(reset)".dimmed());
            println!("  expire [{}]: {}", status, join(reset));
        }
        Scenario::Verify {
            expect,
            exclude_expired_by,
        } => {
            println!("{} {}", name.bold(), "(verify)".dimmed());
            println!("  expect: {}", join(expect));
            if let Some(source) = exclude_expired_by {
                println!("  exclude: expired by {}", source);
            }
        }
    }
}
