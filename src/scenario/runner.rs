//! Scenario dispatcher
//!
//! Looks up a scenario's descriptor, runs the matching engine operation and
//! reports each step. Step failures end the scenario and are returned as a
//! failed report rather than an error.

use chrono::NaiveDate;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeSet;

use tracing::info;

use crate::api::RemoteApi;
use crate::common::{Error, Result};
use crate::lookup::PlLookup;

use super::catalog::{Catalog, Scenario, ScenarioKind, ScenarioName};
use super::engine::{Reconciliation, ScenarioEngine, Step, StepOutcome};
use super::ledger::{ActionRecord, Exclusion, RunLedger};

/// Options for a single run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Day the run is anchored to
    pub today: NaiveDate,
    /// Print resolved BSNs and confirmed end dates
    pub verbose: bool,
    /// Print nothing (JSON report mode)
    pub quiet: bool,
}

/// Result of a scenario run
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub name: ScenarioName,
    pub kind: ScenarioKind,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub steps: Vec<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<Reconciliation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioReport {
    fn new(name: ScenarioName, kind: ScenarioKind, steps_total: usize) -> Self {
        Self {
            name,
            kind,
            passed: false,
            steps_run: 0,
            steps_total,
            steps: Vec::new(),
            reconciliation: None,
            error_code: None,
            error: None,
        }
    }

    fn fail(mut self, error: &Error) -> Self {
        self.passed = false;
        self.error_code = Some(error.code());
        self.error = Some(error.to_string());
        self
    }

    /// Account for one attempted step and print it
    fn observe_step(
        &mut self,
        position: usize,
        step: &Step,
        result: &Result<StepOutcome>,
        options: &RunOptions,
    ) {
        self.steps_run = position;
        let label = format!("{} {}", step.action, step.pl);
        match result {
            Ok(outcome) => {
                if !options.quiet {
                    if options.verbose {
                        println!(
                            "  {} Step {}: {} {}",
                            "✓".green(),
                            position,
                            label.dimmed(),
                            format!("(bsn {}, einddatum {})", outcome.bsn, outcome.einddatum).dimmed()
                        );
                    } else {
                        println!("  {} Step {}: {}", "✓".green(), position, label.dimmed());
                    }
                }
                self.steps.push(outcome.clone());
            }
            Err(e) => {
                if !options.quiet {
                    println!("  {} Step {}: {} {}", "✗".red(), position, label.dimmed(), e);
                }
            }
        }
    }

    /// Close an action scenario, recording it in `ledger` when it completed
    fn finish_actions(mut self, result: Result<ActionRecord>, ledger: &mut RunLedger) -> Self {
        match result {
            Ok(record) => {
                ledger.record(self.name, record);
                self.passed = true;
                self
            }
            Err(e) => self.fail(&e),
        }
    }
}

/// Run `name` from `catalog`
///
/// Action scenarios that complete are recorded in `ledger`; the caller
/// decides whether to persist it. Verify scenarios read their exclusion set
/// from it.
pub async fn run_scenario<A: RemoteApi + ?Sized>(
    name: ScenarioName,
    catalog: &Catalog,
    lookup: &PlLookup,
    api: &A,
    ledger: &mut RunLedger,
    options: &RunOptions,
) -> Result<ScenarioReport> {
    let scenario = catalog.get(name)?;
    let engine = ScenarioEngine::new(api, lookup, options.today);

    if !options.quiet {
        println!(
            "\n{} {} {}",
            "Running Scenario:".blue().bold(),
            name.as_str().white().bold(),
            format!("({})", scenario.kind()).dimmed()
        );
    }
    info!(scenario = %name, kind = %scenario.kind(), today = %options.today, "scenario started");

    let report = match scenario {
        Scenario::Place {
            place,
            expire,
            place_status,
            expire_status,
        } => {
            let mut report = ScenarioReport::new(name, scenario.kind(), place.len() + expire.len());
            print_steps_header(options);
            let result = engine
                .setup_observed(place, expire, *place_status, *expire_status, |position, step, result| {
                    report.observe_step(position, step, result, options)
                })
                .await;
            report.finish_actions(result, ledger)
        }
        Scenario::Reset { reset, status } => {
            let mut report = ScenarioReport::new(name, scenario.kind(), reset.len());
            print_steps_header(options);
            let result = engine
                .reset_observed(reset, *status, |position, step, result| {
                    report.observe_step(position, step, result, options)
                })
                .await;
            report.finish_actions(result, ledger)
        }
        Scenario::Verify {
            expect,
            exclude_expired_by,
        } => {
            let mut excluded = BTreeSet::new();
            if let Some(source) = exclude_expired_by {
                let exclusion = ledger.exclusion(*source, options.today);
                let stale_note = match &exclusion {
                    Exclusion::Stale { executed_on, .. } => format!(" (recorded {})", executed_on),
                    Exclusion::NotRun => " (not run)".to_string(),
                    Exclusion::Current(_) => String::new(),
                };
                excluded = exclusion.into_bsns();
                if !options.quiet {
                    println!(
                        "  Excluding {} BSN(s) expired by {}{}",
                        excluded.len(),
                        source.as_str().dimmed(),
                        stale_note.yellow()
                    );
                }
            }

            let mut report = ScenarioReport::new(name, scenario.kind(), 1);
            match engine.verify(expect, &excluded).await {
                Ok(reconciliation) => {
                    if !options.quiet {
                        println!(
                            "  {} Step 1: {} required BSN(s) reported by the change feed",
                            "✓".green(),
                            reconciliation.required.len()
                        );
                        if options.verbose && !reconciliation.extra.is_empty() {
                            println!(
                                "  {} unrelated change(s) also reported",
                                reconciliation.extra.len().to_string().dimmed()
                            );
                        }
                    }
                    report.steps_run = 1;
                    report.passed = true;
                    report.reconciliation = Some(reconciliation);
                    report
                }
                Err(e) => {
                    if !options.quiet {
                        println!("  {} Step 1: {}", "✗".red(), e);
                    }
                    report.steps_run = 1;
                    report.fail(&e)
                }
            }
        }
    };

    if !options.quiet {
        if report.passed {
            println!("\n{} {}\n", "✓".green().bold(), "Scenario Passed".green().bold());
        } else {
            println!("\n{} {}\n", "✗".red().bold(), "Scenario Failed".red().bold());
        }
    }
    info!(scenario = %name, passed = report.passed, "scenario finished");

    Ok(report)
}

fn print_steps_header(options: &RunOptions) {
    if !options.quiet {
        println!("\n{}", "Steps:".cyan());
    }
}
