//! Acceptance scenarios
//!
//! A scenario either places and expires indicators, resets what an earlier
//! run placed, or checks the change feed for the persons it expects to have
//! changed.

pub mod catalog;
pub mod engine;
pub mod ledger;
mod runner;

pub use catalog::{Catalog, Scenario, ScenarioKind, ScenarioName};
pub use engine::{reconcile, Action, Reconciliation, ScenarioEngine, Step, StepOutcome};
pub use ledger::{ActionRecord, Exclusion, RunLedger};
pub use runner::{run_scenario, RunOptions, ScenarioReport};
