//! Run ledger
//!
//! Scenarios run as separate invocations, in an order chosen by whoever runs
//! the suite. The ledger records which BSNs each action scenario actually
//! placed and expired, so a later verification can exclude them without
//! re-deriving the sets from the catalog.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, warn};

use crate::api::Bsn;
use crate::common::paths::ensure_parent_dir;
use crate::common::{Error, Result};

use super::catalog::ScenarioName;

/// What one action scenario did to the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Day the scenario ran
    pub executed_on: NaiveDate,
    /// BSNs whose indicator was created or extended
    #[serde(default)]
    pub placed: BTreeSet<Bsn>,
    /// BSNs whose indicator was expired
    #[serde(default)]
    pub expired: BTreeSet<Bsn>,
}

impl ActionRecord {
    pub fn new(executed_on: NaiveDate) -> Self {
        Self {
            executed_on,
            placed: BTreeSet::new(),
            expired: BTreeSet::new(),
        }
    }
}

/// Exclusion set for a verification, with how current it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// The source scenario has no record; nothing is excluded
    NotRun,
    /// Recorded on the day of the verification
    Current(BTreeSet<Bsn>),
    /// Recorded on an earlier day; still applied
    Stale {
        executed_on: NaiveDate,
        expired: BTreeSet<Bsn>,
    },
}

impl Exclusion {
    pub fn is_stale(&self) -> bool {
        matches!(self, Exclusion::Stale { .. })
    }

    pub fn into_bsns(self) -> BTreeSet<Bsn> {
        match self {
            Exclusion::NotRun => BTreeSet::new(),
            Exclusion::Current(expired) | Exclusion::Stale { expired, .. } => expired,
        }
    }
}

/// Action records keyed by scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLedger {
    #[serde(default)]
    runs: BTreeMap<ScenarioName, ActionRecord>,
}

impl RunLedger {
    /// Load the ledger, or start an empty one when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no run ledger yet");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Ledger(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "run ledger saved");
        Ok(())
    }

    /// Delete the ledger file if present
    pub fn clear(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Store the record of `name`, replacing an earlier run
    pub fn record(&mut self, name: ScenarioName, record: ActionRecord) {
        self.runs.insert(name, record);
    }

    pub fn get(&self, name: ScenarioName) -> Option<&ActionRecord> {
        self.runs.get(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScenarioName, &ActionRecord)> {
        self.runs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// What `source` expired, to be excluded from a verification on `today`
    ///
    /// When `source` has not run there is nothing to exclude.
    pub fn exclusion(&self, source: ScenarioName, today: NaiveDate) -> Exclusion {
        match self.runs.get(&source) {
            Some(record) if record.executed_on == today => Exclusion::Current(record.expired.clone()),
            Some(record) => {
                warn!(
                    scenario = %source,
                    executed_on = %record.executed_on,
                    "excluding BSNs expired on an earlier day"
                );
                Exclusion::Stale {
                    executed_on: record.executed_on,
                    expired: record.expired.clone(),
                }
            }
            None => {
                warn!(scenario = %source, "scenario has not run, nothing to exclude");
                Exclusion::NotRun
            }
        }
    }

    /// BSNs expired by `source`, whatever day they were recorded
    pub fn expired_by(&self, source: ScenarioName, today: NaiveDate) -> BTreeSet<Bsn> {
        self.exclusion(source, today).into_bsns()
    }
}
