//! Scenario engine
//!
//! Drives indicator upserts for a scenario's PL numbers and reconciles the
//! expected changes against the change feed. All calls are awaited one at a
//! time; placements always precede expirations within one setup.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use tracing::info;

use crate::api::{Bsn, ExpectedStatus, PlNumber, RemoteApi};
use crate::common::{Error, Result};
use crate::lookup::PlLookup;

use super::ledger::ActionRecord;

/// Indicator mutation for one person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Upsert with the far-future end date
    Create,
    /// Upsert with yesterday's end date
    Expire,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Expire => write!(f, "expire"),
        }
    }
}

/// A planned upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    pub pl: PlNumber,
    pub status: ExpectedStatus,
}

/// A completed upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub action: Action,
    pub pl: PlNumber,
    pub bsn: Bsn,
    /// End date as confirmed by the remote system
    pub einddatum: String,
}

/// Outcome of comparing expected changes with the change feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Expected BSNs minus the excluded ones
    pub required: BTreeSet<Bsn>,
    /// Expected BSNs that were dropped by the exclusion set
    pub excluded_hits: BTreeSet<Bsn>,
    /// Required BSNs the feed did not report
    pub missing: BTreeSet<Bsn>,
    /// Reported BSNs that were not expected (informational)
    pub extra: BTreeSet<Bsn>,
}

impl Reconciliation {
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }

    /// Turn a non-empty `missing` set into `ExpectationNotMet`
    pub fn into_result(self) -> Result<Self> {
        if self.is_satisfied() {
            Ok(self)
        } else {
            Err(Error::ExpectationNotMet {
                missing: self.missing,
            })
        }
    }
}

/// `required = expected - excluded`, then check `required ⊆ observed`
///
/// The check is one-directional: the feed may report more than expected.
pub fn reconcile(
    expected: &BTreeSet<Bsn>,
    excluded: &BTreeSet<Bsn>,
    observed: &BTreeSet<Bsn>,
) -> Reconciliation {
    let required: BTreeSet<Bsn> = expected.difference(excluded).cloned().collect();
    Reconciliation {
        missing: required.difference(observed).cloned().collect(),
        excluded_hits: expected.intersection(excluded).cloned().collect(),
        extra: observed.difference(expected).cloned().collect(),
        required,
    }
}

/// Plan the upserts of a setup: every placement, then every expiration
pub fn plan_setup(
    to_place: &[PlNumber],
    to_expire: &[PlNumber],
    place_status: ExpectedStatus,
    expire_status: ExpectedStatus,
) -> Vec<Step> {
    let placements = to_place.iter().map(|pl| Step {
        action: Action::Create,
        pl: pl.clone(),
        status: place_status,
    });
    let expirations = to_expire.iter().map(|pl| Step {
        action: Action::Expire,
        pl: pl.clone(),
        status: expire_status,
    });
    placements.chain(expirations).collect()
}

/// Plan the upserts of a reset
pub fn plan_reset(to_reset: &[PlNumber], status: ExpectedStatus) -> Vec<Step> {
    plan_setup(&[], to_reset, status, status)
}

/// Executes scenario operations against a remote API
pub struct ScenarioEngine<'a, A: RemoteApi + ?Sized> {
    api: &'a A,
    lookup: &'a PlLookup,
    today: NaiveDate,
}

impl<'a, A: RemoteApi + ?Sized> ScenarioEngine<'a, A> {
    /// `today` anchors both "yesterday" for expirations and the change feed
    pub fn new(api: &'a A, lookup: &'a PlLookup, today: NaiveDate) -> Self {
        Self { api, lookup, today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Resolve and apply one step
    pub async fn apply(&self, step: &Step) -> Result<StepOutcome> {
        let bsn = self.lookup.resolve(&step.pl)?;
        let einddatum = match step.action {
            Action::Create => self.api.create_indicator(&bsn, step.status).await?,
            Action::Expire => {
                self.api
                    .expire_indicator(&bsn, self.today, step.status)
                    .await?
            }
        };
        info!(action = %step.action, pl = %step.pl, bsn = %bsn, %einddatum, "indicator updated");
        Ok(StepOutcome {
            action: step.action,
            pl: step.pl.clone(),
            bsn,
            einddatum,
        })
    }

    /// Apply steps in order, stopping at the first failure
    ///
    /// `observe` sees every attempted step with its 1-based position,
    /// including the one that failed.
    pub async fn apply_all<F>(&self, steps: &[Step], mut observe: F) -> Result<ActionRecord>
    where
        F: FnMut(usize, &Step, &Result<StepOutcome>),
    {
        let mut record = ActionRecord::new(self.today);
        for (i, step) in steps.iter().enumerate() {
            let result = self.apply(step).await;
            observe(i + 1, step, &result);
            record_outcome(&mut record, result?);
        }
        Ok(record)
    }

    /// Create every member of `to_place`, then expire every member of `to_expire`
    pub async fn setup(
        &self,
        to_place: &[PlNumber],
        to_expire: &[PlNumber],
        place_status: ExpectedStatus,
        expire_status: ExpectedStatus,
    ) -> Result<ActionRecord> {
        self.setup_observed(to_place, to_expire, place_status, expire_status, |_, _, _| {})
            .await
    }

    /// `setup`, reporting each step to `observe`
    pub async fn setup_observed<F>(
        &self,
        to_place: &[PlNumber],
        to_expire: &[PlNumber],
        place_status: ExpectedStatus,
        expire_status: ExpectedStatus,
        observe: F,
    ) -> Result<ActionRecord>
    where
        F: FnMut(usize, &Step, &Result<StepOutcome>),
    {
        let steps = plan_setup(to_place, to_expire, place_status, expire_status);
        self.apply_all(&steps, observe).await
    }

    /// Expire every member of `to_reset`
    pub async fn reset(&self, to_reset: &[PlNumber], status: ExpectedStatus) -> Result<ActionRecord> {
        self.reset_observed(to_reset, status, |_, _, _| {}).await
    }

    /// `reset`, reporting each step to `observe`
    pub async fn reset_observed<F>(
        &self,
        to_reset: &[PlNumber],
        status: ExpectedStatus,
        observe: F,
    ) -> Result<ActionRecord>
    where
        F: FnMut(usize, &Step, &Result<StepOutcome>),
    {
        let steps = plan_reset(to_reset, status);
        self.apply_all(&steps, observe).await
    }

    /// Check that every expected, non-excluded BSN appears in today's feed
    pub async fn verify(
        &self,
        expected: &[PlNumber],
        excluded: &BTreeSet<Bsn>,
    ) -> Result<Reconciliation> {
        let expected: BTreeSet<Bsn> = self.lookup.resolve_all(expected)?.into_iter().collect();
        let observed = self.api.changed_since(self.today).await?;
        let reconciliation = reconcile(&expected, excluded, &observed);
        info!(
            required = reconciliation.required.len(),
            excluded = reconciliation.excluded_hits.len(),
            observed = observed.len(),
            missing = reconciliation.missing.len(),
            "change feed reconciled"
        );
        reconciliation.into_result()
    }
}

/// Fold a completed step into the scenario's record
pub fn record_outcome(record: &mut ActionRecord, outcome: StepOutcome) {
    match outcome.action {
        Action::Create => {
            record.expired.remove(&outcome.bsn);
            record.placed.insert(outcome.bsn);
        }
        Action::Expire => {
            record.placed.remove(&outcome.bsn);
            record.expired.insert(outcome.bsn);
        }
    }
}
