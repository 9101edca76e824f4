//! Remote API access
//!
//! The harness talks to two endpoints: the per-person indicator
//! (`PUT volgindicaties/{bsn}`) and the change feed (`GET wijzigingen`).
//! The scenario engine only sees the [`RemoteApi`] trait.

mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{Bsn, EndDate, ExpectedStatus, PlNumber};

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::common::Result;

/// Operations the scenario engine needs from the remote system
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Upsert the end date of `bsn`'s indicator
    ///
    /// Returns the non-empty `einddatum` the remote system reports back.
    async fn upsert_indicator(
        &self,
        bsn: &Bsn,
        end_date: EndDate,
        expected: ExpectedStatus,
    ) -> Result<String>;

    /// Identifiers the remote system reports as changed since `date`
    async fn changed_since(&self, date: NaiveDate) -> Result<BTreeSet<Bsn>>;

    /// Create or extend an indicator with the far-future sentinel
    async fn create_indicator(&self, bsn: &Bsn, expected: ExpectedStatus) -> Result<String> {
        self.upsert_indicator(bsn, EndDate::far_future(), expected)
            .await
    }

    /// Expire an indicator by ending it the day before `today`
    async fn expire_indicator(
        &self,
        bsn: &Bsn,
        today: NaiveDate,
        expected: ExpectedStatus,
    ) -> Result<String> {
        self.upsert_indicator(bsn, EndDate::yesterday(today), expected)
            .await
    }
}
