//! schouwen-toetsen - acceptance tests for the volgindicaties API
//!
//! This library drives tracking indicators ("volgindicaties") through
//! scenario cohorts and reconciles the change feed ("wijzigingen") against
//! the persons each scenario expects to have changed.

pub mod api;
pub mod cli;
pub mod commands;
pub mod common;
pub mod lookup;
pub mod scenario;
pub mod stub;

// Re-export commonly used types for tests
pub use api::{ApiClient, Bsn, EndDate, ExpectedStatus, PlNumber, RemoteApi};
pub use common::{Error, Result};
