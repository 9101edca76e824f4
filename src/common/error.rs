//! Error types for the acceptance-test harness
//!
//! Every error is terminal for the scenario step in progress. Messages carry
//! the offending URL, payload or identifier set so a failed run can be read
//! without re-running it.

use std::collections::BTreeSet;
use std::io;
use thiserror::Error;

use crate::api::Bsn;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Remote API Errors ===
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Protocol error from {url}: {message}")]
    Protocol { url: String, message: String },

    // === Identifier Resolution Errors ===
    #[error("PL number '{0}' not found in the lookup table")]
    NotFound(String),

    #[error("PL number '{key}' maps to both BSN '{first}' and BSN '{second}'")]
    AmbiguousKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("Invalid person identifier: {0}")]
    InvalidIdentifier(String),

    // === Reconciliation Errors ===
    #[error("Expected changes not reported by the change feed: {}", format_missing(.missing))]
    ExpectationNotMet { missing: BTreeSet<Bsn> },

    #[error("Scenario '{name}' failed: {reason}")]
    ScenarioFailed { name: String, reason: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid scenario catalog: {0}")]
    Catalog(String),

    #[error("PL lookup error: {0}")]
    Lookup(String),

    #[error("Run ledger error: {0}")]
    Ledger(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_missing(missing: &BTreeSet<Bsn>) -> String {
    missing
        .iter()
        .map(|b| b.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a protocol error for a response from `url`
    pub fn protocol(url: &str, message: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// Create a transport error for a request to `url`
    pub fn transport(url: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            source,
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Stable machine-readable code, used in JSON reports
    pub fn code(&self) -> &'static str {
        match self {
            Error::Transport { .. } => "TRANSPORT",
            Error::Protocol { .. } => "PROTOCOL",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AmbiguousKey { .. } => "AMBIGUOUS_KEY",
            Error::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Error::ExpectationNotMet { .. } => "EXPECTATION_NOT_MET",
            Error::ScenarioFailed { .. } => "SCENARIO_FAILED",
            Error::Config(_) | Error::ConfigParse(_) => "CONFIG",
            Error::Catalog(_) => "CATALOG",
            Error::Lookup(_) => "LOOKUP",
            Error::Ledger(_) => "LEDGER",
            _ => "INTERNAL_ERROR",
        }
    }
}
