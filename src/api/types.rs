//! Identifier, date and wire types for the volgindicaties API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::{Error, Result};

/// Path segment of the indicator endpoint
pub const INDICATOR_PATH: &str = "volgindicaties";
/// Path segment of the change feed
pub const CHANGES_PATH: &str = "wijzigingen";
/// Query parameter carrying the start date of the change feed
pub const CHANGES_SINCE_PARAM: &str = "vanaf";
/// Collection field of the change feed response
pub const CHANGES_FIELD: &str = "burgerservicenummers";
/// Accept header sent on every call
pub const ACCEPT: &str = "application/json, application/hal+json";

/// Canonical person identifier (burgerservicenummer)
///
/// Opaque: the text is kept exactly as issued, leading zeros included.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bsn(String);

impl Bsn {
    /// Create an identifier, rejecting empty or whitespace-only input
    ///
    /// The text is not trimmed; callers reading spreadsheet cells clean
    /// them first.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::InvalidIdentifier(
                "person identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Bsn {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Bsn> for String {
    fn from(bsn: Bsn) -> Self {
        bsn.0
    }
}

/// Symbolic test-case person number ("001", "509", "V02")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlNumber(String);

impl PlNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Requested end date of a tracking indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndDate {
    /// No end date (`null` on the wire)
    Open,
    /// Ends on the given day
    On(NaiveDate),
}

impl EndDate {
    /// Sentinel used to create or extend an indicator
    pub fn far_future() -> Self {
        EndDate::On(NaiveDate::from_ymd_opt(2099, 12, 31).unwrap_or(NaiveDate::MAX))
    }

    /// The day before `today`, used to expire an indicator
    pub fn yesterday(today: NaiveDate) -> Self {
        EndDate::On(today.pred_opt().unwrap_or(NaiveDate::MIN))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            EndDate::Open => None,
            EndDate::On(date) => Some(*date),
        }
    }
}

impl fmt::Display for EndDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndDate::Open => write!(f, "null"),
            EndDate::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// Status-code policy for a single call
///
/// Each call site states which responses it accepts. Some scenarios do not
/// care about the status at all and use `Unchecked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExpectedStatus {
    /// Exactly this code
    Exact(u16),
    /// Any code whose hundreds digit matches
    Class(u8),
    /// Any code
    Unchecked,
}

impl ExpectedStatus {
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            ExpectedStatus::Exact(code) => status == *code,
            ExpectedStatus::Class(digit) => status / 100 == u16::from(*digit),
            ExpectedStatus::Unchecked => true,
        }
    }
}

impl fmt::Display for ExpectedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedStatus::Exact(code) => write!(f, "{}", code),
            ExpectedStatus::Class(digit) => write!(f, "{}xx", digit),
            ExpectedStatus::Unchecked => write!(f, "unchecked"),
        }
    }
}

impl FromStr for ExpectedStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s == "unchecked" || s == "any" {
            return Ok(ExpectedStatus::Unchecked);
        }
        if let Some(digit) = s.strip_suffix("xx") {
            return match digit.parse::<u8>() {
                Ok(d @ 1..=5) => Ok(ExpectedStatus::Class(d)),
                _ => Err(Error::Catalog(format!("Invalid status class '{}xx'", digit))),
            };
        }
        match s.parse::<u16>() {
            Ok(code @ 100..=599) => Ok(ExpectedStatus::Exact(code)),
            _ => Err(Error::Catalog(format!(
                "Invalid expected status '{}'. Use a code (201), a class (2xx) or 'unchecked'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for ExpectedStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ExpectedStatus> for String {
    fn from(status: ExpectedStatus) -> Self {
        status.to_string()
    }
}

/// Body of an indicator upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRequest {
    pub einddatum: Option<NaiveDate>,
}

/// Indicator as returned by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorResponse {
    #[serde(default)]
    pub burgerservicenummer: Option<String>,
    #[serde(default)]
    pub begindatum: Option<String>,
    #[serde(default)]
    pub einddatum: Option<String>,
}

/// Change feed as returned by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeFeedResponse {
    pub burgerservicenummers: Vec<String>,
}
