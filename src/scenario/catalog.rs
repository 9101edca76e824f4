//! Scenario catalog
//!
//! The built-in scenarios are hand-authored lists of PL numbers. A YAML
//! catalog file may replace any of them. PL numbers must be quoted in YAML
//! (`"001"`), otherwise they are read as integers and rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::api::{ExpectedStatus, PlNumber};
use crate::common::{Error, Result};

/// Known scenario names
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ScenarioName {
    #[serde(rename = "deel_4")]
    #[value(name = "deel_4")]
    Deel4,
    #[serde(rename = "deel_4_reset")]
    #[value(name = "deel_4_reset")]
    Deel4Reset,
    #[serde(rename = "deel_4_verwacht")]
    #[value(name = "deel_4_verwacht")]
    Deel4Verwacht,
    #[serde(rename = "deel_7")]
    #[value(name = "deel_7")]
    Deel7,
    #[serde(rename = "deel_7_reset")]
    #[value(name = "deel_7_reset")]
    Deel7Reset,
    #[serde(rename = "deel_7_verwacht")]
    #[value(name = "deel_7_verwacht")]
    Deel7Verwacht,
    #[serde(rename = "deel_9")]
    #[value(name = "deel_9")]
    Deel9,
    #[serde(rename = "deel_9_reset")]
    #[value(name = "deel_9_reset")]
    Deel9Reset,
    #[serde(rename = "deel_9_verwacht")]
    #[value(name = "deel_9_verwacht")]
    Deel9Verwacht,
}

impl ScenarioName {
    pub const ALL: [ScenarioName; 9] = [
        ScenarioName::Deel4,
        ScenarioName::Deel4Reset,
        ScenarioName::Deel4Verwacht,
        ScenarioName::Deel7,
        ScenarioName::Deel7Reset,
        ScenarioName::Deel7Verwacht,
        ScenarioName::Deel9,
        ScenarioName::Deel9Reset,
        ScenarioName::Deel9Verwacht,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioName::Deel4 => "deel_4",
            ScenarioName::Deel4Reset => "deel_4_reset",
            ScenarioName::Deel4Verwacht => "deel_4_verwacht",
            ScenarioName::Deel7 => "deel_7",
            ScenarioName::Deel7Reset => "deel_7_reset",
            ScenarioName::Deel7Verwacht => "deel_7_verwacht",
            ScenarioName::Deel9 => "deel_9",
            ScenarioName::Deel9Reset => "deel_9_reset",
            ScenarioName::Deel9Verwacht => "deel_9_verwacht",
        }
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ScenarioName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::Catalog(format!("Unknown scenario '{}'", s)))
    }
}

/// What a scenario does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scenario {
    /// Create indicators, then expire others
    Place {
        #[serde(default)]
        place: Vec<PlNumber>,
        #[serde(default)]
        expire: Vec<PlNumber>,
        #[serde(default = "default_action_status")]
        place_status: ExpectedStatus,
        #[serde(default = "default_action_status")]
        expire_status: ExpectedStatus,
    },
    /// Expire everything a previous run placed
    Reset {
        reset: Vec<PlNumber>,
        #[serde(default = "default_reset_status")]
        status: ExpectedStatus,
    },
    /// Check the change feed
    Verify {
        expect: Vec<PlNumber>,
        /// Ignore BSNs that this action scenario expired
        #[serde(default)]
        exclude_expired_by: Option<ScenarioName>,
    },
}

fn default_action_status() -> ExpectedStatus {
    ExpectedStatus::Class(2)
}

fn default_reset_status() -> ExpectedStatus {
    ExpectedStatus::Unchecked
}

/// Variant of a scenario, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Place,
    Reset,
    Verify,
}

impl ScenarioKind {
    /// Place and reset scenarios change remote state and are recorded
    pub fn is_action(self) -> bool {
        !matches!(self, ScenarioKind::Verify)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioKind::Place => "place",
            ScenarioKind::Reset => "reset",
            ScenarioKind::Verify => "verify",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Scenario {
    pub fn kind(&self) -> ScenarioKind {
        match self {
            Scenario::Place { .. } => ScenarioKind::Place,
            Scenario::Reset { .. } => ScenarioKind::Reset,
            Scenario::Verify { .. } => ScenarioKind::Verify,
        }
    }
}

fn pls(items: &[&str]) -> Vec<PlNumber> {
    items.iter().copied().map(PlNumber::from).collect()
}

fn place(to_place: &[&str], to_expire: &[&str]) -> Scenario {
    Scenario::Place {
        place: pls(to_place),
        expire: pls(to_expire),
        place_status: default_action_status(),
        expire_status: default_action_status(),
    }
}

fn reset(to_reset: &[&str]) -> Scenario {
    Scenario::Reset {
        reset: pls(to_reset),
        status: default_reset_status(),
    }
}

fn verify(expect: &[&str], exclude_expired_by: Option<ScenarioName>) -> Scenario {
    Scenario::Verify {
        expect: pls(expect),
        exclude_expired_by,
    }
}

/// Built-in descriptor for `name`
pub fn builtin(name: ScenarioName) -> Scenario {
    match name {
        ScenarioName::Deel4 => place(
            &["001", "V02"],
            &["501", "502", "503", "504", "505", "506", "507", "509"],
        ),
        ScenarioName::Deel4Reset => reset(&["001", "V02"]),
        ScenarioName::Deel4Verwacht => verify(&["V02"], None),
        ScenarioName::Deel7 => place(&["005", "150"], &["501"]),
        ScenarioName::Deel7Reset => reset(&["005", "150"]),
        ScenarioName::Deel7Verwacht => verify(&["005", "150", "501"], Some(ScenarioName::Deel4)),
        ScenarioName::Deel9 => place(&["V12"], &["501", "503", "509"]),
        ScenarioName::Deel9Reset => reset(&["V12"]),
        ScenarioName::Deel9Verwacht => {
            verify(&["V12", "501", "503", "509"], Some(ScenarioName::Deel4))
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    scenarios: BTreeMap<ScenarioName, Scenario>,
}

/// All scenario descriptors, keyed by name
#[derive(Debug, Clone)]
pub struct Catalog {
    scenarios: BTreeMap<ScenarioName, Scenario>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            scenarios: ScenarioName::ALL
                .into_iter()
                .map(|name| (name, builtin(name)))
                .collect(),
        }
    }

    /// Built-in catalog with the descriptors from `yaml` replacing their
    /// built-in counterparts
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Catalog(format!("Failed to parse catalog: {}", e)))?;

        let mut catalog = Self::builtin();
        catalog.scenarios.extend(file.scenarios);
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::Catalog(msg) => Error::Catalog(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn get(&self, name: ScenarioName) -> Result<&Scenario> {
        self.scenarios
            .get(&name)
            .ok_or_else(|| Error::Catalog(format!("Scenario '{}' is not defined", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScenarioName, &Scenario)> {
        self.scenarios.iter()
    }

    fn validate(&self) -> Result<()> {
        for (name, scenario) in &self.scenarios {
            match scenario {
                Scenario::Place { place, expire, .. } => {
                    if place.is_empty() && expire.is_empty() {
                        return Err(Error::Catalog(format!(
                            "Scenario '{}' places and expires nothing",
                            name
                        )));
                    }
                }
                Scenario::Reset { reset, .. } => {
                    if reset.is_empty() {
                        return Err(Error::Catalog(format!("Scenario '{}' resets nothing", name)));
                    }
                }
                Scenario::Verify {
                    expect,
                    exclude_expired_by,
                } => {
                    if expect.is_empty() {
                        return Err(Error::Catalog(format!("Scenario '{}' expects nothing", name)));
                    }
                    if let Some(source) = exclude_expired_by {
                        if !matches!(self.scenarios.get(source), Some(Scenario::Place { .. })) {
                            return Err(Error::Catalog(format!(
                                "Scenario '{}' excludes BSNs expired by '{}', which is not a place scenario",
                                name, source
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
