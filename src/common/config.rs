//! Configuration file handling
//!
//! The configuration is read once at startup and passed by reference to the
//! components that need it. Environment variables override the file.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Environment variable holding the full API base URL
pub const ENV_BASE_URL: &str = "API_BASE_URL";
/// Environment variable holding the API host name (served over https)
pub const ENV_HOST: &str = "API_HOST";
/// Environment variable holding the bearer token
pub const ENV_TOKEN: &str = "API_TOKEN";

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// PL lookup export settings
    #[serde(default)]
    pub lookup: LookupConfig,
}

/// Remote API settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.example.nl/haalcentraal/api/brp`
    pub base_url: Option<String>,

    /// Host name; used as `https://<api_host>` when `base_url` is unset
    pub api_host: Option<String>,

    /// Bearer token sent on every call
    pub token: Option<String>,

    /// Require the indicator response to echo the requested BSN
    #[serde(default)]
    pub verify_bsn_echo: bool,
}

/// Resolved API endpoint and credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    /// Base URL without trailing slash
    pub base_url: String,
    /// Bearer token
    pub token: String,
}

impl ApiConfig {
    /// Resolve the base URL and token, failing when either is missing
    pub fn endpoint(&self) -> Result<ApiEndpoint> {
        let base_url = match (&self.base_url, &self.api_host) {
            (Some(url), _) if !url.trim().is_empty() => url.trim().to_string(),
            (_, Some(host)) if !host.trim().is_empty() => format!("https://{}", host.trim()),
            _ => {
                return Err(Error::Config(format!(
                    "No API base URL configured. Set [api] base_url or api_host, or the {} / {} environment variable",
                    ENV_BASE_URL, ENV_HOST
                )))
            }
        };

        let token = match &self.token {
            Some(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => {
                return Err(Error::Config(format!(
                    "No API token configured. Set [api] token or the {} environment variable",
                    ENV_TOKEN
                )))
            }
        };

        Ok(ApiEndpoint {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Budget for a single remote call
    #[serde(default = "default_request")]
    pub request_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_secs: default_request(),
        }
    }
}

impl Timeouts {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

fn default_request() -> u64 {
    10
}

/// Layout of the PL lookup export
#[derive(Debug, Deserialize, Clone)]
pub struct LookupConfig {
    /// Rows to skip before the header row
    #[serde(default = "default_skip_rows")]
    pub skip_rows: usize,

    /// Header of the PL number column
    #[serde(default = "default_pl_column")]
    pub pl_column: String,

    /// Header of the BSN column
    #[serde(default = "default_bsn_column")]
    pub bsn_column: String,

    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            skip_rows: default_skip_rows(),
            pl_column: default_pl_column(),
            bsn_column: default_bsn_column(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_skip_rows() -> usize {
    1
}
fn default_pl_column() -> String {
    "PLnummer".to_string()
}
fn default_bsn_column() -> String {
    "BSN".to_string()
}
fn default_delimiter() -> char {
    ','
}

impl Config {
    /// Load configuration from `path`, or from the default config file
    ///
    /// An explicit path must exist. The default file is optional and the
    /// built-in defaults are used when it is absent. Environment overrides
    /// are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.api.base_url = Some(url);
        }
        if let Some(host) = lookup(ENV_HOST).filter(|v| !v.is_empty()) {
            // An explicit host replaces a base URL coming from the file
            if lookup(ENV_BASE_URL).is_none() {
                self.api.base_url = None;
            }
            self.api.api_host = Some(host);
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            self.api.token = Some(token);
        }
    }
}
