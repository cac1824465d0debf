//! Configuration management for market-dash.
//!
//! Handles loading configuration from TOML files and environment variables:
//! where the query service lives, which database and workgroup queries run
//! in, and how the execution poller paces itself.

use crate::error::{DashError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Region used when neither the file nor the environment names one.
const DEFAULT_REGION: &str = "us-east-1";

/// Main configuration structure for market-dash.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Query service connection settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Execution poller settings.
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Query service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// API endpoint. Defaults to the regional Athena endpoint.
    pub endpoint: Option<String>,

    /// Service region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Database (schema) queries run against.
    #[serde(default = "default_database")]
    pub database: String,

    /// Workgroup queries are submitted to.
    #[serde(default = "default_workgroup")]
    pub workgroup: String,

    /// Result output location; the workgroup's default is used when unset.
    pub output_location: Option<String>,

    /// Timeout for each individual HTTP request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_database() -> String {
    "bluebook-market-analytics-pipeline-athena-query-results".to_string()
}

fn default_workgroup() -> String {
    "primary".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
            database: default_database(),
            workgroup: default_workgroup(),
            output_location: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    /// Returns the endpoint to send requests to.
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://athena.{}.amazonaws.com", self.region))
    }

    /// Applies environment variables (ATHENA_ENDPOINT, AWS_REGION, etc.).
    ///
    /// Environment values take precedence over the config file.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("ATHENA_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(region) = lookup("AWS_REGION") {
            self.region = region;
        }
        if let Some(database) = lookup("ATHENA_DATABASE") {
            self.database = database;
        }
        if let Some(workgroup) = lookup("ATHENA_WORKGROUP") {
            self.workgroup = workgroup;
        }
        if let Some(location) = lookup("ATHENA_OUTPUT_LOCATION") {
            self.output_location = Some(location);
        }
    }

    /// Returns a display-safe summary for log output.
    pub fn display_string(&self) -> String {
        format!(
            "{} / {} @ {}",
            self.database,
            self.workgroup,
            self.endpoint_url()
        )
    }

    fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint_url();
        let url = Url::parse(&endpoint)
            .map_err(|e| DashError::config(format!("Invalid endpoint '{endpoint}': {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DashError::config(format!(
                "Invalid endpoint scheme '{}'. Expected 'http' or 'https'",
                url.scheme()
            )));
        }
        if self.database.trim().is_empty() {
            return Err(DashError::config("Database name is required"));
        }
        if self.workgroup.trim().is_empty() {
            return Err(DashError::config("Workgroup name is required"));
        }
        if self.request_timeout_secs == 0 {
            return Err(DashError::config(
                "request_timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Execution poller settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
    /// Delay between status checks, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Wall-clock budget for one execution to reach a terminal state, in seconds.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_wait_secs() -> u64 {
    300
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(DashError::config(
                "polling.interval_ms must be greater than zero",
            ));
        }
        if self.max_wait() < self.interval() {
            return Err(DashError::config(format!(
                "polling.max_wait_secs ({}s) is shorter than the poll interval ({}ms)",
                self.max_wait_secs, self.interval_ms
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("market-dash")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DashError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            DashError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Checks the settings that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<()> {
        self.service.validate()?;
        self.polling.validate()
    }
}
