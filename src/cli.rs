//! Command-line argument parsing for market-dash.
//!
//! Uses clap to parse which dashboard query to run and per-invocation
//! overrides of the configuration file.

use crate::config::Config;
use crate::dashboard::DashboardQuery;
use clap::Parser;
use std::path::PathBuf;

/// What to run: one dashboard query, or all of them concurrently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryTarget {
    #[default]
    Cars,
    OwnerStats,
    All,
}

impl QueryTarget {
    /// The dashboard queries this target covers.
    pub fn queries(&self) -> Vec<DashboardQuery> {
        match self {
            Self::Cars => vec![DashboardQuery::Cars],
            Self::OwnerStats => vec![DashboardQuery::OwnerStats],
            Self::All => DashboardQuery::ALL.to_vec(),
        }
    }
}

impl std::str::FromStr for QueryTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        match s.parse::<DashboardQuery>() {
            Ok(DashboardQuery::Cars) => Ok(Self::Cars),
            Ok(DashboardQuery::OwnerStats) => Ok(Self::OwnerStats),
            Err(_) => Err(format!(
                "Invalid query: {s}. Expected: cars, owner-stats, or all"
            )),
        }
    }
}

/// Runs the market dashboard's queries and prints the records as JSON.
#[derive(Parser, Debug)]
#[command(name = "market-dash")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Dashboard query to run: cars, owner-stats, or all
    #[arg(value_name = "QUERY", default_value = "cars")]
    pub query: QueryTarget,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Query service endpoint URL
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Database the queries run against
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Workgroup queries are submitted to
    #[arg(short = 'w', long, value_name = "WORKGROUP")]
    pub workgroup: Option<String>,

    /// Delay between status checks, in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Give up waiting for an execution after this many seconds
    #[arg(long, value_name = "SECS")]
    pub max_wait_secs: Option<u64>,

    /// Use the in-memory mock service (sample data, for testing)
    #[arg(long)]
    pub mock: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies command-line overrides, which take precedence over the file
    /// and the environment.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.service.endpoint = Some(endpoint.clone());
        }
        if let Some(database) = &self.database {
            config.service.database = database.clone();
        }
        if let Some(workgroup) = &self.workgroup {
            config.service.workgroup = workgroup.clone();
        }
        if let Some(interval) = self.poll_interval_ms {
            config.polling.interval_ms = interval;
        }
        if let Some(max_wait) = self.max_wait_secs {
            config.polling.max_wait_secs = max_wait;
        }
    }
}
