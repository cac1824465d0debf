//! Query service abstraction for market-dash.
//!
//! The managed query service is reached through three stateless calls:
//! submit a query, check an execution's status, and fetch its results.
//! Backends implement [`QueryService`] so the poller and client can be
//! exercised against the scripted mock as well as the real service.

mod athena;
mod mock;

pub use athena::{AthenaClient, AthenaConfig};
pub use mock::{MockQueryService, ServiceCalls};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

/// Opaque identifier of one submitted query execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionHandle(String);

impl ExecutionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an execution as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// QUEUED and RUNNING permit continued polling.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// FAILED and CANCELLED end the run without results.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionState {
    type Err = ServiceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(ServiceError::new(format!(
                "Unrecognized execution state '{other}'"
            ))),
        }
    }
}

/// One status observation: the state plus the service's reason, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStatus {
    pub state: ExecutionState,
    pub reason: Option<String>,
}

impl ExecutionStatus {
    pub fn new(state: ExecutionState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    pub fn with_reason(state: ExecutionState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: Some(reason.into()),
        }
    }
}

/// Where a query runs on the service side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub database: String,
    pub workgroup: String,
    /// Result location override; the workgroup default is used when absent.
    pub output_location: Option<String>,
}

impl QueryContext {
    pub fn new(database: impl Into<String>, workgroup: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            workgroup: workgroup.into(),
            output_location: None,
        }
    }
}

impl From<&ServiceConfig> for QueryContext {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            database: config.database.clone(),
            workgroup: config.workgroup.clone(),
            output_location: config.output_location.clone(),
        }
    }
}

/// A single result cell; `None` is SQL NULL.
pub type RawCell = Option<String>;

/// One row of raw cells, positionally aligned with the column names.
pub type RawRow = Vec<RawCell>;

/// Columnar result payload exactly as the service returned it.
///
/// The first row is a duplicate of the column header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { columns, rows }
    }
}

/// Trait defining the submit / status / fetch contract of the query service.
///
/// Every call is a stateless request; implementations must be `Send + Sync`
/// so independent runs can share one client.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submits a query and returns the handle of the new execution.
    async fn submit(
        &self,
        sql: &str,
        context: &QueryContext,
    ) -> std::result::Result<ExecutionHandle, ServiceError>;

    /// Returns the current status of an execution.
    async fn get_status(
        &self,
        handle: &ExecutionHandle,
    ) -> std::result::Result<ExecutionStatus, ServiceError>;

    /// Fetches the full result set of a succeeded execution.
    async fn get_results(
        &self,
        handle: &ExecutionHandle,
    ) -> std::result::Result<RawResultSet, ServiceError>;
}

/// Creates the query service backend described by the configuration.
///
/// `mock` selects the scripted in-memory service with sample dashboard data.
pub fn connect(config: &ServiceConfig, mock: bool) -> Result<Arc<dyn QueryService>> {
    if mock {
        return Ok(Arc::new(MockQueryService::with_sample_data()));
    }
    let client = AthenaClient::new(AthenaConfig::from(config))?;
    Ok(Arc::new(client))
}
