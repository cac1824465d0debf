//! Error types for market-dash.
//!
//! `DashError` is the application-level error. `QueryError` is the taxonomy a
//! single query run can fail with, and `ServiceError` is what a query service
//! backend reports before the client attaches a run stage to it.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::service::ExecutionState;

/// Reason reported when the service gives none for a failed execution.
pub const UNKNOWN_REASON: &str = "Unknown error";

/// Main error type for market-dash operations.
#[derive(Error, Debug)]
pub enum DashError {
    /// Configuration errors (invalid config file, bad endpoint URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query run failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Internal application errors (serialization, unexpected states, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DashError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Query(_) => "Query Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using DashError.
pub type Result<T> = std::result::Result<T, DashError>;

/// Error raised by a query service backend.
///
/// Carries no run stage; the query client decides whether it was a
/// submission, status or fetch failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl ServiceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Kind of a [`QueryError`], for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    SubmissionError,
    StatusError,
    ExecutionFailed,
    Timeout,
    Cancelled,
    FetchError,
}

impl QueryErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmissionError => "SubmissionError",
            Self::StatusError => "StatusError",
            Self::ExecutionFailed => "ExecutionFailed",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::FetchError => "FetchError",
        }
    }
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal failure of one query run. No partial results accompany it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The service rejected the query string.
    #[error("Query submission failed: {0}")]
    Submission(String),

    /// A status query could not be completed.
    #[error("Query status check failed: {0}")]
    Status(String),

    /// The service reported FAILED or CANCELLED.
    #[error("Query {state}: {reason}")]
    ExecutionFailed {
        state: ExecutionState,
        reason: String,
    },

    /// The poller gave up before a terminal state was observed.
    #[error("Query timed out after {waited:?} without reaching a terminal state")]
    Timeout { waited: Duration },

    /// The caller abandoned the run.
    #[error("Query run was cancelled by the caller")]
    Cancelled,

    /// Results could not be retrieved after a successful execution.
    #[error("Failed to fetch query results: {0}")]
    Fetch(String),
}

impl QueryError {
    /// Builds an `ExecutionFailed` error, substituting the generic reason
    /// when the service supplied none.
    pub fn execution_failed(state: ExecutionState, reason: Option<String>) -> Self {
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_REASON.to_string());
        Self::ExecutionFailed { state, reason }
    }

    pub fn kind(&self) -> QueryErrorKind {
        match self {
            Self::Submission(_) => QueryErrorKind::SubmissionError,
            Self::Status(_) => QueryErrorKind::StatusError,
            Self::ExecutionFailed { .. } => QueryErrorKind::ExecutionFailed,
            Self::Timeout { .. } => QueryErrorKind::Timeout,
            Self::Cancelled => QueryErrorKind::Cancelled,
            Self::Fetch(_) => QueryErrorKind::FetchError,
        }
    }

    /// Human-readable message, suitable for embedding in an error response.
    pub fn message(&self) -> String {
        self.to_string()
    }
}
