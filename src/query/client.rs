//! Query client for market-dash.
//!
//! Runs one SQL string end to end: submit, wait for completion, fetch and
//! decode. Each run owns its execution handle and poll loop; runs share
//! nothing but the stateless service client.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decoder::{CoercionSchema, Record, ResultDecoder};
use super::poller::ExecutionPoller;
use crate::config::Config;
use crate::error::QueryError;
use crate::service::{ExecutionHandle, ExecutionState, QueryContext, QueryService};

/// Where a run is in its lifecycle.
///
/// `Submitted → Polling → Succeeded → Fetching → Decoded`, or one of the
/// failure leaves `Failed`, `Cancelled`, `TimedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Submitted,
    Polling,
    Succeeded,
    Fetching,
    Decoded,
    Failed,
    Cancelled,
    TimedOut,
}

impl RunPhase {
    /// The failure leaf a run ends in for the given error.
    pub fn for_error(error: &QueryError) -> Self {
        match error {
            QueryError::Timeout { .. } => Self::TimedOut,
            QueryError::Cancelled
            | QueryError::ExecutionFailed {
                state: ExecutionState::Cancelled,
                ..
            } => Self::Cancelled,
            _ => Self::Failed,
        }
    }
}

/// A completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Decoded records, in service row order.
    pub records: Vec<Record>,
    /// Execution the records came from.
    pub execution: ExecutionHandle,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
    /// Status queries issued while waiting.
    pub status_checks: usize,
    /// Rows dropped for having the wrong number of cells.
    pub skipped_rows: usize,
}

/// Phase bookkeeping for one run, logged as it advances.
struct RunTracker<'a> {
    sql: &'a str,
    phase: RunPhase,
}

impl<'a> RunTracker<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            phase: RunPhase::Submitted,
        }
    }

    fn advance(&mut self, phase: RunPhase) {
        debug!("Run phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn fail(&mut self, error: QueryError) -> QueryError {
        self.advance(RunPhase::for_error(&error));
        warn!(
            "Query run failed ({}): {} [sql: {}]",
            error.kind(),
            error,
            self.sql
        );
        error
    }
}

/// Orchestrates submission, polling and decoding against a query service.
#[derive(Clone)]
pub struct QueryClient {
    service: Arc<dyn QueryService>,
    context: QueryContext,
    poller: ExecutionPoller,
    decoder: ResultDecoder,
}

impl QueryClient {
    /// Creates a client with the default poller and the dashboard schema.
    pub fn new(service: Arc<dyn QueryService>, context: QueryContext) -> Self {
        Self {
            service,
            context,
            poller: ExecutionPoller::default(),
            decoder: ResultDecoder::new(CoercionSchema::dashboard()),
        }
    }

    /// Creates a client using the service and polling sections of `config`.
    pub fn from_config(service: Arc<dyn QueryService>, config: &Config) -> Self {
        Self::new(service, QueryContext::from(&config.service))
            .with_poller(ExecutionPoller::from_config(&config.polling))
    }

    pub fn with_poller(mut self, poller: ExecutionPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_decoder(mut self, decoder: ResultDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    /// Runs `sql` and returns its decoded records.
    pub async fn run(&self, sql: &str) -> Result<Vec<Record>, QueryError> {
        self.run_with_cancel(sql, &CancellationToken::new())
            .await
            .map(|outcome| outcome.records)
    }

    /// Runs `sql`, abandoning the status loop or the fetch if `cancel` fires.
    ///
    /// A cancelled run stops issuing service calls; the service-side
    /// execution is left to finish on its own.
    pub async fn run_with_cancel(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, QueryError> {
        let start = Instant::now();
        let mut tracker = RunTracker::new(sql);

        let execution = self
            .service
            .submit(sql, &self.context)
            .await
            .map_err(|e| tracker.fail(QueryError::Submission(e.to_string())))?;
        info!(
            "Submitted execution {} to {}/{}",
            execution, self.context.database, self.context.workgroup
        );

        tracker.advance(RunPhase::Polling);
        let summary = self
            .poller
            .await_completion(self.service.as_ref(), &execution, cancel)
            .await
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(RunPhase::Succeeded);

        tracker.advance(RunPhase::Fetching);
        let raw = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Abandoned fetch for {} after cancellation", execution);
                return Err(tracker.fail(QueryError::Cancelled));
            }
            fetched = self.service.get_results(&execution) => {
                fetched.map_err(|e| tracker.fail(QueryError::Fetch(e.to_string())))?
            }
        };

        let decoded = self.decoder.decode_result_set(&raw, true);
        tracker.advance(RunPhase::Decoded);

        let elapsed = start.elapsed();
        info!(
            "Execution {} decoded {} records in {:?} ({} status checks, {} rows skipped)",
            execution,
            decoded.records.len(),
            elapsed,
            summary.status_checks,
            decoded.anomalies.len()
        );

        Ok(RunOutcome {
            records: decoded.records,
            execution,
            elapsed,
            status_checks: summary.status_checks,
            skipped_rows: decoded.anomalies.len(),
        })
    }
}
