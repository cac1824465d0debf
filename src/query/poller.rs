//! Execution polling for market-dash.
//!
//! Waits for one submitted execution to reach a terminal state, checking
//! its status no more than once per interval. The wait is bounded by a
//! wall-clock budget and can be abandoned through a cancellation token.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PollingConfig;
use crate::error::QueryError;
use crate::service::{ExecutionHandle, ExecutionStatus, QueryService};

/// How a successful wait went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    /// Status queries issued, the terminal one included.
    pub status_checks: usize,
    /// Time from the first status query to the terminal observation.
    pub elapsed: Duration,
}

/// Polls an execution until it succeeds, fails, or the budget runs out.
///
/// Holds no per-execution state; each `await_completion` call is a fresh
/// loop scoped to one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPoller {
    interval: Duration,
    max_wait: Duration,
}

impl Default for ExecutionPoller {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}

impl ExecutionPoller {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(config.interval(), config.max_wait())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Issues a single status query.
    pub async fn poll(
        &self,
        service: &dyn QueryService,
        handle: &ExecutionHandle,
    ) -> Result<ExecutionStatus, QueryError> {
        service
            .get_status(handle)
            .await
            .map_err(|e| QueryError::Status(e.to_string()))
    }

    /// Waits for `handle` to reach a terminal state.
    ///
    /// Returns on the first SUCCEEDED observation. FAILED and CANCELLED stop
    /// the loop immediately with `ExecutionFailed`. Exceeding the budget
    /// yields `Timeout`; a fired `cancel` token yields `Cancelled`. In every
    /// case no further status queries are issued after return.
    pub async fn await_completion(
        &self,
        service: &dyn QueryService,
        handle: &ExecutionHandle,
        cancel: &CancellationToken,
    ) -> Result<PollSummary, QueryError> {
        let started = Instant::now();

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Stopped polling {} after cancellation", handle);
                Err(QueryError::Cancelled)
            }
            result = tokio::time::timeout(self.max_wait, self.poll_until_terminal(service, handle, started)) => {
                match result {
                    Ok(outcome) => outcome,
                    Err(_) => Err(QueryError::Timeout {
                        waited: started.elapsed(),
                    }),
                }
            }
        }
    }

    async fn poll_until_terminal(
        &self,
        service: &dyn QueryService,
        handle: &ExecutionHandle,
        started: Instant,
    ) -> Result<PollSummary, QueryError> {
        let mut status_checks = 0usize;

        loop {
            let status = self.poll(service, handle).await?;
            status_checks += 1;

            if status.state.is_failure() {
                return Err(QueryError::execution_failed(status.state, status.reason));
            }
            if !status.state.is_transient() {
                return Ok(PollSummary {
                    status_checks,
                    elapsed: started.elapsed(),
                });
            }

            debug!(
                "Execution {} is {} (check {}), next check in {:?}",
                handle, status.state, status_checks, self.interval
            );
            tokio::time::sleep(self.interval).await;
        }
    }
}
