//! Mock query service for testing.
//!
//! Replays a scripted sequence of execution statuses for every submitted
//! query and returns canned result sets chosen by SQL pattern. Call counts
//! are recorded so tests can assert how often the service was hit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    ExecutionHandle, ExecutionState, ExecutionStatus, QueryContext, QueryService, RawResultSet,
};
use crate::error::ServiceError;

/// Counters of calls made against a [`MockQueryService`].
#[derive(Debug, Default)]
pub struct ServiceCalls {
    submits: AtomicUsize,
    status_checks: AtomicUsize,
    fetches: AtomicUsize,
}

impl ServiceCalls {
    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

/// Per-execution progress through the status script.
#[derive(Debug)]
struct MockExecution {
    cursor: usize,
    result: RawResultSet,
}

/// A scripted, in-memory query service.
///
/// Each submitted execution walks the status script independently; once the
/// script is exhausted its last status repeats forever.
#[derive(Debug)]
pub struct MockQueryService {
    script: Vec<ExecutionStatus>,
    results: Vec<(String, RawResultSet)>,
    default_result: RawResultSet,
    submit_error: Option<String>,
    status_error: Option<String>,
    fetch_error: Option<String>,
    status_latency: Duration,
    fetch_latency: Duration,
    executions: Mutex<HashMap<ExecutionHandle, MockExecution>>,
    next_id: AtomicUsize,
    calls: Arc<ServiceCalls>,
}

impl Default for MockQueryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockQueryService {
    /// Creates a mock whose executions succeed on the first status check
    /// and return an empty result set.
    pub fn new() -> Self {
        Self {
            script: vec![ExecutionStatus::new(ExecutionState::Succeeded)],
            results: Vec::new(),
            default_result: RawResultSet::default(),
            submit_error: None,
            status_error: None,
            fetch_error: None,
            status_latency: Duration::ZERO,
            fetch_latency: Duration::ZERO,
            executions: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            calls: Arc::new(ServiceCalls::default()),
        }
    }

    /// Creates a mock serving a small sample of the dashboard tables.
    pub fn with_sample_data() -> Self {
        Self::new()
            .with_states(&[
                ExecutionState::Queued,
                ExecutionState::Running,
                ExecutionState::Succeeded,
            ])
            .with_result_for("group by owner", sample_owner_stats())
            .with_default_result(sample_cars())
    }

    /// Sets the status sequence every execution walks through.
    pub fn with_script(mut self, script: Vec<ExecutionStatus>) -> Self {
        if !script.is_empty() {
            self.script = script;
        }
        self
    }

    /// Sets a status sequence made of bare states.
    pub fn with_states(self, states: &[ExecutionState]) -> Self {
        let script = states.iter().copied().map(ExecutionStatus::new).collect();
        self.with_script(script)
    }

    /// Returns `result` for queries whose SQL contains `pattern` (case-insensitive).
    pub fn with_result_for(mut self, pattern: impl Into<String>, result: RawResultSet) -> Self {
        self.results.push((pattern.into().to_lowercase(), result));
        self
    }

    /// Returns `result` for queries matching no pattern.
    pub fn with_default_result(mut self, result: RawResultSet) -> Self {
        self.default_result = result;
        self
    }

    /// Makes every submission fail with `message`.
    pub fn failing_submit(mut self, message: impl Into<String>) -> Self {
        self.submit_error = Some(message.into());
        self
    }

    /// Makes every status check fail with `message`.
    pub fn failing_status(mut self, message: impl Into<String>) -> Self {
        self.status_error = Some(message.into());
        self
    }

    /// Makes every result fetch fail with `message`.
    pub fn failing_fetch(mut self, message: impl Into<String>) -> Self {
        self.fetch_error = Some(message.into());
        self
    }

    /// Delays every status response by `latency`.
    pub fn with_status_latency(mut self, latency: Duration) -> Self {
        self.status_latency = latency;
        self
    }

    /// Delays every result fetch by `latency`.
    pub fn with_fetch_latency(mut self, latency: Duration) -> Self {
        self.fetch_latency = latency;
        self
    }

    /// Shared call counters, readable after the mock has been moved into a client.
    pub fn calls(&self) -> Arc<ServiceCalls> {
        Arc::clone(&self.calls)
    }

    fn result_for(&self, sql: &str) -> RawResultSet {
        let sql_lower = sql.to_lowercase();
        self.results
            .iter()
            .find(|(pattern, _)| sql_lower.contains(pattern))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| self.default_result.clone())
    }

    fn executions(
        &self,
    ) -> std::result::Result<
        std::sync::MutexGuard<'_, HashMap<ExecutionHandle, MockExecution>>,
        ServiceError,
    > {
        self.executions
            .lock()
            .map_err(|_| ServiceError::new("mock execution table poisoned"))
    }
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn submit(
        &self,
        sql: &str,
        _context: &QueryContext,
    ) -> std::result::Result<ExecutionHandle, ServiceError> {
        self.calls.submits.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.submit_error {
            return Err(ServiceError::new(message.clone()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = ExecutionHandle::new(format!("mock-exec-{id}"));
        self.executions()?.insert(
            handle.clone(),
            MockExecution {
                cursor: 0,
                result: self.result_for(sql),
            },
        );
        Ok(handle)
    }

    async fn get_status(
        &self,
        handle: &ExecutionHandle,
    ) -> std::result::Result<ExecutionStatus, ServiceError> {
        self.calls.status_checks.fetch_add(1, Ordering::SeqCst);
        if !self.status_latency.is_zero() {
            tokio::time::sleep(self.status_latency).await;
        }
        if let Some(message) = &self.status_error {
            return Err(ServiceError::new(message.clone()));
        }

        let mut executions = self.executions()?;
        let execution = executions
            .get_mut(handle)
            .ok_or_else(|| ServiceError::new(format!("Unknown execution '{handle}'")))?;
        let index = execution.cursor.min(self.script.len() - 1);
        execution.cursor += 1;
        Ok(self.script[index].clone())
    }

    async fn get_results(
        &self,
        handle: &ExecutionHandle,
    ) -> std::result::Result<RawResultSet, ServiceError> {
        self.calls.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_latency.is_zero() {
            tokio::time::sleep(self.fetch_latency).await;
        }
        if let Some(message) = &self.fetch_error {
            return Err(ServiceError::new(message.clone()));
        }

        self.executions()?
            .get(handle)
            .map(|execution| execution.result.clone())
            .ok_or_else(|| ServiceError::new(format!("Unknown execution '{handle}'")))
    }
}

fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
    values.iter().map(|v| v.map(str::to_string)).collect()
}

fn header(columns: &[&str]) -> Vec<Option<String>> {
    columns.iter().map(|c| Some(c.to_string())).collect()
}

/// Sample rows shaped like the cleaned listings table.
pub(crate) fn sample_cars() -> RawResultSet {
    let columns = [
        "name",
        "year",
        "selling_price",
        "km_driven",
        "fuel",
        "seller_type",
        "transmission",
        "owner",
    ];
    RawResultSet::new(
        columns.iter().map(|c| c.to_string()).collect(),
        vec![
            header(&columns),
            cells(&[
                Some("Maruti Swift Dzire VDI"),
                Some("2014"),
                Some("450000"),
                Some("145500"),
                Some("Diesel"),
                Some("Individual"),
                Some("Manual"),
                Some("First Owner"),
            ]),
            cells(&[
                Some("Honda City 2017-2020 EXi"),
                Some("2006"),
                Some("158000"),
                Some("140000"),
                Some("Petrol"),
                Some("Individual"),
                Some("Manual"),
                Some("Third Owner"),
            ]),
            cells(&[
                Some("Hyundai i20 Sportz Diesel"),
                Some("2010"),
                Some("225000"),
                Some("127000"),
                Some("Diesel"),
                Some("Dealer"),
                Some("Manual"),
                Some("First Owner"),
            ]),
            cells(&[
                Some("Toyota Fortuner 4x2 AT"),
                Some("2017"),
                Some("2700000"),
                None,
                Some("Diesel"),
                Some("Dealer"),
                Some("Automatic"),
                Some("Second Owner"),
            ]),
        ],
    )
}

/// Sample rows shaped like the per-owner mileage aggregation.
pub(crate) fn sample_owner_stats() -> RawResultSet {
    let columns = ["owner", "avg_km"];
    RawResultSet::new(
        columns.iter().map(|c| c.to_string()).collect(),
        vec![
            header(&columns),
            cells(&[Some("Fourth & Above Owner"), Some("101502.86")]),
            cells(&[Some("Third Owner"), Some("93178.41")]),
            cells(&[Some("Second Owner"), Some("80042.52")]),
            cells(&[Some("First Owner"), Some("58916.17")]),
        ],
    )
}
