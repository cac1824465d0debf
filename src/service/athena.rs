//! Athena query service client.
//!
//! Speaks the Athena JSON protocol (`application/x-amz-json-1.1` with an
//! `X-Amz-Target` header per operation) over reqwest. Requests are not
//! signed; the endpoint is expected to accept them as configured.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use super::{
    ExecutionHandle, ExecutionStatus, QueryContext, QueryService, RawResultSet, RawRow,
};
use crate::config::ServiceConfig;
use crate::error::{DashError, Result, ServiceError};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Target prefix for every Athena operation.
const TARGET_PREFIX: &str = "AmazonAthena";

/// Content type of the Athena JSON protocol.
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Athena client configuration.
#[derive(Debug, Clone)]
pub struct AthenaConfig {
    /// Endpoint receiving the JSON protocol requests.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl AthenaConfig {
    /// Creates a new config for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl From<&ServiceConfig> for AthenaConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self::new(config.endpoint_url()).with_timeout(config.request_timeout_secs)
    }
}

/// Athena query service client.
#[derive(Debug, Clone)]
pub struct AthenaClient {
    config: AthenaConfig,
    client: Client,
}

impl AthenaClient {
    /// Creates a new Athena client with the given configuration.
    pub fn new(config: AthenaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DashError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Sends one operation and decodes its JSON response.
    async fn call<Req, Resp>(
        &self,
        operation: &str,
        request: &Req,
    ) -> std::result::Result<Resp, ServiceError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        debug!("Athena request: {}", operation);

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::new(format!("{operation} request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::new(format!("Failed to read {operation} response: {e}")))?;

        if !status.is_success() {
            return Err(Self::parse_error(operation, status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ServiceError::new(format!("Failed to parse {operation} response: {e}")))
    }

    /// Turns a non-2xx response into a service error, preferring the
    /// service's own message when the body carries one.
    fn parse_error(operation: &str, status: reqwest::StatusCode, body: &str) -> ServiceError {
        if let Ok(error) = serde_json::from_str::<AthenaErrorResponse>(body) {
            let error_type = error
                .error_type
                .as_deref()
                .map(|t| t.rsplit('#').next().unwrap_or(t))
                .unwrap_or("UnknownError");
            if let Some(message) = error.message {
                return ServiceError::new(format!("{error_type}: {message}"));
            }
            return ServiceError::new(format!("{operation} failed ({status}): {error_type}"));
        }

        ServiceError::new(format!("{operation} failed ({status}): {body}"))
    }
}

#[async_trait]
impl QueryService for AthenaClient {
    async fn submit(
        &self,
        sql: &str,
        context: &QueryContext,
    ) -> std::result::Result<ExecutionHandle, ServiceError> {
        let request = StartQueryExecutionRequest {
            query_string: sql,
            query_execution_context: ExecutionContext {
                database: &context.database,
            },
            work_group: &context.workgroup,
            result_configuration: context
                .output_location
                .as_deref()
                .map(|location| ResultConfiguration {
                    output_location: location,
                }),
        };

        let response: StartQueryExecutionResponse =
            self.call("StartQueryExecution", &request).await?;
        Ok(ExecutionHandle::new(response.query_execution_id))
    }

    async fn get_status(
        &self,
        handle: &ExecutionHandle,
    ) -> std::result::Result<ExecutionStatus, ServiceError> {
        let request = ExecutionIdRequest {
            query_execution_id: handle.as_str(),
            next_token: None,
        };

        let response: GetQueryExecutionResponse =
            self.call("GetQueryExecution", &request).await?;
        let status = response.query_execution.status;
        Ok(ExecutionStatus {
            state: status.state.parse()?,
            reason: status.state_change_reason,
        })
    }

    async fn get_results(
        &self,
        handle: &ExecutionHandle,
    ) -> std::result::Result<RawResultSet, ServiceError> {
        let mut result = RawResultSet::default();
        let mut next_token: Option<String> = None;
        let mut seen_tokens: HashSet<String> = HashSet::new();
        let mut page = 0usize;

        loop {
            let request = ExecutionIdRequest {
                query_execution_id: handle.as_str(),
                next_token: next_token.as_deref(),
            };
            let response: GetQueryResultsResponse =
                self.call("GetQueryResults", &request).await?;
            page += 1;

            if page == 1 {
                result.columns = response.result_set.column_names();
            }
            result.rows.extend(response.result_set.into_rows());

            match response.next_token {
                Some(token) if !token.is_empty() => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(ServiceError::new(format!(
                            "Pagination token '{token}' repeated after {page} page(s) for {handle}"
                        )));
                    }
                    next_token = Some(token);
                }
                _ => break,
            }
        }

        debug!(
            "Fetched {} raw rows in {} page(s) for {}",
            result.rows.len(),
            page,
            handle
        );
        Ok(result)
    }
}

// Athena JSON protocol types

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionRequest<'a> {
    query_string: &'a str,
    query_execution_context: ExecutionContext<'a>,
    work_group: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_configuration: Option<ResultConfiguration<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExecutionContext<'a> {
    database: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResultConfiguration<'a> {
    output_location: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExecutionIdRequest<'a> {
    query_execution_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionResponse {
    query_execution_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionResponse {
    query_execution: QueryExecution,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecution {
    status: QueryExecutionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionStatus {
    state: String,
    state_change_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryResultsResponse {
    result_set: ResultSet,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultSet {
    #[serde(default)]
    rows: Vec<ResultRow>,
    result_set_metadata: Option<ResultSetMetadata>,
}

impl ResultSet {
    fn column_names(&self) -> Vec<String> {
        self.result_set_metadata
            .as_ref()
            .map(|meta| meta.column_info.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    fn into_rows(self) -> Vec<RawRow> {
        self.rows
            .into_iter()
            .map(|row| row.data.into_iter().map(|d| d.var_char_value).collect())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultSetMetadata {
    #[serde(default)]
    column_info: Vec<ColumnInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ColumnInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultRow {
    #[serde(default)]
    data: Vec<Datum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Datum {
    var_char_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AthenaErrorResponse {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}
