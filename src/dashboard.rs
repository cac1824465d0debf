//! The dashboard's fixed queries.
//!
//! The dashboard reads two result sets: the cleaned listings table and a
//! per-owner mileage aggregation. Each is a fixed SQL string; failures are
//! reported as a single error body carrying a per-query prefix.

use std::fmt;
use std::str::FromStr;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;
use crate::query::{QueryClient, Record};

/// Table both queries read, resolved in the configured database.
const LISTINGS_TABLE: &str = "silver-layer-silver";

/// Catalog the configured database lives in.
const CATALOG: &str = "AwsDataCatalog";

/// One of the dashboard's read-only queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardQuery {
    /// Listing rows, capped at 500.
    Cars,
    /// Average kilometres driven per owner category.
    OwnerStats,
}

impl DashboardQuery {
    pub const ALL: [DashboardQuery; 2] = [Self::Cars, Self::OwnerStats];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cars => "cars",
            Self::OwnerStats => "owner-stats",
        }
    }

    /// SQL text for this query against the listings table in `database`.
    pub fn sql(&self, database: &str) -> String {
        let table = format!(r#""{CATALOG}"."{database}"."{LISTINGS_TABLE}""#);
        match self {
            Self::Cars => format!("SELECT * FROM {table} LIMIT 500"),
            Self::OwnerStats => format!(
                "SELECT owner, AVG(km_driven) as avg_km FROM {table} GROUP BY owner ORDER BY avg_km DESC"
            ),
        }
    }

    /// Prefix put in front of the error message returned to the front end.
    pub fn error_prefix(&self) -> &'static str {
        match self {
            Self::Cars => "Failed to query Athena",
            Self::OwnerStats => "Failed to query owner stats",
        }
    }

    /// Runs this query through `client`.
    pub async fn run(
        &self,
        client: &QueryClient,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, QueryError> {
        let sql = self.sql(&client.context().database);
        client
            .run_with_cancel(&sql, cancel)
            .await
            .map(|outcome| outcome.records)
    }
}

impl fmt::Display for DashboardQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DashboardQuery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cars" => Ok(Self::Cars),
            "owner-stats" | "owner_stats" => Ok(Self::OwnerStats),
            _ => Err(format!(
                "Unknown dashboard query: {s}. Expected: cars or owner-stats"
            )),
        }
    }
}

/// JSON error payload handed back in place of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn for_query(query: DashboardQuery, error: &QueryError) -> Self {
        Self {
            error: format!("{}: {}", query.error_prefix(), error.message()),
        }
    }
}

/// Runs several dashboard queries concurrently, preserving input order.
pub async fn run_all(
    client: &QueryClient,
    queries: &[DashboardQuery],
    cancel: &CancellationToken,
) -> Vec<(DashboardQuery, Result<Vec<Record>, QueryError>)> {
    let runs = queries.iter().map(|query| async move {
        let result = query.run(client, cancel).await;
        (*query, result)
    });
    join_all(runs).await
}

/// Builds the JSON response for finished dashboard queries.
///
/// A single query renders as its record array, or its error body. Several
/// render as an object keyed by query name. The flag is false when any
/// query failed.
pub fn render_response(
    results: Vec<(DashboardQuery, Result<Vec<Record>, QueryError>)>,
) -> Result<(JsonValue, bool), serde_json::Error> {
    let single = results.len() == 1;
    let mut all_ok = true;
    let mut rendered = serde_json::Map::new();

    for (query, result) in results {
        let value = match result {
            Ok(records) => serde_json::to_value(records)?,
            Err(error) => {
                all_ok = false;
                serde_json::to_value(ErrorBody::for_query(query, &error))?
            }
        };
        if single {
            return Ok((value, all_ok));
        }
        rendered.insert(query.as_str().to_string(), value);
    }

    Ok((JsonValue::Object(rendered), all_ok))
}
