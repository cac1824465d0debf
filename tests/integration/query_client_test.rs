//! Query client integration tests against the scripted mock service.

use std::sync::Arc;
use std::time::Duration;

use market_dash::config::{Config, PollingConfig};
use market_dash::dashboard::{self, DashboardQuery, ErrorBody};
use market_dash::error::{QueryError, QueryErrorKind};
use market_dash::query::{
    CoercionSchema, ColumnType, ExecutionPoller, QueryClient, ResultDecoder, RunPhase, Value,
};
use market_dash::service::{
    ExecutionState, ExecutionStatus, MockQueryService, QueryContext, RawResultSet,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn fast_config() -> Config {
    Config {
        polling: PollingConfig {
            interval_ms: 500,
            max_wait_secs: 10,
        },
        ..Default::default()
    }
}

fn raw(columns: &[&str], rows: &[&[Option<&str>]]) -> RawResultSet {
    RawResultSet::new(
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|c| c.map(str::to_string)).collect())
            .collect(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_cars_through_mock() {
    let service = MockQueryService::with_sample_data();
    let calls = service.calls();
    let client = QueryClient::from_config(Arc::new(service), &fast_config());

    let records = DashboardQuery::Cars
        .run(&client, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 4);
    assert_eq!(
        records[0].get("name"),
        Some(&Value::from("Maruti Swift Dzire VDI"))
    );
    assert_eq!(records[0].get("selling_price"), Some(&Value::Int(450000)));
    assert_eq!(records[0].get("fuel"), Some(&Value::from("Diesel")));
    assert_eq!(calls.status_checks(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_success_reported_once_after_last_transient() {
    let states = [
        ExecutionState::Queued,
        ExecutionState::Running,
        ExecutionState::Running,
        ExecutionState::Running,
        ExecutionState::Succeeded,
    ];
    let service = MockQueryService::new().with_states(&states);
    let calls = service.calls();
    let client = QueryClient::from_config(Arc::new(service), &fast_config());

    let outcome = client
        .run_with_cancel("SELECT 1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status_checks, states.len());
    assert_eq!(calls.status_checks(), states.len());
    assert_eq!(calls.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_never_reports_execution_failure() {
    let service = MockQueryService::new().with_states(&[ExecutionState::Running]);
    let client = QueryClient::from_config(Arc::new(service), &fast_config());

    let err = client.run("SELECT slow()").await.unwrap_err();

    assert_eq!(err.kind(), QueryErrorKind::Timeout);
    assert_ne!(err.kind(), QueryErrorKind::ExecutionFailed);
    assert_eq!(RunPhase::for_error(&err), RunPhase::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_poll_stops_status_queries() {
    let service = MockQueryService::new().with_states(&[ExecutionState::Running]);
    let calls = service.calls();
    let client = QueryClient::from_config(Arc::new(service), &fast_config());
    let cancel = CancellationToken::new();

    let run = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { client.run_with_cancel("SELECT 1", &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(1200)).await;
    cancel.cancel();
    let err = run.await.unwrap().unwrap_err();

    assert_eq!(err, QueryError::Cancelled);
    let checks = calls.status_checks();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls.status_checks(), checks);
    assert_eq!(calls.fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_service_cancelled_state_maps_to_execution_failed() {
    let service = MockQueryService::new().with_script(vec![ExecutionStatus::with_reason(
        ExecutionState::Cancelled,
        "Query cancelled by workgroup limit",
    )]);
    let client = QueryClient::from_config(Arc::new(service), &fast_config());

    let err = client.run("SELECT 1").await.unwrap_err();

    assert_eq!(err.kind(), QueryErrorKind::ExecutionFailed);
    assert_eq!(
        ErrorBody::for_query(DashboardQuery::Cars, &err).error,
        "Failed to query Athena: Query CANCELLED: Query cancelled by workgroup limit"
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_rows_do_not_fail_the_run() {
    let service = MockQueryService::new().with_default_result(raw(
        &["owner", "avg_km"],
        &[
            &[Some("owner"), Some("avg_km")],
            &[Some("First Owner"), Some("58916.17")],
            &[Some("Second Owner")],
            &[Some("Test Drive Car"), Some("")],
        ],
    ));
    let client = QueryClient::from_config(Arc::new(service), &fast_config());

    let outcome = client
        .run_with_cancel("SELECT owner, avg_km FROM stats", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.skipped_rows, 1);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].get("avg_km"), Some(&Value::Int(58916)));
    assert_eq!(outcome.records[1].get("avg_km"), Some(&Value::Null));
}

#[tokio::test(start_paused = true)]
async fn test_custom_decoder_schema() {
    let service = MockQueryService::new().with_default_result(raw(
        &["id", "year"],
        &[&[Some("id"), Some("year")], &[Some("42"), Some("2019")]],
    ));
    let client = QueryClient::new(Arc::new(service), QueryContext::new("db", "primary"))
        .with_poller(ExecutionPoller::new(
            Duration::from_millis(100),
            Duration::from_secs(1),
        ))
        .with_decoder(ResultDecoder::new(
            CoercionSchema::new().with_column("id", ColumnType::Integer),
        ));

    let records = client.run("SELECT id, year FROM t").await.unwrap();

    assert_eq!(records[0].get("id"), Some(&Value::Int(42)));
    assert_eq!(records[0].get("year"), Some(&Value::from("2019")));
}

#[tokio::test(start_paused = true)]
async fn test_run_all_renders_combined_response() {
    let client = QueryClient::from_config(
        Arc::new(MockQueryService::with_sample_data()),
        &fast_config(),
    );

    let results =
        dashboard::run_all(&client, &DashboardQuery::ALL, &CancellationToken::new()).await;
    let (json, ok) = dashboard::render_response(results).unwrap();

    assert!(ok);
    assert_eq!(json["cars"].as_array().map(Vec::len), Some(4));
    assert_eq!(
        json["owner-stats"][0],
        serde_json::json!({ "owner": "Fourth & Above Owner", "avg_km": 101502 })
    );
}
