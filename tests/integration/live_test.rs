//! Live query service test.
//!
//! Runs the owner-stats query against a real endpoint. Set ATHENA_ENDPOINT
//! (plus ATHENA_DATABASE / ATHENA_WORKGROUP as needed) to enable it.

use market_dash::config::Config;
use market_dash::dashboard::DashboardQuery;
use market_dash::query::QueryClient;
use market_dash::service;
use tokio_util::sync::CancellationToken;

/// Helper to create a client for the configured endpoint.
fn get_live_client() -> Option<QueryClient> {
    std::env::var("ATHENA_ENDPOINT").ok()?;
    let mut config = Config::default();
    config.service.apply_env();
    config.validate().ok()?;
    let service = service::connect(&config.service, false).ok()?;
    Some(QueryClient::from_config(service, &config))
}

#[tokio::test]
async fn test_live_owner_stats() {
    let Some(client) = get_live_client() else {
        eprintln!("Skipping test: ATHENA_ENDPOINT not set");
        return;
    };

    let records = DashboardQuery::OwnerStats
        .run(&client, &CancellationToken::new())
        .await
        .unwrap();

    for record in &records {
        assert!(record.get("owner").is_some());
        let avg_km = record.get("avg_km").expect("avg_km column");
        assert!(avg_km.is_null() || avg_km.as_int().is_some());
    }
}
