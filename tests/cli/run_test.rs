//! End-to-end runs of the binary with the mock service.

use super::common::{run_cli, FAST_MOCK};
use serde_json::Value as JsonValue;

fn with_fast_mock<'a>(extra: &[&'a str]) -> Vec<&'a str> {
    let mut args: Vec<&str> = FAST_MOCK.to_vec();
    args.extend_from_slice(extra);
    args
}

#[test]
fn test_cars_prints_record_array() {
    let (code, stdout, stderr) = run_cli(&with_fast_mock(&["cars"]));
    assert_eq!(code, 0, "stderr: {stderr}");

    let json: JsonValue = serde_json::from_str(stdout.trim()).unwrap();
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["year"], serde_json::json!(2014));
    assert_eq!(records[3]["km_driven"], JsonValue::Null);
}

#[test]
fn test_owner_stats_pretty() {
    let (code, stdout, _) = run_cli(&with_fast_mock(&["owner-stats", "--pretty"]));
    assert_eq!(code, 0);
    assert!(stdout.contains("\n"));

    let json: JsonValue = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json[1]["owner"], serde_json::json!("Third Owner"));
    assert_eq!(json[1]["avg_km"], serde_json::json!(93178));
}

#[test]
fn test_all_prints_keyed_object() {
    let (code, stdout, _) = run_cli(&with_fast_mock(&["all"]));
    assert_eq!(code, 0);

    let json: JsonValue = serde_json::from_str(stdout.trim()).unwrap();
    assert!(json["cars"].is_array());
    assert!(json["owner-stats"].is_array());
}

#[test]
fn test_timeout_prints_error_body() {
    // Sample executions succeed on the third check; the budget covers two.
    let (code, stdout, _) = run_cli(&[
        "--mock",
        "--poll-interval-ms",
        "1000",
        "--max-wait-secs",
        "1",
        "owner-stats",
    ]);
    assert_eq!(code, 1);

    let json: JsonValue = serde_json::from_str(stdout.trim()).unwrap();
    let error = json["error"].as_str().unwrap();
    assert!(error.starts_with("Failed to query owner stats: Query timed out"));
}

#[test]
fn test_invalid_config_fails_before_running() {
    let (code, stdout, stderr) = run_cli(&with_fast_mock(&["--endpoint", "ftp://nowhere"]));
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Invalid endpoint scheme"));
}

#[test]
fn test_unknown_query_is_rejected() {
    let (code, _, stderr) = run_cli(&["--mock", "trucks"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid query"));
}
