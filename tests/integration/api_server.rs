//! Integration tests for the API Server
//!
//! Tests HTTP endpoints, health checks, metrics, and series endpoints.


use crate::fixtures::harvest_source;
use cropledger::core::scheduler::DataChanged;
use serde_json::{json, Value};
use std::time::Duration;

use test_utils::TestApiServer;

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "cropledger-series-engine");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    let _ = app.server.get("/health").await;

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    for metric in [
        "http_requests_total",
        "http_request_duration_seconds",
        "http_requests_in_flight",
        "refresh_cycles_total",
        "fallback_slices_total",
    ] {
        assert!(body.contains(metric), "Expected {} metric", metric);
    }
    assert!(app.metrics.http_requests_total.get() >= 1);
}

#[tokio::test]
async fn series_endpoint_returns_stacked_rows() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .get("/api/series?dataset=harvests&entities=1&period=month")
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let row = &body["rows"][0];
    assert_eq!(row["bucket_key"], "2024-03");
    assert_eq!(row["serre"], 100.0);
    assert_eq!(row["plein_champ"], 40.0);
    assert_eq!(row["all"], 140.0);
    assert_eq!(body["totals"][0]["derived_metric"], 2.0);
    assert_eq!(body["used_fallback"], false);
    assert_eq!(body["partial_errors"], json!([]));
}

#[tokio::test]
async fn series_endpoint_applies_category_and_range() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .get("/api/series?entities=1,2&period=month&from=2024-03-01&to=2024-03-31&category=plein_champ")
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["rows"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["rows"][0]["serre"], 0.0);
    assert_eq!(body["rows"][0]["plein_champ"], 40.0);
}

#[tokio::test]
async fn series_endpoint_rejects_bad_parameters() {
    let app = TestApiServer::new().await;

    for query in [
        "/api/series?entities=1&period=year",
        "/api/series?entities=one",
        "/api/series?entities=1&from=March",
        "/api/series?entities=1&category=Bad%20Key",
        "/api/series?entities=1&from=2024-05-01&to=2024-04-01",
    ] {
        let response = app.server.get(query).await;
        assert_eq!(response.status_code(), 400, "query {}", query);
        let body: Value = response.json();
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn series_endpoint_unavailable_when_no_entity_resolves() {
    let app = TestApiServer::with_source(harvest_source().failing_entity(1)).await;
    let response = app.server.get("/api/series?entities=1&period=month").await;
    assert_eq!(response.status_code(), 503);

    let body: Value = response.json();
    assert_eq!(body["failed"], json!([1]));
}

#[tokio::test]
async fn partial_failure_is_still_ok() {
    let app = TestApiServer::with_source(harvest_source().failing_entity(2)).await;
    let response = app.server.get("/api/series?entities=1,2&period=month").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["partial_errors"], json!([2]));
}

#[tokio::test]
async fn latest_is_empty_before_any_selection() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/api/series/latest").await;
    assert_eq!(response.status_code(), 204);
}

#[tokio::test]
async fn selection_is_computed_in_background() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .put("/api/selection")
        .json(&json!({"dataset": "harvests", "entities": [1], "period": "month"}))
        .await;
    assert_eq!(response.status_code(), 202);

    let mut latest = None;
    for _ in 0..100 {
        let response = app.server.get("/api/series/latest").await;
        if response.status_code() == 200 {
            latest = Some(response.json::<Value>());
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let body = latest.expect("snapshot published");
    assert_eq!(body["generation"], 1);
    assert_eq!(body["request"]["entities"], json!([1]));
    assert_eq!(body["series"]["totals"][0]["sum_primary"], 140.0);
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn data_changed_reaches_subscribers() {
    let app = TestApiServer::new().await;
    let mut changes = app.notifier.subscribe();

    let response = app
        .server
        .post("/api/data-changed")
        .json(&json!({"dataset": "sales", "entity_id": 5}))
        .await;
    assert_eq!(response.status_code(), 202);

    let body: Value = response.json();
    assert_eq!(body["listeners"], 1);
    let event = changes.recv().await.expect("change event");
    assert_eq!(event.entity_id, Some(5));
}

#[tokio::test]
async fn data_changed_accepts_an_empty_post() {
    let app = TestApiServer::new().await;
    let mut changes = app.notifier.subscribe();

    let response = app.server.post("/api/data-changed").await;
    assert_eq!(response.status_code(), 202);

    let event = changes.recv().await.expect("change event");
    assert_eq!(event, DataChanged::default());
}

#[tokio::test]
async fn each_selection_reports_its_own_generation() {
    let app = TestApiServer::new().await;
    let mut generations = Vec::new();
    for entity in [1, 2] {
        let response = app
            .server
            .put("/api/selection")
            .json(&json!({"dataset": "harvests", "entities": [entity], "period": "month"}))
            .await;
        assert_eq!(response.status_code(), 202);
        generations.push(response.json::<Value>()["generation"].clone());
    }
    assert_eq!(generations, vec![json!(1), json!(2)]);
}
