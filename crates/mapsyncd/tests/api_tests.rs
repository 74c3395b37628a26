//! Integration tests for mapsyncd API endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Location list served through the cache gate
//! - Upstream failure mapped to 502 with the JSON error body
//! - Map page rendering

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use mapsync_core::config::{MapConfig, MapSyncConfig, SourceConfig};
use mapsync_core::error::{Error, Result};
use mapsync_core::traits::{RawRecord, RawResponse, SourceClient};
use mapsync_core::{CacheGate, MemoryRecordStore, SyncEngine};
use mapsyncd::{AppState, build_router};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// A source answering with fixed records, or refusing every request
struct FixedSource {
    records: Option<Vec<RawRecord>>,
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceClient for FixedSource {
    async fn fetch_raw(&self) -> Result<RawResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.records {
            Some(records) => Ok(RawResponse::new(records.clone())),
            None => Err(Error::upstream("db-1", 401, "unauthorized")),
        }
    }

    fn source_id(&self) -> &str {
        "db-1"
    }

    fn client_name(&self) -> &'static str {
        "fixed"
    }
}

fn record(id: &str, name: &str, status: &str) -> RawRecord {
    let properties = json!({
        "Name": { "type": "title", "title": [{ "plain_text": name }] },
        "Latitude": { "type": "number", "number": 24.7 },
        "Longitude": { "type": "number", "number": 46.6 },
        "Status": { "type": "select", "select": { "name": status, "color": "green" } },
        "Area": { "type": "number", "number": 100.0 }
    });
    RawRecord {
        id: id.to_string(),
        last_edited_time: "2024-04-01T00:00:00.000Z".to_string(),
        properties: properties.as_object().cloned().unwrap(),
    }
}

/// Test helper: Create app over one source
fn setup_app(records: Option<Vec<RawRecord>>, map: MapConfig) -> (axum::Router, Arc<AtomicUsize>) {
    let fetches = Arc::new(AtomicUsize::new(0));
    let source = FixedSource {
        records,
        fetches: Arc::clone(&fetches),
    };

    let config = MapSyncConfig::new().with_source(SourceConfig::Custom {
        factory: "fixed".to_string(),
        id: "db-1".to_string(),
        config: Value::Null,
    });
    let (engine, _events) = SyncEngine::new(
        vec![Box::new(source)],
        Arc::new(MemoryRecordStore::new()),
        &config,
    )
    .unwrap();
    let gate = CacheGate::new(engine, config.cache.ttl(), Duration::from_secs(5));

    (build_router(AppState::new(gate, &map)), fetches)
}

/// Test helper: Create request
fn test_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Extract body bytes
async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).expect("Should parse JSON")
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, fetches) = setup_app(Some(Vec::new()), MapConfig::default());

    let response = app.oneshot(test_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "mapsyncd");
    assert!(body["version"].is_string());
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_locations_served_and_cached() {
    let (app, fetches) = setup_app(
        Some(vec![
            record("p1", "Warehouse", "Signed"),
            record("p2", "Lost lead", "Rejected"),
        ]),
        MapConfig::default(),
    );

    let response = app
        .clone()
        .oneshot(test_request("/api/locations"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let locations = body.as_array().expect("array body");
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0]["id"], "p1");
    assert_eq!(locations[0]["name"], "Warehouse");
    assert_eq!(locations[0]["status"]["name"], "Signed");
    assert_eq!(locations[0]["status"]["color"], "green");
    assert_eq!(locations[0]["area"], 100.0);

    // Second request is answered from the snapshot
    let response = app.oneshot(test_request("/api/locations")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await, body);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_upstream_is_empty_array() {
    let (app, _) = setup_app(Some(Vec::new()), MapConfig::default());

    let response = app.oneshot(test_request("/api/locations")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await, json!([]));
}

#[tokio::test]
async fn test_upstream_refusal_is_bad_gateway() {
    let (app, _) = setup_app(None, MapConfig::default());

    let response = app.oneshot(test_request("/api/locations")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UPSTREAM_UNAVAILABLE");
    assert!(body["error"]["message"].as_str().unwrap().contains("db-1"));
}

#[tokio::test]
async fn test_index_page_renders_map_config() {
    let map = MapConfig {
        center: [40.4168, -3.7038],
        zoom: 12,
        name: "Madrid & Co".to_string(),
    };
    let (app, fetches) = setup_app(Some(Vec::new()), map);

    let response = app.oneshot(test_request("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response.into_body()).await).unwrap();
    assert!(html.contains("<title>Madrid &amp; Co</title>"));
    assert!(html.contains("setView([40.4168, -3.7038], 12)"));
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = setup_app(Some(Vec::new()), MapConfig::default());

    let response = app.oneshot(test_request("/api/nothing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
