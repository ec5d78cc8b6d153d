#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use quicknotes_api::config::{BlockfrostConfig, ServerConfig};
use quicknotes_api::router::build_app_router;
use quicknotes_api::state::AppState;
use quicknotes_cardano::testing::{test_address, test_tx_hash, SimulatedIndexer};
use quicknotes_cardano::Utxo;
use quicknotes_db::MemoryNoteStore;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        confirmation_poll_secs: 30,
        tx_ttl_slots: 2000,
        in_flight_timeout_secs: 2400,
        blockfrost: BlockfrostConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            project_id: "test".to_string(),
        },
    }
}

/// The router plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryNoteStore>,
    pub indexer: Arc<SimulatedIndexer>,
}

/// Build the full application router (same middleware stack as `main.rs`)
/// over an in-memory store and a simulated indexer. The default test
/// address holds one 5 ADA UTXO.
pub fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryNoteStore::new());
    let indexer = Arc::new(SimulatedIndexer::new().with_utxos(
        &test_address(),
        vec![Utxo {
            tx_hash: test_tx_hash(0xab),
            output_index: 0,
            lovelace: 5_000_000,
        }],
    ));
    let config = test_config();
    let state = AppState::new(store.clone(), indexer.clone(), config.clone());
    TestApp {
        router: build_app_router(state, &config),
        store,
        indexer,
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
