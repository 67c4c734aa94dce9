// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP surface tests over in-memory backends.
//!
//! Run with: `cargo test --test api`

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use catalog_sync::api;
use catalog_sync::index::MemoryIndex;
use catalog_sync::product::demo_catalog;
use catalog_sync::storage::memory::MemoryRecordStore;
use catalog_sync::{CatalogConfig, CatalogEngine, IndexBackendKind};

async fn started_app() -> (Router, Arc<CatalogEngine>) {
    let config = CatalogConfig {
        index_backend: IndexBackendKind::Memory,
        ..Default::default()
    };
    let engine = Arc::new(CatalogEngine::new(
        config,
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryIndex::new()),
    ));
    engine.start().await.unwrap();
    (api::router(engine.clone()), engine)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_search_defaults_to_index_and_returns_scores() {
    let (app, _) = started_app().await;
    let (status, body) = get(&app, "/api/search?query=headphones").await;

    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["title"], "Wireless Headphones");
    assert!(results.iter().all(|r| r["score"].is_number()));
}

#[tokio::test]
async fn test_search_sql_backend_is_unscored_and_rating_ordered() {
    let (app, _) = started_app().await;
    let (status, body) = get(&app, "/api/search?query=e&backend=sql").await;

    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert!(results.len() > 1);
    assert!(results.iter().all(|r| r.get("score").is_none()));
    let ratings: Vec<f64> = results.iter().map(|r| r["rating"].as_f64().unwrap()).collect();
    assert!(ratings.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_search_tolerates_typos_on_index_only() {
    let (app, _) = started_app().await;

    let (_, fuzzy) = get(&app, "/api/search?query=hedphones&backend=index").await;
    assert!(fuzzy.as_array().unwrap().iter().any(|r| r["title"] == "Wireless Headphones"));

    let (_, exact) = get(&app, "/api/search?query=hedphones&backend=sql").await;
    assert!(exact.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_query_is_bad_request() {
    let (app, _) = started_app().await;

    for uri in ["/api/search", "/api/search?query=", "/api/search?query=%20%20"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["kind"], "InvalidQuery");
    }
}

#[tokio::test]
async fn test_unknown_backend_is_bad_request() {
    let (app, _) = started_app().await;
    let (status, body) = get(&app, "/api/search?query=camera&backend=oracle").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("oracle"));
}

#[tokio::test]
async fn test_malformed_query_string_gets_json_error() {
    let (app, _) = started_app().await;
    let (status, body) = get(&app, "/api/search?query=camera&query=lens").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidQuery");
    assert!(body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn test_reindex_reports_success() {
    let (app, _) = started_app().await;
    let (status, body) = get(&app, "/api/reindex").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Products successfully reindexed");
    assert_eq!(body["indexed"], 20);
}

#[tokio::test]
async fn test_health_passes_cluster_payload_through() {
    let (app, _) = started_app().await;

    for uri in ["/api/health", "/api/es-health"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "green");
    }
}

#[tokio::test]
async fn test_products_lists_record_store() {
    let (app, _) = started_app().await;

    let (status, body) = get(&app, "/api/products").await;
    assert_eq!(status, StatusCode::OK);
    let products = body.as_array().unwrap();
    assert_eq!(products.len(), demo_catalog().len());
    assert_eq!(products[0]["id"], 1);

    let (status, alias) = get(&app, "/api/check-sqlite").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alias, body);
}

#[tokio::test]
async fn test_status_reports_ready_and_last_run() {
    let (app, _) = started_app().await;
    let (status, body) = get(&app, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "Ready");
    assert_eq!(body["index_backend"], "memory");
    assert_eq!(body["sync"]["index_name"], "products");
    assert_eq!(body["sync"]["last_run"]["outcome"], "succeeded");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = started_app().await;
    let (status, _) = get(&app, "/search?query=x").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
