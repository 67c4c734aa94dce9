// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP surface, nested under `/api`.
//!
//! | Method | Path | Response |
//! |---|---|---|
//! | GET | `/api/search?query=..&backend=sql\|index` | `[SearchResult]` |
//! | GET | `/api/reindex` | `{message, run_id, indexed, took_ms}` |
//! | GET | `/api/health`, `/api/es-health` | cluster health payload, verbatim |
//! | GET | `/api/products`, `/api/check-sqlite` | `[Product]` |
//! | GET | `/api/status` | engine state and sync status |
//!
//! Errors use the body `{error, kind, details}` with the status from
//! [`error`].

pub mod error;

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::coordinator::{CatalogEngine, EngineStatus};
use crate::error::CatalogError;
use crate::health::ReindexReport;
use crate::product::{Product, SearchResult};
use crate::routing::Backend;

type Engine = State<Arc<CatalogEngine>>;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
    /// `sql` / `index` (and aliases); falls back to the configured default
    #[serde(default)]
    pub backend: Option<String>,
}

/// Build the application router.
pub fn router(engine: Arc<CatalogEngine>) -> Router {
    let api = Router::new()
        .route("/search", get(search))
        .route("/reindex", get(reindex))
        .route("/health", get(health))
        .route("/es-health", get(health))
        .route("/products", get(products))
        .route("/check-sqlite", get(products))
        .route("/status", get(status))
        .with_state(engine);

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(engine: Arc<CatalogEngine>, addr: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn search(
    State(engine): Engine,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<SearchResult>>, CatalogError> {
    let Query(params) = params.map_err(|rejection| CatalogError::InvalidQuery(rejection.body_text()))?;
    let backend = params
        .backend
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .map(str::parse::<Backend>)
        .transpose()?;

    let query = params.query.unwrap_or_default();
    let results = engine.search(&query, backend).await?;
    Ok(Json(results))
}

async fn reindex(State(engine): Engine) -> Result<Json<ReindexReport>, CatalogError> {
    Ok(Json(engine.health().reindex_and_report().await?))
}

async fn health(State(engine): Engine) -> Result<Json<Value>, CatalogError> {
    Ok(Json(engine.health().check_health().await?.raw))
}

async fn products(State(engine): Engine) -> Result<Json<Vec<Product>>, CatalogError> {
    Ok(Json(engine.list_products().await?))
}

async fn status(State(engine): Engine) -> Json<EngineStatus> {
    Json(engine.status())
}
