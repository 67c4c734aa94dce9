// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for catalog-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding binary chooses the exporter; with no recorder installed
//! every call is a no-op.
//!
//! # Metric Naming Convention
//! - `catalog_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `backend`: record_store, elasticsearch, redisearch, memory
//! - `operation`: exists, create, delete, bulk, search, health, alias
//! - `status`: success, error

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Record a search request outcome
pub fn record_search_query(backend: &str, status: &str) {
    counter!(
        "catalog_sync_search_queries_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record search latency
pub fn record_search_latency(backend: &str, duration: Duration) {
    histogram!(
        "catalog_sync_search_seconds",
        "backend" => backend.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record result count per search
pub fn record_search_results(count: usize) {
    histogram!("catalog_sync_search_results").record(count as f64);
}

/// Record a search index operation (create, delete, bulk, alias)
pub fn record_index_operation(operation: &str, success: bool) {
    counter!(
        "catalog_sync_index_operations_total",
        "operation" => operation.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

/// Record a completed rebuild
pub fn record_rebuild(duration: Duration, indexed: usize, failed: usize) {
    histogram!("catalog_sync_rebuild_seconds").record(duration.as_secs_f64());
    counter!("catalog_sync_documents_indexed_total").increment(indexed as u64);
    if failed > 0 {
        counter!("catalog_sync_document_failures_total").increment(failed as u64);
    }
}

/// Set backend health status
pub fn set_backend_healthy(backend: &str, healthy: bool) {
    gauge!(
        "catalog_sync_backend_healthy",
        "backend" => backend.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

/// Record a connection/backend error
pub fn record_connection_error(backend: &str) {
    counter!(
        "catalog_sync_connection_errors_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// Record a timed-out backend call
pub fn record_timeout(backend: &str, operation: &str) {
    counter!(
        "catalog_sync_timeouts_total",
        "backend" => backend.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record time spent in a startup phase
pub fn record_startup_phase(phase: &str, duration: Duration) {
    histogram!(
        "catalog_sync_startup_seconds",
        "phase" => phase.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a lifecycle state transition
pub fn set_engine_state(state: &str) {
    counter!(
        "catalog_sync_state_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// Records search latency for `backend` when dropped.
pub struct SearchTimer {
    backend: &'static str,
    start: Instant,
}

impl SearchTimer {
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            start: Instant::now(),
        }
    }
}

impl Drop for SearchTimer {
    fn drop(&mut self) {
        record_search_latency(self.backend, self.start.elapsed());
    }
}
