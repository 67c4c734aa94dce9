// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Health and status reporting.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::index::{ClusterHealth, SearchIndex};
use crate::metrics;
use crate::resilience::timeout::bounded;
use crate::sync::{IndexSynchronizer, SyncStatus};

pub const REINDEX_SUCCESS_MESSAGE: &str = "Products successfully reindexed";

/// Caller-facing result of a successful reindex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReindexReport {
    pub message: String,
    pub run_id: Uuid,
    pub indexed: usize,
    pub took_ms: u64,
}

pub struct HealthReporter {
    index: Arc<dyn SearchIndex>,
    synchronizer: Arc<IndexSynchronizer>,
    timeout: Duration,
}

impl HealthReporter {
    pub fn new(index: Arc<dyn SearchIndex>, synchronizer: Arc<IndexSynchronizer>, timeout: Duration) -> Self {
        Self {
            index,
            synchronizer,
            timeout,
        }
    }

    /// Cluster health of the search index, payload kept verbatim.
    pub async fn check_health(&self) -> Result<ClusterHealth, CatalogError> {
        let backend = self.index.backend_name();
        let result = bounded(backend, "health", self.timeout, self.index.health()).await;
        metrics::set_backend_healthy(
            backend,
            matches!(&result, Ok(health) if health.status.is_serving()),
        );
        result
    }

    /// Run a full rebuild and translate the outcome for callers. Partial
    /// failures come back as `PartialIndexFailure` with every failed document.
    pub async fn reindex_and_report(&self) -> Result<ReindexReport, CatalogError> {
        let report = self.synchronizer.rebuild_index().await?;
        info!(run_id = %report.run_id, indexed = report.indexed, "Reindex reported");
        Ok(ReindexReport {
            message: REINDEX_SUCCESS_MESSAGE.to_string(),
            run_id: report.run_id,
            indexed: report.indexed,
            took_ms: report.took.as_millis() as u64,
        })
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.synchronizer.sync_status()
    }
}
