// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine lifecycle: awaitable startup and shutdown.

use std::time::Instant;

use tracing::{error, info, warn};

use crate::error::CatalogError;
use crate::metrics;
use crate::product::demo_catalog;
use crate::resilience::timeout::bounded;
use crate::sync::{EnsureOutcome, RECORD_STORE_BACKEND};

use super::{CatalogEngine, EngineState};

impl CatalogEngine {
    /// Bring the engine to `Ready`.
    ///
    /// Startup flow:
    /// 1. Seed the record store with the demo catalog if configured and empty
    /// 2. Check search index health (red or unreachable fails startup)
    /// 3. Ensure the index exists (creating and loading it if missing)
    /// 4. Full rebuild, if configured and step 3 did not already load it
    ///
    /// Any failure moves the engine to `Failed` and is returned.
    #[tracing::instrument(skip(self), fields(index = %self.config.index_name))]
    pub async fn start(&self) -> Result<(), CatalogError> {
        let startup_start = Instant::now();
        info!("Starting catalog engine...");

        match self.run_startup().await {
            Ok(()) => {
                self.transition(EngineState::Ready);
                metrics::record_startup_phase("total", startup_start.elapsed());
                info!(took = ?startup_start.elapsed(), "Catalog engine ready");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Catalog engine startup failed");
                self.transition(EngineState::Failed);
                Err(e)
            }
        }
    }

    async fn run_startup(&self) -> Result<(), CatalogError> {
        // ========== PHASE 1: Connecting ==========
        self.transition(EngineState::Connecting);
        let phase_start = Instant::now();

        if self.config.seed_demo_catalog {
            let seeded = bounded(
                RECORD_STORE_BACKEND,
                "seed",
                self.config.backend_timeout(),
                self.records.seed_if_empty(&demo_catalog()),
            )
            .await?;
            if seeded > 0 {
                info!(count = seeded, "Seeded record store with demo catalog");
            }
        }

        let health = self.health.check_health().await?;
        if !health.status.is_serving() {
            return Err(CatalogError::unavailable(
                self.index.backend_name(),
                format!("cluster status is {:?}", health.status),
            ));
        }
        metrics::record_startup_phase("connect", phase_start.elapsed());
        info!(status = ?health.status, "Search index reachable");

        // ========== PHASE 2: Ensure schema ==========
        self.transition(EngineState::EnsuringSchema);
        let phase_start = Instant::now();
        let ensured = self.synchronizer.ensure_schema().await?;
        metrics::record_startup_phase("ensure_schema", phase_start.elapsed());

        // ========== PHASE 3: Startup rebuild ==========
        match ensured {
            EnsureOutcome::Rebuilt(report) => {
                info!(indexed = report.indexed, "Index created and loaded during ensure");
            }
            EnsureOutcome::AlreadyPresent if self.config.reindex_on_startup => {
                self.transition(EngineState::Reindexing);
                let phase_start = Instant::now();
                let report = self.synchronizer.rebuild_index().await?;
                metrics::record_startup_phase("reindex", phase_start.elapsed());
                info!(indexed = report.indexed, "Startup reindex complete");
            }
            EnsureOutcome::AlreadyPresent => {
                info!("Startup reindex disabled, serving existing index");
            }
        }

        Ok(())
    }

    /// Gracefully release backend connections.
    pub async fn shutdown(&self) {
        let shutdown_start = Instant::now();
        info!("Initiating catalog engine shutdown...");
        self.transition(EngineState::ShuttingDown);

        if self.synchronizer.sync_status().rebuilding {
            warn!("Shutting down while a rebuild is in flight");
        }
        if let Some(sql) = &self.sql_store {
            sql.close().await;
        }

        self.transition(EngineState::Stopped);
        metrics::record_startup_phase("shutdown", shutdown_start.elapsed());
        info!("Catalog engine shutdown complete");
    }

    pub(super) fn transition(&self, next: EngineState) {
        let _ = self.state.send(next);
        metrics::set_engine_state(&next.to_string());
    }
}
