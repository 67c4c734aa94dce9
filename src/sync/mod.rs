// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index synchronizer: full-replace rebuild of the search index from the
//! record store.
//!
//! # Rebuild
//!
//! ```text
//! acquire guard(index_name)
//!   │
//!   ├─ fetch_all (record store)
//!   │
//!   ├─ in_place:   delete(name) [not found = ok] → create(name) → bulk(name)
//!   │
//!   └─ alias_swap: create(name-<run>) → bulk(name-<run>)
//!                  → swap alias name → name-<run> → drop old generations
//!   │
//! release guard (drop)
//! ```
//!
//! Each step waits for the previous one. Every backend call is bounded by
//! the configured timeout. Bulk loads are chunked; per-document failures
//! are collected across chunks and reported as
//! [`CatalogError::PartialIndexFailure`] while the accepted documents stay
//! committed.
//!
//! Under `in_place` readers may observe a missing or partially loaded index
//! until the bulk load finishes. `alias_swap` only exposes a generation once
//! it is fully loaded.

pub mod guard;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::config::{CatalogConfig, RebuildConcurrency, RebuildStrategy};
use crate::error::{CatalogError, DocumentFailure};
use crate::index::{IndexSchema, SearchIndex};
use crate::metrics;
use crate::product::Product;
use crate::resilience::timeout::bounded;
use crate::storage::traits::{RecordStore, StorageError};

use guard::RebuildGuards;

pub const RECORD_STORE_BACKEND: &str = "record_store";

/// Knobs the synchronizer reads from [`CatalogConfig`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub index_name: String,
    pub strategy: RebuildStrategy,
    pub concurrency: RebuildConcurrency,
    pub timeout: Duration,
    pub bulk_batch_size: usize,
}

impl From<&CatalogConfig> for SyncSettings {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            index_name: config.index_name.clone(),
            strategy: config.rebuild_strategy,
            concurrency: config.rebuild_concurrency,
            timeout: config.backend_timeout(),
            bulk_batch_size: config.bulk_batch_size,
        }
    }
}

/// Successful rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    pub run_id: Uuid,
    /// Concrete index that received the documents
    pub target: String,
    pub indexed: usize,
    pub took: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    PartialFailure,
    Failed,
}

/// Record of the most recent rebuild attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub finished_at_ms: u64,
    pub outcome: RunOutcome,
    pub submitted: usize,
    pub indexed: usize,
    pub failures: Vec<DocumentFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub index_name: String,
    pub strategy: RebuildStrategy,
    pub rebuilding: bool,
    pub last_run: Option<RunSummary>,
}

/// Result of [`IndexSynchronizer::ensure_schema`].
#[derive(Debug, Clone, PartialEq)]
pub enum EnsureOutcome {
    AlreadyPresent,
    Rebuilt(RebuildReport),
}

struct LoadResult {
    submitted: usize,
    indexed: usize,
    failures: Vec<DocumentFailure>,
}

pub struct IndexSynchronizer {
    records: Arc<dyn RecordStore>,
    index: Arc<dyn SearchIndex>,
    schema: IndexSchema,
    settings: SyncSettings,
    guards: RebuildGuards,
    last_run: RwLock<Option<RunSummary>>,
}

impl IndexSynchronizer {
    pub fn new(
        records: Arc<dyn RecordStore>,
        index: Arc<dyn SearchIndex>,
        schema: IndexSchema,
        settings: SyncSettings,
    ) -> Self {
        Self {
            records,
            index,
            schema,
            settings,
            guards: RebuildGuards::new(),
            last_run: RwLock::new(None),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.settings.index_name
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Replace the search index contents with the record store's current products.
    #[instrument(skip(self), fields(index = %self.settings.index_name))]
    pub async fn rebuild_index(&self) -> Result<RebuildReport, CatalogError> {
        let _permit = self
            .guards
            .acquire(&self.settings.index_name, self.settings.concurrency)
            .await?;
        self.rebuild_locked().await
    }

    /// Create and populate the index if it does not exist. An existing index
    /// is left untouched; schema changes need an explicit rebuild.
    #[instrument(skip(self), fields(index = %self.settings.index_name))]
    pub async fn ensure_schema(&self) -> Result<EnsureOutcome, CatalogError> {
        let _permit = self
            .guards
            .acquire(&self.settings.index_name, self.settings.concurrency)
            .await?;

        let name = self.settings.index_name.as_str();
        let exists = self.index_call("exists", self.index.exists(name)).await?;
        if exists {
            debug!(index = %name, "Index present, nothing to ensure");
            return Ok(EnsureOutcome::AlreadyPresent);
        }

        info!(index = %name, "Index missing, creating and loading");
        if self.settings.strategy == RebuildStrategy::InPlace {
            self.create(name).await?;
        }
        self.rebuild_locked().await.map(EnsureOutcome::Rebuilt)
    }

    pub fn sync_status(&self) -> SyncStatus {
        SyncStatus {
            index_name: self.settings.index_name.clone(),
            strategy: self.settings.strategy,
            rebuilding: self.guards.is_held(&self.settings.index_name),
            last_run: self.last_run.read().clone(),
        }
    }

    async fn rebuild_locked(&self) -> Result<RebuildReport, CatalogError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let span = tracing::info_span!("rebuild_run", %run_id, strategy = ?self.settings.strategy);

        let result = async {
            let products = bounded(
                RECORD_STORE_BACKEND,
                "fetch_all",
                self.settings.timeout,
                self.records.fetch_all(),
            )
            .await?;
            info!(count = products.len(), "Fetched products from record store");

            match self.settings.strategy {
                RebuildStrategy::InPlace => self.rebuild_in_place(&products).await,
                RebuildStrategy::AliasSwap => self.rebuild_alias_swap(run_id, &products).await,
            }
        }
        .instrument(span)
        .await;

        let took = started.elapsed();
        self.finish_run(run_id, took, result)
    }

    async fn rebuild_in_place(&self, products: &[Product]) -> Result<(String, LoadResult), CatalogError> {
        let name = self.settings.index_name.clone();
        self.delete_if_present(&name).await?;
        self.create(&name).await?;
        let load = self.load(&name, products).await?;
        Ok((name, load))
    }

    async fn rebuild_alias_swap(&self, run_id: Uuid, products: &[Product]) -> Result<(String, LoadResult), CatalogError> {
        let alias = self.settings.index_name.as_str();
        let generation = format!("{}-{}", alias, run_id.simple());

        let previous = self.index_call("alias", self.index.alias_targets(alias)).await?;
        // A concrete index under the alias name (left by in_place) must go before the alias can exist
        let occupied = previous.is_empty() && self.index_call("exists", self.index.exists(alias)).await?;

        self.create(&generation).await?;
        let load = match self.load_and_swap(alias, &generation, &previous, occupied, products).await {
            Ok(load) => load,
            Err(e) => {
                self.discard_generation(alias, &generation).await;
                return Err(e);
            }
        };
        info!(alias = %alias, generation = %generation, "Alias now points at new generation");

        for old in previous.iter().filter(|p| p.as_str() != generation) {
            self.delete_if_present(old).await?;
        }
        Ok((generation, load))
    }

    async fn load_and_swap(
        &self,
        alias: &str,
        generation: &str,
        previous: &[String],
        occupied: bool,
        products: &[Product],
    ) -> Result<LoadResult, CatalogError> {
        let load = self.load(generation, products).await?;

        if occupied {
            self.delete_if_present(alias).await?;
        }
        let swapped = self
            .index_call("alias", self.index.swap_alias(alias, generation, previous))
            .await;
        metrics::record_index_operation("alias", swapped.is_ok());
        swapped?;
        Ok(load)
    }

    /// Drop a generation from a failed run. Left in place when the alias may
    /// already point at it (a swap that timed out after applying).
    async fn discard_generation(&self, alias: &str, generation: &str) {
        match self.index_call("alias", self.index.alias_targets(alias)).await {
            Ok(targets) if targets.iter().any(|t| t == generation) => {
                warn!(generation = %generation, "Failed run's generation is live, keeping it");
            }
            Ok(_) => {
                if let Err(e) = self.delete_if_present(generation).await {
                    warn!(generation = %generation, error = %e, "Could not remove generation from failed run");
                } else {
                    debug!(generation = %generation, "Removed generation from failed run");
                }
            }
            Err(e) => {
                warn!(generation = %generation, error = %e, "Could not check alias, leaving generation in place");
            }
        }
    }

    async fn create(&self, name: &str) -> Result<(), CatalogError> {
        let result = self.index_call("create", self.index.create(name, &self.schema)).await;
        metrics::record_index_operation("create", result.is_ok());
        result?;
        debug!(index = %name, "Index created");
        Ok(())
    }

    /// Delete `name`; a missing index counts as success.
    async fn delete_if_present(&self, name: &str) -> Result<(), CatalogError> {
        let index = self.index.clone();
        let target = name.to_string();
        let result = self
            .index_call("delete", async move {
                match index.delete(&target).await {
                    Ok(()) => Ok(true),
                    Err(StorageError::IndexNotFound(_)) => Ok(false),
                    Err(e) => Err(e),
                }
            })
            .await;
        metrics::record_index_operation("delete", result.is_ok());

        if result? {
            debug!(index = %name, "Previous index deleted");
        } else {
            debug!(index = %name, "No previous index to delete");
        }
        Ok(())
    }

    async fn load(&self, target: &str, products: &[Product]) -> Result<LoadResult, CatalogError> {
        let mut load = LoadResult {
            submitted: products.len(),
            indexed: 0,
            failures: Vec::new(),
        };

        for chunk in products.chunks(self.settings.bulk_batch_size.max(1)) {
            let response = self.index_call("bulk", self.index.bulk_upsert(target, chunk)).await;
            metrics::record_index_operation("bulk", response.is_ok());
            let response = response?;

            if response.items.len() != chunk.len() {
                return Err(CatalogError::unavailable(
                    self.index.backend_name(),
                    format!(
                        "bulk response reported {} items for {} documents",
                        response.items.len(),
                        chunk.len()
                    ),
                ));
            }
            load.indexed += response.succeeded();
            load.failures.extend(response.failures());
        }

        debug!(index = %target, indexed = load.indexed, failed = load.failures.len(), "Bulk load finished");
        Ok(load)
    }

    fn finish_run(
        &self,
        run_id: Uuid,
        took: Duration,
        result: Result<(String, LoadResult), CatalogError>,
    ) -> Result<RebuildReport, CatalogError> {
        let finished_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let (summary, outcome) = match result {
            Ok((target, load)) if load.failures.is_empty() => {
                metrics::record_rebuild(took, load.indexed, 0);
                info!(%run_id, index = %target, indexed = load.indexed, ?took, "Rebuild complete");
                (
                    RunSummary {
                        run_id,
                        finished_at_ms,
                        outcome: RunOutcome::Succeeded,
                        submitted: load.submitted,
                        indexed: load.indexed,
                        failures: Vec::new(),
                        error: None,
                    },
                    Ok(RebuildReport {
                        run_id,
                        target,
                        indexed: load.indexed,
                        took,
                    }),
                )
            }
            Ok((target, load)) => {
                metrics::record_rebuild(took, load.indexed, load.failures.len());
                warn!(
                    %run_id,
                    index = %target,
                    indexed = load.indexed,
                    failed = load.failures.len(),
                    "Rebuild finished with document failures"
                );
                (
                    RunSummary {
                        run_id,
                        finished_at_ms,
                        outcome: RunOutcome::PartialFailure,
                        submitted: load.submitted,
                        indexed: load.indexed,
                        failures: load.failures.clone(),
                        error: None,
                    },
                    Err(CatalogError::PartialIndexFailure {
                        index: self.settings.index_name.clone(),
                        submitted: load.submitted,
                        indexed: load.indexed,
                        failures: load.failures,
                    }),
                )
            }
            Err(e) => {
                warn!(%run_id, error = %e, "Rebuild failed");
                (
                    RunSummary {
                        run_id,
                        finished_at_ms,
                        outcome: RunOutcome::Failed,
                        submitted: 0,
                        indexed: 0,
                        failures: Vec::new(),
                        error: Some(e.to_string()),
                    },
                    Err(e),
                )
            }
        };

        *self.last_run.write() = Some(summary);
        outcome
    }

    async fn index_call<T, Fut>(&self, operation: &str, fut: Fut) -> Result<T, CatalogError>
    where
        Fut: std::future::Future<Output = Result<T, StorageError>>,
    {
        bounded(self.index.backend_name(), operation, self.settings.timeout, fut).await
    }
}
