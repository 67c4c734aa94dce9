// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Catalog engine coordinator.
//!
//! The [`CatalogEngine`] owns every component and hands out borrowed access
//! to them:
//! - Record store (SQL or in-memory)
//! - Search index (Elasticsearch, RediSearch or in-memory)
//! - Index synchronizer with its rebuild guards
//! - Query router and health reporter
//!
//! Clients are opened once by [`CatalogEngine::connect`] (or injected through
//! [`CatalogEngine::new`]) and released by [`CatalogEngine::shutdown`].
//!
//! # Lifecycle
//!
//! ```text
//! Created → Connecting → EnsuringSchema → Reindexing → Ready → ShuttingDown → Stopped
//!                 └───────────┴──────────────┴──→ Failed
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catalog_sync::{CatalogConfig, CatalogEngine, EngineState};
//! use catalog_sync::index::MemoryIndex;
//! use catalog_sync::storage::memory::MemoryRecordStore;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = CatalogEngine::new(
//!     CatalogConfig::default(),
//!     Arc::new(MemoryRecordStore::new()),
//!     Arc::new(MemoryIndex::new()),
//! );
//! assert_eq!(engine.state(), EngineState::Created);
//!
//! engine.start().await.expect("start failed");
//! assert!(engine.is_ready());
//! # }
//! ```

mod lifecycle;
mod types;

pub use types::{EngineState, EngineStatus};

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::{CatalogConfig, IndexBackendKind};
use crate::error::CatalogError;
use crate::health::HealthReporter;
use crate::index::{ElasticsearchIndex, IndexSchema, MemoryIndex, RediSearchIndex, SearchIndex};
use crate::product::{Product, SearchResult};
use crate::resilience::timeout::bounded;
use crate::routing::{Backend, QueryRouter};
use crate::storage::sql::SqlRecordStore;
use crate::storage::traits::RecordStore;
use crate::sync::{IndexSynchronizer, SyncSettings, RECORD_STORE_BACKEND};

/// Main catalog coordinator.
///
/// `Send + Sync`; share it behind an `Arc`.
pub struct CatalogEngine {
    pub(super) config: CatalogConfig,

    /// Engine state (broadcast to watchers)
    pub(super) state: watch::Sender<EngineState>,
    pub(super) state_rx: watch::Receiver<EngineState>,

    pub(super) records: Arc<dyn RecordStore>,
    pub(super) index: Arc<dyn SearchIndex>,

    /// Concrete SQL store, kept to close its pool on shutdown
    pub(super) sql_store: Option<Arc<SqlRecordStore>>,

    pub(super) synchronizer: Arc<IndexSynchronizer>,
    pub(super) router: QueryRouter,
    pub(super) health: HealthReporter,
}

impl CatalogEngine {
    /// Build an engine around already-connected components.
    pub fn new(config: CatalogConfig, records: Arc<dyn RecordStore>, index: Arc<dyn SearchIndex>) -> Self {
        let (state, state_rx) = watch::channel(EngineState::Created);

        let schema = IndexSchema::products(&config.synonyms);
        let synchronizer = Arc::new(IndexSynchronizer::new(
            records.clone(),
            index.clone(),
            schema,
            SyncSettings::from(&config),
        ));
        let router = QueryRouter::from_config(records.clone(), index.clone(), &config);
        let health = HealthReporter::new(index.clone(), synchronizer.clone(), config.backend_timeout());

        Self {
            config,
            state,
            state_rx,
            records,
            index,
            sql_store: None,
            synchronizer,
            router,
            health,
        }
    }

    /// Open the configured record store and search index.
    pub async fn connect(config: CatalogConfig) -> Result<Self, CatalogError> {
        info!(sql = %config.sql_url, backend = ?config.index_backend, "Connecting catalog backends");

        let sql = SqlRecordStore::connect(&config.sql_url)
            .await
            .map(Arc::new)
            .map_err(|e| CatalogError::unavailable(RECORD_STORE_BACKEND, e.to_string()))?;

        let index: Arc<dyn SearchIndex> = match config.index_backend {
            IndexBackendKind::Elasticsearch => Arc::new(
                ElasticsearchIndex::new(&config.elasticsearch_url, config.backend_timeout())
                    .map_err(|e| CatalogError::unavailable("elasticsearch", e.to_string()))?,
            ),
            IndexBackendKind::Redisearch => Arc::new(
                RediSearchIndex::connect(&config.redis_url)
                    .await
                    .map_err(|e| CatalogError::unavailable("redisearch", e.to_string()))?,
            ),
            IndexBackendKind::Memory => Arc::new(MemoryIndex::new()),
        };

        let mut engine = Self::new(config, sql.clone(), index);
        engine.sql_store = Some(sql);
        Ok(engine)
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    pub fn health(&self) -> &HealthReporter {
        &self.health
    }

    pub fn synchronizer(&self) -> &Arc<IndexSynchronizer> {
        &self.synchronizer
    }

    pub fn search_index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }

    /// Route one search.
    pub async fn search(&self, query: &str, backend: Option<Backend>) -> Result<Vec<SearchResult>, CatalogError> {
        self.router.search(query, backend).await
    }

    /// Every product in the record store, ordered by id.
    pub async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        bounded(
            RECORD_STORE_BACKEND,
            "fetch_all",
            self.config.backend_timeout(),
            self.records.fetch_all(),
        )
        .await
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state(),
            index_backend: self.index.backend_name(),
            sync: self.synchronizer.sync_status(),
        }
    }
}
