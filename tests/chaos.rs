// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Chaos testing for the catalog engine.
//!
//! Failure scenarios driven through wrappers around the in-memory backends:
//! 1. **FailingIndex** - per-document rejections, full outages, slow calls
//! 2. **CountingRecordStore** - proves rejected requests never reach a backend
//! 3. **Container killing** - abrupt Elasticsearch death (needs Docker)
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos
//! cargo test --test chaos -- --ignored --nocapture   # container scenarios
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use catalog_sync::index::{BulkItemResult, BulkResponse, ClusterHealth, IndexHit, MemoryIndex};
use catalog_sync::product::demo_catalog;
use catalog_sync::storage::memory::MemoryRecordStore;
use catalog_sync::{
    Backend, CatalogConfig, CatalogEngine, CatalogError, EngineState, IndexSchema, Product, RebuildConcurrency,
    RebuildStrategy, RecordStore, SearchIndex, StorageError, TextQuery,
};

use testcontainers::{clients::Cli, core::WaitFor, GenericImage};

// =============================================================================
// Failing Index Wrapper - Precise Error Injection
// =============================================================================

/// Wraps a [`MemoryIndex`] and injects failures on demand.
pub struct FailingIndex {
    inner: Arc<MemoryIndex>,
    /// Product ids rejected by every bulk request
    reject_ids: Mutex<HashSet<i64>>,
    /// Every call fails with a connection error while set
    down: AtomicBool,
    /// Only bulk requests fail while set
    bulk_down: AtomicBool,
    /// Only alias swaps fail while set
    swap_down: AtomicBool,
    /// Delay added to bulk and search calls
    delay_ms: AtomicU64,
    bulk_calls: AtomicUsize,
}

impl FailingIndex {
    pub fn new(inner: Arc<MemoryIndex>) -> Self {
        Self {
            inner,
            reject_ids: Mutex::new(HashSet::new()),
            down: AtomicBool::new(false),
            bulk_down: AtomicBool::new(false),
            swap_down: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            bulk_calls: AtomicUsize::new(0),
        }
    }

    pub fn reject(&self, ids: impl IntoIterator<Item = i64>) {
        self.reject_ids.lock().extend(ids);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_bulk_down(&self, down: bool) {
        self.bulk_down.store(down, Ordering::SeqCst);
    }

    pub fn set_swap_down(&self, down: bool) {
        self.swap_down.store(down, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    async fn maybe_fail(&self) -> Result<(), StorageError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("connection refused".into()));
        }
        Ok(())
    }

    async fn maybe_delay(&self) {
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl SearchIndex for FailingIndex {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        self.maybe_fail().await?;
        self.inner.exists(name).await
    }

    async fn create(&self, name: &str, schema: &IndexSchema) -> Result<(), StorageError> {
        self.maybe_fail().await?;
        self.inner.create(name, schema).await
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.maybe_fail().await?;
        self.inner.delete(name).await
    }

    async fn bulk_upsert(&self, name: &str, products: &[Product]) -> Result<BulkResponse, StorageError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        self.maybe_fail().await?;
        if self.bulk_down.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("bulk endpoint down".into()));
        }

        let rejected = self.reject_ids.lock().clone();
        let accepted: Vec<Product> = products.iter().filter(|p| !rejected.contains(&p.id)).cloned().collect();
        let mut inner_items = self.inner.bulk_upsert(name, &accepted).await?.items.into_iter();

        // Re-interleave so items stay in submission order
        let items = products
            .iter()
            .map(|p| {
                if rejected.contains(&p.id) {
                    Ok(BulkItemResult::failed(p.doc_id(), 400, "mapper_parsing_exception"))
                } else {
                    inner_items
                        .next()
                        .ok_or_else(|| StorageError::Malformed("missing bulk item".into()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BulkResponse { items })
    }

    async fn search(&self, name: &str, query: &TextQuery) -> Result<Vec<IndexHit>, StorageError> {
        self.maybe_delay().await;
        self.maybe_fail().await?;
        self.inner.search(name, query).await
    }

    async fn health(&self) -> Result<ClusterHealth, StorageError> {
        self.maybe_fail().await?;
        self.inner.health().await
    }

    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, StorageError> {
        self.maybe_fail().await?;
        self.inner.alias_targets(alias).await
    }

    async fn swap_alias(&self, alias: &str, target: &str, previous: &[String]) -> Result<(), StorageError> {
        self.maybe_fail().await?;
        if self.swap_down.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("alias update rejected".into()));
        }
        self.inner.swap_alias(alias, target, previous).await
    }
}

/// Record store that counts every call.
pub struct CountingRecordStore {
    inner: MemoryRecordStore,
    calls: AtomicUsize,
}

impl CountingRecordStore {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            inner: MemoryRecordStore::with_products(products),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for CountingRecordStore {
    async fn fetch_all(&self) -> Result<Vec<Product>, StorageError> {
        self.tick();
        self.inner.fetch_all().await
    }

    async fn search_substring(&self, needle: &str, limit: usize) -> Result<Vec<Product>, StorageError> {
        self.tick();
        self.inner.search_substring(needle, limit).await
    }

    async fn count_all(&self) -> Result<u64, StorageError> {
        self.tick();
        self.inner.count_all().await
    }

    async fn insert_batch(&self, products: &[Product]) -> Result<usize, StorageError> {
        self.tick();
        self.inner.insert_batch(products).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn test_config() -> CatalogConfig {
    CatalogConfig {
        index_backend: catalog_sync::IndexBackendKind::Memory,
        backend_timeout_ms: 2_000,
        seed_demo_catalog: false,
        ..Default::default()
    }
}

struct Harness {
    engine: Arc<CatalogEngine>,
    index: Arc<FailingIndex>,
    memory: Arc<MemoryIndex>,
    records: Arc<CountingRecordStore>,
}

fn harness(config: CatalogConfig) -> Harness {
    let memory = Arc::new(MemoryIndex::new());
    let index = Arc::new(FailingIndex::new(memory.clone()));
    let records = Arc::new(CountingRecordStore::new(demo_catalog()));
    let engine = Arc::new(CatalogEngine::new(config, records.clone(), index.clone()));
    Harness {
        engine,
        index,
        memory,
        records,
    }
}

// =============================================================================
// Partial Failure
// =============================================================================

#[tokio::test]
async fn chaos_partial_failure_reports_every_rejected_document() {
    let h = harness(test_config());
    h.index.reject([3, 7, 11]);

    let err = h.engine.synchronizer().rebuild_index().await.unwrap_err();
    match err {
        CatalogError::PartialIndexFailure {
            submitted,
            indexed,
            failures,
            ..
        } => {
            assert_eq!(submitted, 20);
            assert_eq!(indexed, 17);
            let ids: Vec<&str> = failures.iter().map(|f| f.id.as_str()).collect();
            assert_eq!(ids, vec!["3", "7", "11"]);
            assert!(failures.iter().all(|f| f.status == 400));
        }
        other => panic!("expected PartialIndexFailure, got {other:?}"),
    }

    // The accepted documents stay committed and searchable
    assert_eq!(h.memory.doc_count("products"), Some(17));
    let status = h.engine.status();
    assert!(!status.sync.rebuilding);
    assert_eq!(status.sync.last_run.unwrap().failures.len(), 3);
}

#[tokio::test]
async fn chaos_partial_failure_across_bulk_chunks() {
    let config = CatalogConfig {
        bulk_batch_size: 4,
        ..test_config()
    };
    let h = harness(config);
    h.index.reject([1, 20]);

    let err = h.engine.health().reindex_and_report().await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::PartialIndexFailure { indexed: 18, ref failures, .. } if failures.len() == 2
    ));
    assert_eq!(h.index.bulk_calls(), 5);
}

#[tokio::test]
async fn chaos_alias_swap_still_swaps_on_partial_failure() {
    let config = CatalogConfig {
        rebuild_strategy: RebuildStrategy::AliasSwap,
        ..test_config()
    };
    let h = harness(config);
    h.engine.synchronizer().rebuild_index().await.unwrap();

    h.index.reject([5]);
    let err = h.engine.synchronizer().rebuild_index().await.unwrap_err();
    assert!(matches!(err, CatalogError::PartialIndexFailure { indexed: 19, .. }));

    assert_eq!(h.memory.doc_count("products"), Some(19));
    // Only the live generation remains
    assert_eq!(h.memory.index_names().len(), 1);
}

#[tokio::test]
async fn chaos_failed_alias_swap_runs_leave_only_the_live_generation() {
    let config = CatalogConfig {
        rebuild_strategy: RebuildStrategy::AliasSwap,
        ..test_config()
    };
    let h = harness(config);
    let first = h.engine.synchronizer().rebuild_index().await.unwrap();

    h.index.set_bulk_down(true);
    for _ in 0..3 {
        let err = h.engine.synchronizer().rebuild_index().await.unwrap_err();
        assert!(matches!(err, CatalogError::BackendUnavailable { .. }), "got {err:?}");

        // Live alias untouched by the failed run
        assert_eq!(h.memory.alias_targets("products").await.unwrap(), vec![first.target.clone()]);
        assert_eq!(h.memory.index_names(), vec![first.target.clone()]);
        assert_eq!(h.memory.doc_count("products"), Some(20));
    }

    h.index.set_bulk_down(false);
    let last = h.engine.synchronizer().rebuild_index().await.unwrap();
    assert_eq!(h.memory.index_names(), vec![last.target.clone()]);
    assert_eq!(h.memory.doc_count("products"), Some(20));
}

#[tokio::test]
async fn chaos_rejected_alias_swap_discards_new_generation() {
    let config = CatalogConfig {
        rebuild_strategy: RebuildStrategy::AliasSwap,
        ..test_config()
    };
    let h = harness(config);
    let first = h.engine.synchronizer().rebuild_index().await.unwrap();

    h.index.set_swap_down(true);
    assert!(h.engine.synchronizer().rebuild_index().await.is_err());

    assert_eq!(h.memory.index_names(), vec![first.target.clone()]);
    assert_eq!(h.memory.alias_targets("products").await.unwrap(), vec![first.target]);
    let hits = h.engine.search("camera", Some(Backend::SearchIndex)).await.unwrap();
    assert!(!hits.is_empty());
}

// =============================================================================
// Outages and Timeouts
// =============================================================================

#[tokio::test]
async fn chaos_unreachable_index_is_an_error_not_an_empty_result() {
    let h = harness(test_config());
    h.engine.synchronizer().rebuild_index().await.unwrap();

    h.index.set_down(true);
    let err = h.engine.search("headphones", Some(Backend::SearchIndex)).await.unwrap_err();
    assert!(matches!(err, CatalogError::BackendUnavailable { .. }), "got {err:?}");

    // The record store path is independent of the index
    let results = h.engine.search("headphones", Some(Backend::RecordStore)).await.unwrap();
    assert!(!results.is_empty());
}

#[tokio::test]
async fn chaos_startup_fails_when_index_unreachable() {
    let h = harness(test_config());
    h.index.set_down(true);

    let err = h.engine.start().await.unwrap_err();
    assert!(matches!(err, CatalogError::BackendUnavailable { .. }));
    assert_eq!(h.engine.state(), EngineState::Failed);
    assert!(h.engine.health().check_health().await.is_err());
}

#[tokio::test]
async fn chaos_rebuild_during_outage_is_recorded_as_failed() {
    let h = harness(test_config());
    h.index.set_down(true);

    assert!(h.engine.health().reindex_and_report().await.is_err());
    let last = h.engine.status().sync.last_run.unwrap();
    assert!(last.error.is_some());

    // Recovery: the next rebuild succeeds
    h.index.set_down(false);
    let report = h.engine.health().reindex_and_report().await.unwrap();
    assert_eq!(report.indexed, 20);
}

#[tokio::test]
async fn chaos_slow_index_times_out() {
    let config = CatalogConfig {
        backend_timeout_ms: 50,
        ..test_config()
    };
    let h = harness(config);
    h.engine.synchronizer().rebuild_index().await.unwrap();

    h.index.set_delay(Duration::from_millis(500));
    let err = h.engine.search("camera", Some(Backend::SearchIndex)).await.unwrap_err();
    assert!(matches!(err, CatalogError::BackendTimeout { .. }), "got {err:?}");
}

// =============================================================================
// Query Validation
// =============================================================================

#[tokio::test]
async fn chaos_blank_queries_never_reach_a_backend() {
    let h = harness(test_config());

    for query in ["", "   ", "\t\n"] {
        for backend in [None, Some(Backend::RecordStore), Some(Backend::SearchIndex)] {
            let err = h.engine.search(query, backend).await.unwrap_err();
            assert!(matches!(err, CatalogError::InvalidQuery(_)));
        }
    }
    assert_eq!(h.records.calls(), 0);
    assert_eq!(h.index.bulk_calls(), 0);
}

// =============================================================================
// Concurrent Rebuilds
// =============================================================================

#[tokio::test]
async fn chaos_concurrent_rebuild_is_rejected() {
    let h = harness(test_config());
    h.index.set_delay(Duration::from_millis(200));

    let sync = h.engine.synchronizer().clone();
    let first = tokio::spawn(async move { sync.rebuild_index().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.engine.status().sync.rebuilding);
    let err = h.engine.synchronizer().rebuild_index().await.unwrap_err();
    assert!(matches!(err, CatalogError::RebuildInProgress { .. }));

    first.await.unwrap().unwrap();
    assert_eq!(h.memory.doc_count("products"), Some(20));
}

#[tokio::test]
async fn chaos_concurrent_rebuild_waits_its_turn() {
    let config = CatalogConfig {
        rebuild_concurrency: RebuildConcurrency::Wait,
        ..test_config()
    };
    let h = harness(config);
    h.index.set_delay(Duration::from_millis(100));

    let a = h.engine.synchronizer().clone();
    let b = h.engine.synchronizer().clone();
    let (ra, rb) = tokio::join!(a.rebuild_index(), b.rebuild_index());

    let (ra, rb) = (ra.unwrap(), rb.unwrap());
    assert_ne!(ra.run_id, rb.run_id);
    assert_eq!(h.memory.doc_count("products"), Some(20));
    assert_eq!(h.index.bulk_calls(), 2);
}

#[tokio::test]
async fn chaos_alias_swap_readers_never_see_a_partial_index() {
    let config = CatalogConfig {
        rebuild_strategy: RebuildStrategy::AliasSwap,
        ..test_config()
    };
    let h = harness(config);
    h.engine.synchronizer().rebuild_index().await.unwrap();
    h.index.set_delay(Duration::from_millis(100));

    let sync = h.engine.synchronizer().clone();
    let rebuild = tokio::spawn(async move { sync.rebuild_index().await });

    let mut observed = HashSet::new();
    while !rebuild.is_finished() {
        observed.insert(h.memory.doc_count("products"));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    rebuild.await.unwrap().unwrap();

    assert_eq!(observed, HashSet::from([Some(20)]));
}

#[tokio::test]
async fn chaos_in_place_readers_see_empty_or_full() {
    let h = harness(test_config());
    h.engine.synchronizer().rebuild_index().await.unwrap();
    h.index.set_delay(Duration::from_millis(100));

    let sync = h.engine.synchronizer().clone();
    let rebuild = tokio::spawn(async move { sync.rebuild_index().await });

    let mut observed = HashSet::new();
    while !rebuild.is_finished() {
        observed.insert(h.memory.doc_count("products"));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    rebuild.await.unwrap().unwrap();

    // Bulk load is a single chunk, so counts jump straight from 0 to 20
    for count in observed {
        assert!(matches!(count, None | Some(0) | Some(20)), "saw {count:?}");
    }
}

// =============================================================================
// Container Killing
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn chaos_elasticsearch_killed_mid_flight() {
    let docker = Cli::default();
    let image = GenericImage::new("docker.elastic.co/elasticsearch/elasticsearch", "8.13.4")
        .with_env_var("discovery.type", "single-node")
        .with_env_var("xpack.security.enabled", "false")
        .with_env_var("ES_JAVA_OPTS", "-Xms512m -Xmx512m")
        .with_exposed_port(9200)
        .with_wait_for(WaitFor::message_on_stdout("started"));
    let es = docker.run(image);
    let url = format!("http://127.0.0.1:{}", es.get_host_port_ipv4(9200));

    let config = CatalogConfig {
        elasticsearch_url: url.clone(),
        backend_timeout_ms: 2_000,
        seed_demo_catalog: false,
        ..Default::default()
    };
    let index = Arc::new(catalog_sync::index::ElasticsearchIndex::new(&url, config.backend_timeout()).unwrap());
    let engine = CatalogEngine::new(config, Arc::new(MemoryRecordStore::with_products(demo_catalog())), index);
    engine.start().await.unwrap();
    assert!(!engine.search("headphones", None).await.unwrap().is_empty());

    es.stop();

    let err = engine.search("headphones", None).await.unwrap_err();
    assert!(
        matches!(err, CatalogError::BackendUnavailable { .. } | CatalogError::BackendTimeout { .. }),
        "got {err:?}"
    );
    assert!(engine.health().check_health().await.is_err());
}
