// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Catalog Sync
//!
//! Keeps a product search index in step with the relational record store it
//! is derived from, and answers text queries from either.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        HTTP Surface                         │
//! │  • /api/search, /api/reindex, /api/health, /api/products    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Query Router                          │
//! │  • Per-request backend choice, configured default          │
//! │  • Rejects empty queries before any backend call           │
//! └─────────────────────────────────────────────────────────────┘
//!              │                                 │
//!   (substring scan, rating order)     (analyzed, fuzzy, scored)
//!              ▼                                 ▼
//! ┌───────────────────────────┐   ┌─────────────────────────────┐
//! │    Record Store (truth)   │   │        Search Index         │
//! │  • SQLite / MySQL / memory│──▶│  • Elasticsearch            │
//! │                           │   │  • RediSearch / memory      │
//! └───────────────────────────┘   └─────────────────────────────┘
//!                      (Index Synchronizer: full rebuild,
//!                       in-place or alias swap, one at a time)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catalog_sync::{CatalogConfig, CatalogEngine, Backend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CatalogConfig::load().expect("bad config");
//!     let engine = Arc::new(CatalogEngine::connect(config).await.expect("connect failed"));
//!     engine.start().await.expect("start failed");
//!
//!     let hits = engine.search("headphones", Some(Backend::SearchIndex)).await.unwrap();
//!     for hit in hits {
//!         println!("{} ({:?})", hit.title, hit.score);
//!     }
//!
//!     engine.shutdown().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`CatalogEngine`] owning every component
//! - [`storage`]: Record stores (SQL, memory)
//! - [`index`]: Search index backends, schema and text analysis
//! - [`sync`]: Full rebuilds from the record store into the index
//! - [`routing`]: Query routing between the two backends
//! - [`health`]: Health checks and reindex reporting
//! - [`resilience`]: Startup retry and per-call deadlines
//! - [`api`]: axum router

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod index;
pub mod metrics;
pub mod product;
pub mod resilience;
pub mod routing;
pub mod storage;
pub mod sync;

pub use config::{CatalogConfig, IndexBackendKind, RebuildConcurrency, RebuildStrategy, SortMode};
pub use coordinator::{CatalogEngine, EngineState, EngineStatus};
pub use error::{CatalogError, DocumentFailure};
pub use health::{HealthReporter, ReindexReport};
pub use index::{Fuzziness, IndexSchema, SearchIndex, TextQuery};
pub use product::{Product, SearchResult};
pub use routing::{Backend, QueryRouter};
pub use storage::traits::{RecordStore, StorageError};
pub use sync::{IndexSynchronizer, RebuildReport, SyncStatus};
