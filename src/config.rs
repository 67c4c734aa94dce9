// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the catalog sync service.
//!
//! Values are layered with figment: compiled defaults, then an optional
//! `catalog.toml`, then `CATALOG_*` environment variables, then the legacy
//! `ELASTICSEARCH_URL` variable for the search endpoint.
//!
//! # Example
//!
//! ```
//! use catalog_sync::config::{CatalogConfig, SortMode, RebuildStrategy};
//!
//! // Minimal config (uses defaults)
//! let config = CatalogConfig::default();
//! assert_eq!(config.elasticsearch_url, "http://localhost:9200");
//! assert_eq!(config.sort_mode, SortMode::Relevance);
//!
//! // Explicit choices
//! let config = CatalogConfig {
//!     index_name: "products_v2".into(),
//!     sort_mode: SortMode::Rating,
//!     rebuild_strategy: RebuildStrategy::AliasSwap,
//!     ..Default::default()
//! };
//! assert_eq!(config.index_name, "products_v2");
//! ```

use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::index::Fuzziness;
use crate::routing::Backend;

/// Configuration for the catalog sync service.
///
/// Every field has a default. Production deployments usually set
/// `sql_url` and `elasticsearch_url` (or `redis_url`) at minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Record store connection string ("sqlite://products.db?mode=rwc" or "mysql://...")
    #[serde(default = "default_sql_url")]
    pub sql_url: String,

    /// Which search index product backs the analyzed search path
    #[serde(default)]
    pub index_backend: IndexBackendKind,

    /// Elasticsearch endpoint (overridden by `ELASTICSEARCH_URL`)
    #[serde(default = "default_elasticsearch_url")]
    pub elasticsearch_url: String,

    /// Redis Stack endpoint, used when `index_backend = "redisearch"`
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Public index name (or alias name under `alias_swap`)
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Result ordering for the analyzed search path
    #[serde(default)]
    pub sort_mode: SortMode,

    /// How a full rebuild replaces the previous index
    #[serde(default)]
    pub rebuild_strategy: RebuildStrategy,

    /// What a second rebuild does while one is in flight
    #[serde(default)]
    pub rebuild_concurrency: RebuildConcurrency,

    /// Backend used when a search request carries no selector
    #[serde(default = "default_backend")]
    pub default_backend: Backend,

    /// Typo tolerance for analyzed queries
    #[serde(default)]
    pub fuzziness: Fuzziness,

    /// Upper bound on every single backend call
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,

    /// Documents per bulk request
    #[serde(default = "default_bulk_batch_size")]
    pub bulk_batch_size: usize,

    /// Max results per search
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    /// Run a full rebuild as part of startup
    #[serde(default = "default_true")]
    pub reindex_on_startup: bool,

    /// Load the demo catalog into an empty record store at startup
    #[serde(default = "default_true")]
    pub seed_demo_catalog: bool,

    /// Synonym groups, comma separated terms per group
    #[serde(default = "default_synonyms")]
    pub synonyms: Vec<String>,
}

fn default_bind_addr() -> String { "0.0.0.0:3002".to_string() }
fn default_sql_url() -> String { "sqlite://products.db?mode=rwc".to_string() }
fn default_elasticsearch_url() -> String { "http://localhost:9200".to_string() }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_index_name() -> String { "products".to_string() }
fn default_backend() -> Backend { Backend::SearchIndex }
fn default_backend_timeout_ms() -> u64 { 10_000 }
fn default_bulk_batch_size() -> usize { 500 }
fn default_result_limit() -> usize { 100 }
fn default_true() -> bool { true }
fn default_synonyms() -> Vec<String> {
    vec!["mp, megapixel, megapixels, mega pixel, mega pixels".to_string()]
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            sql_url: default_sql_url(),
            index_backend: IndexBackendKind::default(),
            elasticsearch_url: default_elasticsearch_url(),
            redis_url: default_redis_url(),
            index_name: default_index_name(),
            sort_mode: SortMode::default(),
            rebuild_strategy: RebuildStrategy::default(),
            rebuild_concurrency: RebuildConcurrency::default(),
            default_backend: default_backend(),
            fuzziness: Fuzziness::default(),
            backend_timeout_ms: default_backend_timeout_ms(),
            bulk_batch_size: default_bulk_batch_size(),
            result_limit: default_result_limit(),
            reindex_on_startup: true,
            seed_demo_catalog: true,
            synonyms: default_synonyms(),
        }
    }
}

impl CatalogConfig {
    /// Load from defaults, `catalog.toml`, `CATALOG_*` and `ELASTICSEARCH_URL`.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// The layered figment behind [`load`](Self::load).
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("catalog.toml"))
            .merge(Env::prefixed("CATALOG_"));
        if let Ok(url) = std::env::var("ELASTICSEARCH_URL") {
            figment = figment.merge(Serialized::default("elasticsearch_url", url));
        }
        figment
    }

    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

/// Search index product backing the analyzed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackendKind {
    #[default]
    Elasticsearch,
    Redisearch,
    /// In-process index (demos and tests)
    Memory,
}

/// Ordering of analyzed search results.
///
/// Both orderings exist in deployed variants of this system, so the choice
/// is always explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Descending relevance score, ties by descending rating
    #[default]
    Relevance,
    /// Descending rating, ties by descending relevance score
    Rating,
}

/// How a full rebuild replaces the live index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStrategy {
    /// Delete, create and load under the public name. Readers may see a
    /// missing or partially loaded index until the bulk load finishes.
    #[default]
    InPlace,
    /// Load a fresh generation, then repoint the public alias to it.
    AliasSwap,
}

/// What happens when a rebuild is requested while one is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildConcurrency {
    /// Fail fast with `RebuildInProgress`
    #[default]
    Reject,
    /// Queue behind the running rebuild
    Wait,
}
