// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search index capability and its adapters.
//!
//! The search index is always a derived, rebuildable copy of the record
//! store. Adapters only translate; they never retry and never decide on
//! rebuild policy.
//!
//! ```text
//!                  ┌──────────────────────┐
//!                  │  SearchIndex (trait) │
//!                  └──────────┬───────────┘
//!          ┌──────────────────┼──────────────────┐
//!          ▼                  ▼                  ▼
//!  ElasticsearchIndex   RediSearchIndex      MemoryIndex
//!   (REST, reqwest)     (FT.*, redis)     (analysis + strsim)
//! ```

pub mod analysis;
pub mod elasticsearch;
pub mod memory;
pub mod query;
pub mod redisearch;
pub mod schema;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DocumentFailure;
use crate::product::Product;
use crate::storage::traits::StorageError;

pub use elasticsearch::ElasticsearchIndex;
pub use memory::MemoryIndex;
pub use query::{Fuzziness, TextQuery};
pub use redisearch::RediSearchIndex;
pub use schema::IndexSchema;

/// Per-document outcome of a bulk upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    pub id: String,
    pub status: u16,
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn ok(id: impl Into<String>, status: u16) -> Self {
        Self {
            id: id.into(),
            status,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, status: u16, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Result of one bulk request, one entry per submitted document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.is_success()).count()
    }

    /// Failed items as caller-facing failures.
    #[must_use]
    pub fn failures(&self) -> Vec<DocumentFailure> {
        self.items
            .iter()
            .filter(|i| !i.is_success())
            .map(|i| DocumentFailure {
                id: i.id.clone(),
                status: i.status,
                reason: i.error.clone().unwrap_or_else(|| format!("status {}", i.status)),
            })
            .collect()
    }
}

/// One relevance-ranked hit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// Document id as stored in the index
    pub id: String,
    pub score: Option<f64>,
    pub product: Product,
}

/// Traffic-light status of the index cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

impl HealthStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "green" => Some(Self::Green),
            "yellow" => Some(Self::Yellow),
            "red" => Some(Self::Red),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_serving(&self) -> bool {
        !matches!(self, Self::Red)
    }
}

/// Cluster health with the backend payload kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterHealth {
    pub status: HealthStatus,
    pub raw: serde_json::Value,
}

/// Document index with analyzer-driven text queries.
///
/// `name` is either a concrete index or an alias; engines resolve aliases
/// for `search` and `bulk_upsert`.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Short backend label used in logs, metrics and errors.
    fn backend_name(&self) -> &'static str;

    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    async fn create(&self, name: &str, schema: &IndexSchema) -> Result<(), StorageError>;

    /// Must return [`StorageError::IndexNotFound`] when nothing exists under `name`.
    async fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Upsert keyed by product id. Items succeed or fail independently; the
    /// call itself only errors when the request as a whole failed.
    async fn bulk_upsert(&self, name: &str, products: &[Product]) -> Result<BulkResponse, StorageError>;

    async fn search(&self, name: &str, query: &TextQuery) -> Result<Vec<IndexHit>, StorageError>;

    async fn health(&self) -> Result<ClusterHealth, StorageError>;

    /// Concrete indexes the alias points at (empty if it isn't an alias).
    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, StorageError>;

    /// Atomically point `alias` at `target`, detaching it from `previous`.
    async fn swap_alias(&self, alias: &str, target: &str, previous: &[String]) -> Result<(), StorageError>;
}
