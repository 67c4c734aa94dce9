// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::product::Product;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Index '{0}' not found")]
    IndexNotFound(String),
    #[error("Malformed backend response: {0}")]
    Malformed(String),
    #[error("Timed out during '{0}'")]
    Timeout(String),
}

/// Row store holding the authoritative product set.
///
/// Read-only from the synchronizer's point of view; the only write path is
/// the seed/import step.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every product, ordered by id.
    async fn fetch_all(&self) -> Result<Vec<Product>, StorageError>;

    /// Products whose title or description contains `needle`
    /// case-insensitively, ordered by descending rating.
    async fn search_substring(&self, needle: &str, limit: usize) -> Result<Vec<Product>, StorageError>;

    /// Count total rows.
    async fn count_all(&self) -> Result<u64, StorageError>;

    /// Import products. Existing ids are replaced.
    async fn insert_batch(&self, products: &[Product]) -> Result<usize, StorageError>;

    /// Import `products` only when the store is empty. Returns rows written.
    async fn seed_if_empty(&self, products: &[Product]) -> Result<usize, StorageError> {
        if self.count_all().await? > 0 {
            return Ok(0);
        }
        self.insert_batch(products).await
    }
}
