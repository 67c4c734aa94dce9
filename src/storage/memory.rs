// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::product::Product;
use super::traits::{RecordStore, StorageError};

/// In-process record store keyed by product id.
pub struct MemoryRecordStore {
    data: DashMap<i64, Product>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Build a store pre-loaded with `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        for product in products {
            store.data.insert(product.id, product);
        }
        store
    }

    /// Get current row count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Remove a row (simulates an out-of-band delete between rebuilds)
    pub fn remove(&self, id: i64) -> Option<Product> {
        self.data.remove(&id).map(|(_, p)| p)
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_all(&self) -> Result<Vec<Product>, StorageError> {
        let mut products: Vec<Product> = self.data.iter().map(|r| r.value().clone()).collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    async fn search_substring(&self, needle: &str, limit: usize) -> Result<Vec<Product>, StorageError> {
        let needle = needle.to_lowercase();
        let mut matches: Vec<Product> = self
            .data
            .iter()
            .filter(|r| r.value().contains_text(&needle))
            .map(|r| r.value().clone())
            .collect();
        // DashMap iteration order is arbitrary; fix it before the stable rating sort
        matches.sort_by_key(|p| p.id);
        matches.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn count_all(&self) -> Result<u64, StorageError> {
        Ok(self.data.len() as u64)
    }

    async fn insert_batch(&self, products: &[Product]) -> Result<usize, StorageError> {
        for product in products {
            self.data.insert(product.id, product.clone());
        }
        Ok(products.len())
    }
}
