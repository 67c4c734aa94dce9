// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-index-name rebuild guard.
//!
//! A permit is held for the whole delete → create → bulk-load sequence and
//! released on drop, so every exit path (success, error, timeout, task
//! cancellation) frees it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::config::RebuildConcurrency;
use crate::error::CatalogError;

#[derive(Default)]
pub struct RebuildGuards {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive right to rebuild one index name.
pub struct RebuildPermit {
    index: String,
    _guard: OwnedMutexGuard<()>,
}

impl RebuildPermit {
    pub fn index(&self) -> &str {
        &self.index
    }
}

impl Drop for RebuildPermit {
    fn drop(&mut self) {
        debug!(index = %self.index, "Rebuild guard released");
    }
}

impl RebuildGuards {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, index: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(index.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Take the guard for `index`. `Reject` fails fast with
    /// `RebuildInProgress`; `Wait` queues behind the holder.
    pub async fn acquire(&self, index: &str, policy: RebuildConcurrency) -> Result<RebuildPermit, CatalogError> {
        let lock = self.lock_for(index);
        let guard = match policy {
            RebuildConcurrency::Reject => lock.try_lock_owned().map_err(|_| CatalogError::RebuildInProgress {
                index: index.to_string(),
            })?,
            RebuildConcurrency::Wait => lock.lock_owned().await,
        };
        debug!(index = %index, "Rebuild guard acquired");
        Ok(RebuildPermit {
            index: index.to_string(),
            _guard: guard,
        })
    }

    /// Whether a rebuild currently holds the guard for `index`.
    #[must_use]
    pub fn is_held(&self, index: &str) -> bool {
        self.locks
            .get(index)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reject_while_held() {
        let guards = RebuildGuards::new();
        let permit = guards.acquire("products", RebuildConcurrency::Reject).await.unwrap();
        assert!(guards.is_held("products"));

        let err = guards.acquire("products", RebuildConcurrency::Reject).await.err().unwrap();
        assert_eq!(err.kind(), "RebuildInProgress");

        drop(permit);
        assert!(!guards.is_held("products"));
        assert!(guards.acquire("products", RebuildConcurrency::Reject).await.is_ok());
    }

    #[tokio::test]
    async fn test_guards_are_per_index_name() {
        let guards = RebuildGuards::new();
        let _a = guards.acquire("products", RebuildConcurrency::Reject).await.unwrap();
        assert!(guards.acquire("archive", RebuildConcurrency::Reject).await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_queues_behind_holder() {
        let guards = Arc::new(RebuildGuards::new());
        let permit = guards.acquire("products", RebuildConcurrency::Wait).await.unwrap();

        let waiter = {
            let guards = guards.clone();
            tokio::spawn(async move {
                guards.acquire("products", RebuildConcurrency::Wait).await.map(|p| p.index().to_string())
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(permit);
        let index = waiter.await.unwrap().unwrap();
        assert_eq!(index, "products");
    }
}
