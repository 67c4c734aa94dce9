// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query router.
//!
//! One parametrized router in front of two [`SearchBackend`] adapters:
//!
//! ```text
//! search(text, backend?)
//!     │ trim, reject empty (InvalidQuery, no backend call)
//!     ▼
//! ┌───────────────┬──────────────────┐
//! │ RecordStore   │ SearchIndex      │
//! │ SubstringScan │ AnalyzedIndex    │
//! │ LIKE, rating↓ │ fuzzy, score↓ or │
//! │ no score      │ rating↓ (config) │
//! └───────┬───────┴────────┬─────────┘
//!         └──→ Vec<SearchResult> ←──┘
//! ```

mod adapters;

pub use adapters::{AnalyzedIndex, SubstringScan};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::index::SearchIndex;
use crate::metrics::{self, SearchTimer};
use crate::product::SearchResult;
use crate::storage::traits::RecordStore;

/// Which backend serves a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Substring scan over the record store
    RecordStore,
    /// Analyzed relevance query against the search index
    SearchIndex,
}

impl Backend {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecordStore => "record_store",
            Self::SearchIndex => "search_index",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" | "sqlite" | "standard" | "records" | "record_store" => Ok(Self::RecordStore),
            "index" | "search" | "search_index" | "elasticsearch" | "es" | "redisearch" => Ok(Self::SearchIndex),
            other => Err(CatalogError::InvalidQuery(format!("unknown backend '{}'", other))),
        }
    }
}

/// Capability both search paths implement.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Metrics/log label
    fn label(&self) -> &'static str;

    /// `text` is already trimmed and non-empty.
    async fn search(&self, text: &str) -> Result<Vec<SearchResult>, CatalogError>;
}

pub struct QueryRouter {
    record_path: Arc<dyn SearchBackend>,
    index_path: Arc<dyn SearchBackend>,
    default_backend: Backend,
}

impl QueryRouter {
    pub fn new(
        record_path: Arc<dyn SearchBackend>,
        index_path: Arc<dyn SearchBackend>,
        default_backend: Backend,
    ) -> Self {
        Self {
            record_path,
            index_path,
            default_backend,
        }
    }

    /// Wire both adapters from configuration.
    pub fn from_config(
        records: Arc<dyn RecordStore>,
        index: Arc<dyn SearchIndex>,
        config: &CatalogConfig,
    ) -> Self {
        let record_path = Arc::new(SubstringScan::new(records, config.result_limit, config.backend_timeout()));
        let index_path = Arc::new(AnalyzedIndex::from_config(index, config));
        Self::new(record_path, index_path, config.default_backend)
    }

    #[must_use]
    pub fn default_backend(&self) -> Backend {
        self.default_backend
    }

    /// Validate, dispatch and normalize one search.
    ///
    /// An empty result is a successful "no matches"; a backend failure is
    /// always an error.
    pub async fn search(&self, query_text: &str, backend: Option<Backend>) -> Result<Vec<SearchResult>, CatalogError> {
        let text = query_text.trim();
        if text.is_empty() {
            metrics::record_search_query("none", "invalid");
            return Err(CatalogError::InvalidQuery("query must not be empty".to_string()));
        }

        let backend = backend.unwrap_or(self.default_backend);
        let adapter = match backend {
            Backend::RecordStore => &self.record_path,
            Backend::SearchIndex => &self.index_path,
        };

        let label = adapter.label();
        let result = {
            let _timer = SearchTimer::new(label);
            adapter.search(text).await
        };

        match &result {
            Ok(results) => {
                metrics::record_search_query(label, "success");
                metrics::record_search_results(results.len());
                debug!(backend = %backend, query = %text, results = results.len(), "Search served");
            }
            Err(e) => {
                metrics::record_search_query(label, "error");
                debug!(backend = %backend, query = %text, error = %e, "Search failed");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        results: Vec<SearchResult>,
    }

    #[async_trait]
    impl SearchBackend for Counting {
        fn label(&self) -> &'static str {
            "counting"
        }

        async fn search(&self, _text: &str) -> Result<Vec<SearchResult>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.clone())
        }
    }

    fn counting() -> Arc<Counting> {
        Arc::new(Counting {
            calls: AtomicUsize::new(0),
            results: vec![],
        })
    }

    #[test]
    fn test_backend_selector_aliases() {
        assert_eq!("sql".parse::<Backend>().unwrap(), Backend::RecordStore);
        assert_eq!("Elasticsearch".parse::<Backend>().unwrap(), Backend::SearchIndex);
        assert_eq!("index".parse::<Backend>().unwrap(), Backend::SearchIndex);
        assert_eq!("mongo".parse::<Backend>().unwrap_err().kind(), "InvalidQuery");
    }

    #[tokio::test]
    async fn test_blank_query_never_reaches_backend() {
        let records = counting();
        let index = counting();
        let router = QueryRouter::new(records.clone(), index.clone(), Backend::SearchIndex);

        for q in ["", "   ", "\t\n"] {
            let err = router.search(q, None).await.unwrap_err();
            assert_eq!(err.kind(), "InvalidQuery");
        }
        assert_eq!(records.calls.load(Ordering::SeqCst), 0);
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_honors_selector_and_default() {
        let records = counting();
        let index = counting();
        let router = QueryRouter::new(records.clone(), index.clone(), Backend::SearchIndex);

        router.search("camera", None).await.unwrap();
        router.search("camera", Some(Backend::RecordStore)).await.unwrap();
        router.search("camera", Some(Backend::RecordStore)).await.unwrap();

        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
        assert_eq!(records.calls.load(Ordering::SeqCst), 2);
    }
}
