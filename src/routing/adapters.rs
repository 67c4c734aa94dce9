// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CatalogConfig, SortMode};
use crate::error::CatalogError;
use crate::index::{Fuzziness, SearchIndex, TextQuery};
use crate::product::{order_by_rating, order_by_rating_then_relevance, order_by_relevance, SearchResult};
use crate::resilience::timeout::bounded;
use crate::storage::traits::RecordStore;
use crate::sync::RECORD_STORE_BACKEND;

use super::SearchBackend;

/// Case-insensitive substring match over title and description.
pub struct SubstringScan {
    records: Arc<dyn RecordStore>,
    limit: usize,
    timeout: Duration,
}

impl SubstringScan {
    pub fn new(records: Arc<dyn RecordStore>, limit: usize, timeout: Duration) -> Self {
        Self { records, limit, timeout }
    }
}

#[async_trait]
impl SearchBackend for SubstringScan {
    fn label(&self) -> &'static str {
        RECORD_STORE_BACKEND
    }

    async fn search(&self, text: &str) -> Result<Vec<SearchResult>, CatalogError> {
        let rows = bounded(
            RECORD_STORE_BACKEND,
            "search",
            self.timeout,
            self.records.search_substring(text, self.limit),
        )
        .await?;

        let mut results: Vec<SearchResult> = rows.into_iter().map(SearchResult::unscored).collect();
        order_by_rating(&mut results);
        Ok(results)
    }
}

/// Fuzzy relevance query against the search index.
pub struct AnalyzedIndex {
    index: Arc<dyn SearchIndex>,
    index_name: String,
    sort: SortMode,
    fuzziness: Fuzziness,
    limit: usize,
    timeout: Duration,
}

impl AnalyzedIndex {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        index_name: impl Into<String>,
        sort: SortMode,
        fuzziness: Fuzziness,
        limit: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            index,
            index_name: index_name.into(),
            sort,
            fuzziness,
            limit,
            timeout,
        }
    }

    pub fn from_config(index: Arc<dyn SearchIndex>, config: &CatalogConfig) -> Self {
        Self::new(
            index,
            config.index_name.clone(),
            config.sort_mode,
            config.fuzziness,
            config.result_limit,
            config.backend_timeout(),
        )
    }
}

#[async_trait]
impl SearchBackend for AnalyzedIndex {
    fn label(&self) -> &'static str {
        self.index.backend_name()
    }

    async fn search(&self, text: &str) -> Result<Vec<SearchResult>, CatalogError> {
        let query = TextQuery::new(text)
            .with_fuzziness(self.fuzziness)
            .with_sort(self.sort)
            .with_limit(self.limit);

        let backend = self.index.backend_name();
        let hits = bounded(backend, "search", self.timeout, self.index.search(&self.index_name, &query)).await?;

        // Fail closed: a hit that can't be traced to its row or lacks a score is a protocol error
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            if hit.id != hit.product.doc_id() {
                return Err(CatalogError::unavailable(
                    backend,
                    format!("hit id '{}' does not match product id {}", hit.id, hit.product.id),
                ));
            }
            let score = match hit.score {
                Some(score) if score.is_finite() => score,
                _ => {
                    return Err(CatalogError::unavailable(
                        backend,
                        format!("hit '{}' has no relevance score", hit.id),
                    ))
                }
            };
            results.push(SearchResult::scored(hit.product, score));
        }

        match self.sort {
            SortMode::Relevance => order_by_relevance(&mut results),
            SortMode::Rating => order_by_rating_then_relevance(&mut results),
        }
        Ok(results)
    }
}
