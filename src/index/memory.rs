// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process search index.
//!
//! Implements the same contract as the external engines: per-index
//! analyzer, aliases, per-item bulk results, `best_fields` scoring with OR
//! between terms and edit-distance fuzziness. Used by tests and the
//! `memory` deployment.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::json;

use crate::config::SortMode;
use crate::product::Product;
use crate::storage::traits::StorageError;

use super::analysis::{Analyzer, Term};
use super::schema::IndexSchema;
use super::{BulkItemResult, BulkResponse, ClusterHealth, HealthStatus, IndexHit, SearchIndex, TextQuery};

struct StoredDoc {
    product: Product,
    fields: HashMap<String, Vec<Term>>,
}

struct IndexData {
    analyzer: Analyzer,
    text_fields: Vec<String>,
    docs: BTreeMap<String, StoredDoc>,
}

impl IndexData {
    fn analyze_product(&self, product: &Product) -> HashMap<String, Vec<Term>> {
        self.text_fields
            .iter()
            .filter_map(|field| {
                let text = match field.as_str() {
                    "title" => &product.title,
                    "description" => &product.description,
                    _ => return None,
                };
                Some((field.clone(), self.analyzer.analyze(text)))
            })
            .collect()
    }

    fn score(&self, doc: &StoredDoc, query: &TextQuery, terms: &[Term]) -> f64 {
        // best_fields: the single best matching field decides
        query
            .fields
            .iter()
            .filter_map(|field| doc.fields.get(field))
            .map(|tokens| field_score(tokens, terms, query))
            .fold(0.0, f64::max)
    }
}

fn field_score(tokens: &[Term], terms: &[Term], query: &TextQuery) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    for term in terms {
        let max_edits = query.fuzziness.distance_for(&term.raw);
        for token in tokens {
            if token.stem == term.stem {
                total += 1.0;
            } else if max_edits > 0 {
                let distance = strsim::levenshtein(&token.raw, &term.raw);
                if distance <= max_edits {
                    total += 1.0 / (1.0 + distance as f64);
                }
            }
        }
    }
    total / (tokens.len() as f64).sqrt()
}

pub struct MemoryIndex {
    indexes: DashMap<String, IndexData>,
    aliases: RwLock<HashMap<String, String>>,
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            indexes: DashMap::new(),
            aliases: RwLock::new(HashMap::new()),
        }
    }

    fn resolve(&self, name: &str) -> String {
        self.aliases
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Document count behind `name` (alias or index), `None` if missing.
    #[must_use]
    pub fn doc_count(&self, name: &str) -> Option<usize> {
        let target = self.resolve(name);
        self.indexes.get(&target).map(|idx| idx.docs.len())
    }

    /// Ids of every document behind `name`, sorted.
    #[must_use]
    pub fn doc_ids(&self, name: &str) -> Vec<String> {
        let target = self.resolve(name);
        self.indexes
            .get(&target)
            .map(|idx| idx.docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Concrete index names currently held.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.indexes.contains_key(&self.resolve(name)))
    }

    async fn create(&self, name: &str, schema: &IndexSchema) -> Result<(), StorageError> {
        if self.indexes.contains_key(name) || self.aliases.read().contains_key(name) {
            return Err(StorageError::Backend(format!(
                "resource_already_exists_exception: index [{}] already exists",
                name
            )));
        }
        self.indexes.insert(
            name.to_string(),
            IndexData {
                analyzer: Analyzer::new(&schema.synonyms),
                text_fields: schema.text_fields().map(String::from).collect(),
                docs: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        // Deleting through an alias removes the concrete index, like the engines do
        let target = self.resolve(name);
        if self.indexes.remove(&target).is_none() {
            return Err(StorageError::IndexNotFound(name.to_string()));
        }
        self.aliases.write().retain(|_, t| t != &target);
        Ok(())
    }

    async fn bulk_upsert(&self, name: &str, products: &[Product]) -> Result<BulkResponse, StorageError> {
        let target = self.resolve(name);
        let mut index = self
            .indexes
            .get_mut(&target)
            .ok_or_else(|| StorageError::IndexNotFound(name.to_string()))?;

        let mut items = Vec::with_capacity(products.len());
        for product in products {
            let id = product.doc_id();
            let fields = index.analyze_product(product);
            let status = if index.docs.contains_key(&id) { 200 } else { 201 };
            index.docs.insert(
                id.clone(),
                StoredDoc {
                    product: product.clone(),
                    fields,
                },
            );
            items.push(BulkItemResult::ok(id, status));
        }
        Ok(BulkResponse { items })
    }

    async fn search(&self, name: &str, query: &TextQuery) -> Result<Vec<IndexHit>, StorageError> {
        let target = self.resolve(name);
        let index = self
            .indexes
            .get(&target)
            .ok_or_else(|| StorageError::IndexNotFound(name.to_string()))?;

        let terms = index.analyzer.analyze(&query.text);
        let mut hits: Vec<IndexHit> = index
            .docs
            .iter()
            .filter_map(|(id, doc)| {
                let score = index.score(doc, query, &terms);
                (score > 0.0).then(|| IndexHit {
                    id: id.clone(),
                    score: Some(score),
                    product: doc.product.clone(),
                })
            })
            .collect();

        let score = |h: &IndexHit| h.score.unwrap_or(0.0);
        hits.sort_by(|a, b| {
            let (primary, secondary) = match query.sort {
                SortMode::Relevance => (score(b).total_cmp(&score(a)), b.product.rating.total_cmp(&a.product.rating)),
                SortMode::Rating => (b.product.rating.total_cmp(&a.product.rating), score(b).total_cmp(&score(a))),
            };
            match primary {
                Ordering::Equal => secondary,
                other => other,
            }
        });
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn health(&self) -> Result<ClusterHealth, StorageError> {
        Ok(ClusterHealth {
            status: HealthStatus::Green,
            raw: json!({
                "cluster_name": "memory",
                "status": "green",
                "number_of_nodes": 1,
                "active_primary_shards": self.indexes.len(),
            }),
        })
    }

    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.aliases.read().get(alias).cloned().into_iter().collect())
    }

    async fn swap_alias(&self, alias: &str, target: &str, _previous: &[String]) -> Result<(), StorageError> {
        if !self.indexes.contains_key(target) {
            return Err(StorageError::IndexNotFound(target.to_string()));
        }
        if self.indexes.contains_key(alias) {
            return Err(StorageError::Backend(format!(
                "invalid_alias_name_exception: an index exists with the same name as the alias [{}]",
                alias
            )));
        }
        self.aliases.write().insert(alias.to_string(), target.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Fuzziness;

    async fn loaded() -> MemoryIndex {
        let index = MemoryIndex::new();
        let schema = IndexSchema::products(&["mp, megapixel, mega pixels".to_string()]);
        index.create("products", &schema).await.unwrap();
        index
            .bulk_upsert(
                "products",
                &[
                    Product::new(1, "Wireless Headphones", "Noise-cancelling over-ear headphones", 199.99, 4.5, "a"),
                    Product::new(2, "Bluetooth Speaker", "Portable speaker with deep bass", 89.99, 4.3, "b"),
                    Product::new(3, "Digital Camera", "24 MP sensor with 4K video", 549.99, 4.7, "c"),
                    Product::new(4, "Wireless Mouse", "Ergonomic mouse", 29.99, 4.6, "d"),
                ],
            )
            .await
            .unwrap();
        index
    }

    fn ids(hits: &[IndexHit]) -> Vec<i64> {
        hits.iter().map(|h| h.product.id).collect()
    }

    #[tokio::test]
    async fn test_fuzzy_typo_still_matches() {
        let index = loaded().await;
        let hits = index.search("products", &TextQuery::new("wireles")).await.unwrap();
        assert!(ids(&hits).contains(&1));
        assert!(hits.iter().all(|h| h.score.unwrap() > 0.0));
    }

    #[tokio::test]
    async fn test_fuzziness_off_requires_exact_term() {
        let index = loaded().await;
        let query = TextQuery::new("wireles").with_fuzziness(Fuzziness::Off);
        let hits = index.search("products", &query).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_synonyms_expand() {
        let index = loaded().await;
        let hits = index.search("products", &TextQuery::new("megapixel")).await.unwrap();
        assert_eq!(ids(&hits), vec![3]);
    }

    #[tokio::test]
    async fn test_rating_sort() {
        let index = loaded().await;
        let query = TextQuery::new("wireless").with_sort(SortMode::Rating);
        let hits = index.search("products", &query).await.unwrap();
        assert_eq!(ids(&hits), vec![4, 1]);
    }

    #[tokio::test]
    async fn test_bulk_upsert_replaces_by_id() {
        let index = loaded().await;
        let response = index
            .bulk_upsert("products", &[Product::new(2, "Bluetooth Speaker", "Updated", 79.99, 4.4, "b")])
            .await
            .unwrap();
        assert_eq!(response.items[0].status, 200);
        assert_eq!(index.doc_count("products"), Some(4));
    }

    #[tokio::test]
    async fn test_delete_missing_reports_not_found() {
        let index = MemoryIndex::new();
        let err = index.delete("products").await.unwrap_err();
        assert_eq!(err, StorageError::IndexNotFound("products".into()));
    }

    #[tokio::test]
    async fn test_alias_swap_redirects_reads() {
        let index = loaded().await;
        let schema = IndexSchema::products(&[]);
        index.create("catalog-1", &schema).await.unwrap();
        index
            .bulk_upsert("catalog-1", &[Product::new(9, "Wireless Charger", "Pad", 19.0, 4.0, "z")])
            .await
            .unwrap();

        index.swap_alias("catalog", "catalog-1", &[]).await.unwrap();
        assert_eq!(index.alias_targets("catalog").await.unwrap(), vec!["catalog-1"]);

        let hits = index.search("catalog", &TextQuery::new("charger")).await.unwrap();
        assert_eq!(ids(&hits), vec![9]);

        // an alias cannot shadow a concrete index
        assert!(index.swap_alias("products", "catalog-1", &[]).await.is_err());
    }
}
