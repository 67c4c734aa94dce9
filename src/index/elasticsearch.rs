// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Elasticsearch adapter over the REST API.
//!
//! | Operation | Request |
//! |---|---|
//! | exists | `HEAD /{index}` |
//! | create | `PUT /{index}` with [`IndexSchema::to_es_body`] |
//! | delete | `DELETE /{index}` (404 `index_not_found_exception` → `IndexNotFound`) |
//! | bulk_upsert | `POST /{index}/_bulk?refresh=true` (NDJSON, `_id` = product id) |
//! | search | `POST /{index}/_search` with `multi_match` / `best_fields` |
//! | health | `GET /_cluster/health` |
//! | aliases | `GET /_alias/{alias}`, `POST /_aliases` |
//!
//! Responses are decoded into typed shapes; anything that does not fit is
//! reported as [`StorageError::Malformed`] rather than passed through.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::SortMode;
use crate::product::Product;
use crate::storage::traits::StorageError;

use super::schema::IndexSchema;
use super::{BulkItemResult, BulkResponse, ClusterHealth, HealthStatus, IndexHit, SearchIndex, TextQuery};

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorCause,
}

#[derive(Debug, Deserialize)]
struct ErrorCause {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    reason: Option<String>,
}

impl ErrorCause {
    fn describe(&self) -> String {
        match &self.reason {
            Some(reason) => format!("{}: {}", self.kind, reason),
            None => self.kind.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkBody {
    items: Vec<std::collections::HashMap<String, BulkItemBody>>,
}

#[derive(Debug, Deserialize)]
struct BulkItemBody {
    #[serde(rename = "_id")]
    id: String,
    status: u16,
    #[serde(default)]
    error: Option<ErrorCause>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    hits: HitsBody,
}

#[derive(Debug, Deserialize)]
struct HitsBody {
    hits: Vec<HitBody>,
}

#[derive(Debug, Deserialize)]
struct HitBody {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Product,
}

pub struct ElasticsearchIndex {
    client: Client,
    base_url: String,
}

impl ElasticsearchIndex {
    /// Build a client for `base_url`. No request is made until first use.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}/{}", self.base_url, path))
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, StorageError> {
        request.send().await.map_err(|e| transport_error(operation, e))
    }

    async fn decode<T: serde::de::DeserializeOwned>(operation: &str, response: Response) -> Result<T, StorageError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(operation, e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Malformed(format!("{} response: {}", operation, e)))
    }

    /// Turn a non-success response into a StorageError, keeping the engine's reason.
    async fn failure(name: &str, operation: &str, response: Response) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let cause = serde_json::from_str::<ErrorEnvelope>(&body).ok().map(|e| e.error);

        match cause {
            Some(cause) if cause.kind == "index_not_found_exception" => {
                StorageError::IndexNotFound(name.to_string())
            }
            Some(cause) => StorageError::Backend(format!("{} failed ({}): {}", operation, status, cause.describe())),
            None if status == StatusCode::NOT_FOUND => StorageError::IndexNotFound(name.to_string()),
            None => StorageError::Backend(format!("{} failed ({}): {}", operation, status, body)),
        }
    }

    pub(crate) fn bulk_body(name: &str, products: &[Product]) -> Result<String, StorageError> {
        let mut body = String::new();
        for product in products {
            let action = json!({ "index": { "_index": name, "_id": product.doc_id() } });
            let source = serde_json::to_string(product).map_err(|e| StorageError::Backend(e.to_string()))?;
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&source);
            body.push('\n');
        }
        Ok(body)
    }

    pub(crate) fn search_body(query: &TextQuery) -> Value {
        let mut multi_match = json!({
            "query": query.text,
            "fields": query.fields,
            "operator": "or",
            "type": "best_fields",
        });
        multi_match["fuzziness"] = json!(query.fuzziness.as_es_param());

        let mut body = json!({
            "size": query.limit,
            "query": { "multi_match": multi_match },
        });

        if query.sort == SortMode::Rating {
            body["sort"] = json!([{ "rating": { "order": "desc" } }, "_score"]);
            body["track_scores"] = json!(true);
        }
        body
    }
}

fn transport_error(operation: &str, err: reqwest::Error) -> StorageError {
    if err.is_timeout() {
        StorageError::Timeout(operation.to_string())
    } else if err.is_connect() {
        StorageError::Connection(err.to_string())
    } else if err.is_decode() {
        StorageError::Malformed(err.to_string())
    } else {
        StorageError::Backend(err.to_string())
    }
}

fn parse_bulk(products: &[Product], body: BulkBody) -> Result<BulkResponse, StorageError> {
    if body.items.len() != products.len() {
        return Err(StorageError::Malformed(format!(
            "bulk response has {} items for {} documents",
            body.items.len(),
            products.len()
        )));
    }

    let items = body
        .items
        .into_iter()
        .map(|mut entry| {
            let item = entry
                .remove("index")
                .ok_or_else(|| StorageError::Malformed("bulk item without 'index' action".into()))?;
            Ok(match item.error {
                Some(cause) => BulkItemResult::failed(item.id, item.status, cause.describe()),
                None => BulkItemResult::ok(item.id, item.status),
            })
        })
        .collect::<Result<Vec<_>, StorageError>>()?;

    Ok(BulkResponse { items })
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    fn backend_name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let response = self.send("exists", self.request(Method::HEAD, name)).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(StorageError::Backend(format!("exists check on '{}' returned {}", name, s))),
        }
    }

    async fn create(&self, name: &str, schema: &IndexSchema) -> Result<(), StorageError> {
        let response = self
            .send("create", self.request(Method::PUT, name).json(&schema.to_es_body()))
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(name, "create", response).await);
        }
        debug!(index = %name, "Elasticsearch index created");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let response = self.send("delete", self.request(Method::DELETE, name)).await?;
        if !response.status().is_success() {
            return Err(Self::failure(name, "delete", response).await);
        }
        debug!(index = %name, "Elasticsearch index deleted");
        Ok(())
    }

    async fn bulk_upsert(&self, name: &str, products: &[Product]) -> Result<BulkResponse, StorageError> {
        if products.is_empty() {
            return Ok(BulkResponse::default());
        }

        let body = Self::bulk_body(name, products)?;
        let request = self
            .request(Method::POST, &format!("{}/_bulk?refresh=true", name))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);

        let response = self.send("bulk", request).await?;
        if !response.status().is_success() {
            return Err(Self::failure(name, "bulk", response).await);
        }

        let parsed = parse_bulk(products, Self::decode("bulk", response).await?)?;
        let failed = parsed.items.len() - parsed.succeeded();
        if failed > 0 {
            warn!(index = %name, failed, "Bulk request had per-document failures");
        }
        Ok(parsed)
    }

    async fn search(&self, name: &str, query: &TextQuery) -> Result<Vec<IndexHit>, StorageError> {
        let request = self
            .request(Method::POST, &format!("{}/_search", name))
            .json(&Self::search_body(query));

        let response = self.send("search", request).await?;
        if !response.status().is_success() {
            return Err(Self::failure(name, "search", response).await);
        }

        let body: SearchBody = Self::decode("search", response).await?;
        Ok(body
            .hits
            .hits
            .into_iter()
            .map(|hit| IndexHit {
                id: hit.id,
                score: hit.score,
                product: hit.source,
            })
            .collect())
    }

    async fn health(&self) -> Result<ClusterHealth, StorageError> {
        let response = self
            .send("health", self.request(Method::GET, "_cluster/health"))
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure("_cluster", "health", response).await);
        }

        let raw: Value = Self::decode("health", response).await?;
        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .and_then(HealthStatus::parse)
            .ok_or_else(|| StorageError::Malformed("cluster health without a status".into()))?;
        Ok(ClusterHealth { status, raw })
    }

    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, StorageError> {
        let response = self
            .send("alias", self.request(Method::GET, &format!("_alias/{}", alias)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Self::failure(alias, "alias", response).await);
        }

        let body: serde_json::Map<String, Value> = Self::decode("alias", response).await?;
        let mut targets: Vec<String> = body.into_iter().map(|(index, _)| index).collect();
        targets.sort();
        Ok(targets)
    }

    async fn swap_alias(&self, alias: &str, target: &str, previous: &[String]) -> Result<(), StorageError> {
        let mut actions: Vec<Value> = previous
            .iter()
            .filter(|p| p.as_str() != target)
            .map(|p| json!({ "remove": { "index": p, "alias": alias } }))
            .collect();
        actions.push(json!({ "add": { "index": target, "alias": alias } }));

        let response = self
            .send(
                "alias",
                self.request(Method::POST, "_aliases").json(&json!({ "actions": actions })),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(target, "alias", response).await);
        }
        debug!(alias = %alias, target = %target, "Alias swapped");
        Ok(())
    }
}
