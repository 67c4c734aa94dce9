// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! RediSearch adapter (Redis Stack).
//!
//! Products are stored as RedisJSON documents under `{index}:{id}` and the
//! index covers that prefix:
//!
//! ```text
//! FT.CREATE products ON JSON PREFIX 1 products: LANGUAGE english SCHEMA ...
//! FT.SYNUPDATE products g0 mp megapixel megapixels
//! JSON.SET products:1 $ '{"id":1,"title":"Wireless Headphones",...}'
//! FT.SEARCH products '@title|description:(%%wireles%% | headphones)' WITHSCORES LIMIT 0 100
//! ```
//!
//! Fuzziness uses RediSearch's `%term%` syntax: one `%` pair per allowed edit.

use async_trait::async_trait;
use futures::future::join_all;
use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError, Value};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::SortMode;
use crate::product::Product;
use crate::resilience::retry::{retry, RetryConfig};
use crate::storage::traits::StorageError;

use super::analysis::tokenize_lower;
use super::schema::IndexSchema;
use super::{BulkItemResult, BulkResponse, ClusterHealth, HealthStatus, IndexHit, SearchIndex, TextQuery};

pub struct RediSearchIndex {
    connection: ConnectionManager,
}

impl RediSearchIndex {
    /// Connect with startup-mode retry.
    pub async fn connect(connection_string: &str) -> Result<Self, StorageError> {
        let client = Client::open(connection_string).map_err(|e| StorageError::Connection(e.to_string()))?;

        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: RedisError| StorageError::Connection(e.to_string()))?;

        Ok(Self { connection })
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }

    async fn info(&self, name: &str) -> Result<Value, StorageError> {
        let mut conn = self.conn();
        cmd("FT.INFO")
            .arg(name)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(name, "info", e))
    }
}

fn redis_error(name: &str, operation: &str, err: RedisError) -> StorageError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("unknown index") || lower.contains("no such index") || lower.contains("unknown index name") {
        StorageError::IndexNotFound(name.to_string())
    } else if err.is_timeout() {
        StorageError::Timeout(operation.to_string())
    } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        StorageError::Connection(message)
    } else {
        StorageError::Backend(format!("{} failed: {}", operation, message))
    }
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => String::from_utf8(bytes.clone()).ok(),
        Value::SimpleString(s) => Some(s.clone()),
        Value::Okay => Some("OK".to_string()),
        Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Double(d) => Some(*d),
        Value::Int(i) => Some(*i as f64),
        other => value_string(other).and_then(|s| s.parse().ok()),
    }
}

/// Escape RediSearch query syntax characters in a term.
fn escape_term(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if !c.is_alphanumeric() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build the FT.SEARCH query string; `None` when the text has no terms.
pub(crate) fn build_query(query: &TextQuery) -> Option<String> {
    let terms: Vec<String> = tokenize_lower(&query.text)
        .into_iter()
        .map(|term| {
            let edits = query.fuzziness.distance_for(&term);
            let pad = "%".repeat(edits);
            format!("{pad}{}{pad}", escape_term(&term))
        })
        .collect();

    if terms.is_empty() {
        return None;
    }
    Some(format!("@{}:({})", query.fields.join("|"), terms.join(" | ")))
}

/// Parse an `FT.SEARCH ... WITHSCORES` reply: `[total, key, score, [path, json], ...]`.
pub(crate) fn parse_search_reply(reply: &Value) -> Result<Vec<IndexHit>, StorageError> {
    let items = match reply {
        Value::Array(items) => items,
        other => return Err(StorageError::Malformed(format!("FT.SEARCH reply is not an array: {:?}", other))),
    };
    let (total, rest) = items
        .split_first()
        .ok_or_else(|| StorageError::Malformed("empty FT.SEARCH reply".into()))?;
    if !matches!(total, Value::Int(_)) {
        return Err(StorageError::Malformed("FT.SEARCH reply without a total".into()));
    }
    if rest.len() % 3 != 0 {
        return Err(StorageError::Malformed(format!(
            "FT.SEARCH reply has {} trailing entries, expected key/score/fields triples",
            rest.len()
        )));
    }

    rest.chunks(3)
        .map(|chunk| {
            let key = value_string(&chunk[0])
                .ok_or_else(|| StorageError::Malformed("hit key is not a string".into()))?;
            let score = value_f64(&chunk[1])
                .ok_or_else(|| StorageError::Malformed(format!("hit '{}' has no numeric score", key)))?;
            let fields = match &chunk[2] {
                Value::Array(fields) => fields,
                _ => return Err(StorageError::Malformed(format!("hit '{}' has no field list", key))),
            };
            let json_doc = fields
                .chunks(2)
                .find(|pair| pair.len() == 2 && value_string(&pair[0]).as_deref() == Some("$"))
                .and_then(|pair| value_string(&pair[1]))
                .ok_or_else(|| StorageError::Malformed(format!("hit '{}' has no JSON document", key)))?;
            let product: Product = serde_json::from_str(&json_doc)
                .map_err(|e| StorageError::Malformed(format!("hit '{}': {}", key, e)))?;

            let id = key.rsplit(':').next().unwrap_or(&key).to_string();
            Ok(IndexHit {
                id,
                score: Some(score),
                product,
            })
        })
        .collect()
}

/// Read `index_name` out of an `FT.INFO` reply.
fn info_index_name(reply: &Value) -> Option<String> {
    match reply {
        Value::Array(items) => items
            .chunks(2)
            .find(|pair| pair.len() == 2 && value_string(&pair[0]).as_deref() == Some("index_name"))
            .and_then(|pair| value_string(&pair[1])),
        Value::Map(pairs) => pairs
            .iter()
            .find(|(k, _)| value_string(k).as_deref() == Some("index_name"))
            .and_then(|(_, v)| value_string(v)),
        _ => None,
    }
}

#[async_trait]
impl SearchIndex for RediSearchIndex {
    fn backend_name(&self) -> &'static str {
        "redisearch"
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        match self.info(name).await {
            Ok(_) => Ok(true),
            Err(StorageError::IndexNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, name: &str, schema: &IndexSchema) -> Result<(), StorageError> {
        let mut conn = self.conn();
        let args = schema.to_ft_create_args(name);
        let _: () = cmd("FT.CREATE")
            .arg(&args)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(name, "create", e))?;

        for (i, group) in schema.synonyms.iter().enumerate() {
            let terms: Vec<String> = group
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            let _: () = cmd("FT.SYNUPDATE")
                .arg(name)
                .arg(format!("g{}", i))
                .arg(&terms)
                .query_async(&mut conn)
                .await
                .map_err(|e| redis_error(name, "create", e))?;
        }

        debug!(index = %name, "RediSearch index created");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let mut conn = self.conn();
        let _: () = cmd("FT.DROPINDEX")
            .arg(name)
            .arg("DD")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(name, "delete", e))?;
        Ok(())
    }

    async fn bulk_upsert(&self, name: &str, products: &[Product]) -> Result<BulkResponse, StorageError> {
        let prefix = IndexSchema::doc_prefix(name);

        let writes = products.iter().map(|product| {
            let mut conn = self.conn();
            let key = format!("{}{}", prefix, product.id);
            let id = product.doc_id();
            let doc = serde_json::to_string(product);
            async move {
                let doc = match doc {
                    Ok(doc) => doc,
                    Err(e) => return (id, Err(StorageError::Malformed(e.to_string()))),
                };
                let result: Result<(), RedisError> = cmd("JSON.SET")
                    .arg(&key)
                    .arg("$")
                    .arg(doc)
                    .query_async(&mut conn)
                    .await;
                (id, result.map_err(|e| redis_error(&key, "bulk", e)))
            }
        });

        let outcomes = join_all(writes).await;

        // A dead connection fails every item; report that as a request failure
        if !outcomes.is_empty() && outcomes.iter().all(|(_, r)| matches!(r, Err(StorageError::Connection(_)))) {
            if let Some((_, Err(e))) = outcomes.into_iter().next() {
                return Err(e);
            }
            return Err(StorageError::Connection("bulk write failed".into()));
        }

        let items: Vec<BulkItemResult> = outcomes
            .into_iter()
            .map(|(id, result)| match result {
                Ok(()) => BulkItemResult::ok(id, 201),
                Err(e) => BulkItemResult::failed(id, 500, e.to_string()),
            })
            .collect();

        let failed = items.iter().filter(|i| !i.is_success()).count();
        if failed > 0 {
            warn!(index = %name, failed, "JSON.SET failed for some documents");
        }
        Ok(BulkResponse { items })
    }

    async fn search(&self, name: &str, query: &TextQuery) -> Result<Vec<IndexHit>, StorageError> {
        let Some(query_str) = build_query(query) else {
            return Ok(Vec::new());
        };
        debug!(index = %name, query = %query_str, "FT.SEARCH");

        let mut command = cmd("FT.SEARCH");
        command
            .arg(name)
            .arg(&query_str)
            .arg("WITHSCORES")
            .arg("LIMIT")
            .arg(0)
            .arg(query.limit);
        if query.sort == SortMode::Rating {
            command.arg("SORTBY").arg("rating").arg("DESC");
        }
        command.arg("DIALECT").arg(2);

        let mut conn = self.conn();
        let reply: Value = command
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(name, "search", e))?;

        parse_search_reply(&reply)
    }

    /// `PING` decides the status. The payload is the server's `INFO server`
    /// section as key/value pairs, with `status` added since Redis has no
    /// cluster traffic light of its own.
    async fn health(&self) -> Result<ClusterHealth, StorageError> {
        let mut conn = self.conn();
        let pong: String = cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("_cluster", "health", e))?;
        let info: String = cmd("INFO")
            .arg("server")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("_cluster", "health", e))?;

        let status = if pong == "PONG" { HealthStatus::Green } else { HealthStatus::Red };
        let mut raw = parse_info(&info);
        raw.insert("status".to_string(), json!(status));
        Ok(ClusterHealth {
            status,
            raw: serde_json::Value::Object(raw),
        })
    }

    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, StorageError> {
        match self.info(alias).await {
            Ok(reply) => Ok(info_index_name(&reply)
                .filter(|index| index != alias)
                .into_iter()
                .collect()),
            Err(StorageError::IndexNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn swap_alias(&self, alias: &str, target: &str, _previous: &[String]) -> Result<(), StorageError> {
        // FT.ALIASUPDATE moves the alias off its old index atomically
        let mut conn = self.conn();
        let _: () = cmd("FT.ALIASUPDATE")
            .arg(alias)
            .arg(target)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(target, "alias", e))?;
        debug!(alias = %alias, target = %target, "Alias swapped");
        Ok(())
    }
}

/// `INFO` text (`# Section` headers, `key:value` lines) as a JSON object.
pub(crate) fn parse_info(text: &str) -> serde_json::Map<String, serde_json::Value> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.to_string(), json!(value)))
        .collect()
}
