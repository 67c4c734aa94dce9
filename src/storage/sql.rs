// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL record store (SQLite or MySQL through the sqlx `Any` driver).
//!
//! Schema:
//! ```sql
//! CREATE TABLE products (
//!   id INTEGER PRIMARY KEY,   -- BIGINT AUTO_INCREMENT on MySQL
//!   title TEXT,
//!   description TEXT,
//!   price REAL,               -- DOUBLE on MySQL
//!   rating REAL,
//!   image TEXT
//! )
//! ```
//!
//! ## Substring search
//!
//! Matching is case-insensitive with Unicode case folding, the same rule
//! [`Product::contains_text`] applies. MySQL narrows candidates first, with
//! the needle lowered and its `%`/`_` escaped with `!`:
//!
//! ```sql
//! SELECT ... FROM products
//! WHERE LOWER(title) LIKE ? ESCAPE '!' OR LOWER(description) LIKE ? ESCAPE '!'
//! ORDER BY rating DESC, id ASC
//! ```
//!
//! SQLite's `LOWER` and `LIKE` only fold ASCII, so on SQLite every row is a
//! candidate. Candidates are checked in Rust and cut at the limit.
//!
//! `!` is used instead of a backslash because MySQL and SQLite disagree on
//! backslash handling inside string literals.
//!
//! ## sqlx Any Driver Quirks
//!
//! MySQL TEXT columns come back as BLOB through `Any`, so text columns are
//! read as `String` first and then as bytes.

use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tracing::{debug, info};

use crate::product::Product;
use crate::resilience::retry::{retry, RetryConfig};
use super::traits::{RecordStore, StorageError};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

const SELECT_COLUMNS: &str = "SELECT id, title, description, price, rating, image FROM products";

pub struct SqlRecordStore {
    pool: AnyPool,
    is_sqlite: bool,
}

impl SqlRecordStore {
    /// Connect with startup-mode retry (fails fast if config is wrong) and
    /// create the table if needed.
    pub async fn connect(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");
        // Every in-memory SQLite connection is its own database
        let in_memory = is_sqlite && connection_string.contains(":memory:");

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            let options = AnyPoolOptions::new().acquire_timeout(Duration::from_secs(10));
            let options = if in_memory {
                options.max_connections(1).idle_timeout(None).max_lifetime(None)
            } else {
                options
                    .max_connections(if is_sqlite { 5 } else { 20 })
                    .idle_timeout(Duration::from_secs(300))
            };
            options
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))
        })
        .await?;

        let store = Self { pool, is_sqlite };
        store.init_schema().await?;
        info!(sqlite = is_sqlite, "Record store connected");
        Ok(store)
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    /// Close the pool. Waits for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let sql = if self.is_sqlite {
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                price REAL NOT NULL,
                rating REAL NOT NULL,
                image TEXT NOT NULL
            )
            "#
        } else {
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                price DOUBLE NOT NULL,
                rating DOUBLE NOT NULL,
                image VARCHAR(1024) NOT NULL,
                INDEX idx_rating (rating)
            )
            "#
        };

        retry("sql_init_schema", &RetryConfig::startup(), || async {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        Ok(())
    }

    /// Read a text column as String (SQLite) or bytes (MySQL via Any).
    fn text_column(row: &AnyRow, name: &str) -> Result<String, StorageError> {
        row.try_get::<String, _>(name)
            .ok()
            .or_else(|| {
                row.try_get::<Vec<u8>, _>(name)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
            .ok_or_else(|| StorageError::Malformed(format!("column '{}' is not text", name)))
    }

    fn product_from_row(row: &AnyRow) -> Result<Product, StorageError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StorageError::Malformed(format!("column 'id': {}", e)))?;
        let price: f64 = row
            .try_get("price")
            .map_err(|e| StorageError::Malformed(format!("column 'price': {}", e)))?;
        let rating: f64 = row
            .try_get("rating")
            .map_err(|e| StorageError::Malformed(format!("column 'rating': {}", e)))?;

        Ok(Product {
            id,
            title: Self::text_column(row, "title")?,
            description: Self::text_column(row, "description")?,
            price,
            rating,
            image: Self::text_column(row, "image")?,
        })
    }
}

/// Lowercase `needle`, escape LIKE wildcards with `!`, wrap in `%...%`.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '!') {
            pattern.push('!');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    async fn fetch_all(&self) -> Result<Vec<Product>, StorageError> {
        let sql = format!("{} ORDER BY id ASC", SELECT_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.iter().map(Self::product_from_row).collect()
    }

    async fn search_substring(&self, needle: &str, limit: usize) -> Result<Vec<Product>, StorageError> {
        let fetched = if self.is_sqlite {
            // SQLite's LOWER and LIKE only fold ASCII, so every row is a candidate
            let sql = format!("{} ORDER BY rating DESC, id ASC", SELECT_COLUMNS);
            sqlx::query(&sql).fetch_all(&self.pool).await
        } else {
            let pattern = like_pattern(needle);
            let sql = format!(
                "{} WHERE LOWER(title) LIKE ? ESCAPE '!' OR LOWER(description) LIKE ? ESCAPE '!' \
                 ORDER BY rating DESC, id ASC",
                SELECT_COLUMNS
            );
            debug!(pattern = %pattern, "SQL substring prefilter");
            sqlx::query(&sql).bind(&pattern).bind(&pattern).fetch_all(&self.pool).await
        };
        let rows = fetched.map_err(|e| StorageError::Backend(e.to_string()))?;

        let needle_lower = needle.to_lowercase();
        let mut matches = Vec::new();
        for row in &rows {
            if matches.len() >= limit {
                break;
            }
            let product = Self::product_from_row(row)?;
            if product.contains_text(&needle_lower) {
                matches.push(product);
            }
        }
        Ok(matches)
    }

    async fn count_all(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| StorageError::Malformed(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    async fn insert_batch(&self, products: &[Product]) -> Result<usize, StorageError> {
        if products.is_empty() {
            return Ok(0);
        }

        let sql = if self.is_sqlite {
            "INSERT INTO products (id, title, description, price, rating, image)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                price = excluded.price,
                rating = excluded.rating,
                image = excluded.image"
        } else {
            "INSERT INTO products (id, title, description, price, rating, image)
             VALUES (?, ?, ?, ?, ?, ?)
             ON DUPLICATE KEY UPDATE
                title = VALUES(title),
                description = VALUES(description),
                price = VALUES(price),
                rating = VALUES(rating),
                image = VALUES(image)"
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        for product in products {
            sqlx::query(sql)
                .bind(product.id)
                .bind(&product.title)
                .bind(&product.description)
                .bind(product.price)
                .bind(product.rating)
                .bind(&product.image)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        debug!(count = products.len(), "Imported products");
        Ok(products.len())
    }
}
