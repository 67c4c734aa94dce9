// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Product records and the normalized search result.
//!
//! [`Product`] is the only domain entity. Its `id` is assigned by the record
//! store and reused verbatim as the search index document id, which is what
//! lets a hit be traced back to its row and makes a full rebuild idempotent.
//!
//! # Example
//!
//! ```
//! use catalog_sync::{Product, SearchResult};
//!
//! let product = Product::new(1, "Wireless Headphones", "Noise-cancelling", 199.99, 4.5, "img/1.png");
//! let hit = SearchResult::scored(product.clone(), 2.3);
//! assert_eq!(hit.id, 1);
//! assert_eq!(hit.score, Some(2.3));
//!
//! let row = SearchResult::unscored(product);
//! assert!(row.score.is_none());
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A catalog product as stored in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Row id; also the document id in the search index.
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    /// 0.0 - 5.0, used as a sort key.
    pub rating: f64,
    /// Opaque image reference (never analyzed).
    pub image: String,
}

impl Product {
    pub fn new(
        id: i64,
        title: impl Into<String>,
        description: impl Into<String>,
        price: f64,
        rating: f64,
        image: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            price,
            rating,
            image: image.into(),
        }
    }

    /// Document id used in the search index.
    #[must_use]
    pub fn doc_id(&self) -> String {
        self.id.to_string()
    }

    /// Case-insensitive substring match on title or description.
    #[must_use]
    pub fn contains_text(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
    }
}

/// Normalized unit returned by the query router regardless of backend.
///
/// `score` is only present for relevance-ranked backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub rating: f64,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchResult {
    /// Result from a relevance-ranked backend.
    pub fn scored(product: Product, score: f64) -> Self {
        Self::with_score(product, Some(score))
    }

    /// Result from a substring-match backend.
    pub fn unscored(product: Product) -> Self {
        Self::with_score(product, None)
    }

    pub fn with_score(product: Product, score: Option<f64>) -> Self {
        Self {
            id: product.id,
            title: product.title,
            description: product.description,
            price: product.price,
            rating: product.rating,
            image: product.image,
            score,
        }
    }
}

/// Descending by rating. Stable, so equal ratings keep backend order.
pub fn order_by_rating(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.rating.total_cmp(&a.rating));
}

/// Descending by score, ties broken by descending rating.
pub fn order_by_relevance(results: &mut [SearchResult]) {
    results.sort_by(|a, b| match score_of(b).total_cmp(&score_of(a)) {
        Ordering::Equal => b.rating.total_cmp(&a.rating),
        other => other,
    });
}

/// Descending by rating, ties broken by descending score.
pub fn order_by_rating_then_relevance(results: &mut [SearchResult]) {
    results.sort_by(|a, b| match b.rating.total_cmp(&a.rating) {
        Ordering::Equal => score_of(b).total_cmp(&score_of(a)),
        other => other,
    });
}

fn score_of(result: &SearchResult) -> f64 {
    result.score.unwrap_or(0.0)
}

/// The demo catalog loaded into an empty record store by the seed step.
#[must_use]
pub fn demo_catalog() -> Vec<Product> {
    let rows: [(&str, &str, f64, f64); 20] = [
        ("Wireless Headphones", "High-quality noise-cancelling headphones", 199.99, 4.5),
        ("Bluetooth Speaker", "Portable speaker with deep bass", 89.99, 4.3),
        ("Smartphone Stand", "Adjustable stand for smartphones and tablets", 15.99, 4.7),
        ("Mechanical Keyboard", "RGB backlit mechanical keyboard", 109.99, 4.8),
        ("Wireless Mouse", "Ergonomic wireless mouse with precision tracking", 29.99, 4.6),
        ("Laptop Cooling Pad", "Cooling pad with adjustable fan speeds", 25.99, 4.4),
        ("4K Monitor", "27-inch 4K UHD monitor with HDR support", 349.99, 4.7),
        ("USB-C Hub", "Multi-port hub with USB-C, HDMI, and Ethernet", 49.99, 4.2),
        ("Electric Kettle", "Stainless steel electric kettle with auto shut-off", 39.99, 4.5),
        ("Espresso Machine", "Compact espresso machine with milk frother", 129.99, 4.9),
        ("Air Fryer", "Digital air fryer with pre-set cooking programs", 99.99, 4.8),
        ("Vacuum Cleaner", "Cordless vacuum cleaner with powerful suction", 149.99, 4.6),
        ("Cookware Set", "Non-stick cookware set with 10 pieces", 79.99, 4.3),
        ("Digital Camera", "Compact digital camera with 20MP sensor", 299.99, 4.7),
        ("Bluetooth Earbuds", "In-ear wireless earbuds with charging case", 49.99, 4.4),
        ("Smart Watch", "Water-resistant smartwatch with heart rate monitor", 199.99, 4.5),
        ("Fitness Tracker", "Slim fitness band with sleep and step tracking", 59.99, 4.1),
        ("Portable Charger", "10000mAh power bank with fast charging", 35.99, 4.6),
        ("Gaming Headset", "Surround sound gaming headset with microphone", 79.99, 4.4),
        ("Action Camera", "Waterproof 4K action camera with 12 megapixel stills", 179.99, 4.3),
    ];

    rows.iter()
        .enumerate()
        .map(|(i, (title, description, price, rating))| {
            let id = i as i64 + 1;
            Product::new(
                id,
                *title,
                *description,
                *price,
                *rating,
                format!("https://picsum.photos/300/200?random={}", id),
            )
        })
        .collect()
}
