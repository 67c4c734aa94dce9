// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Analyzed text query passed to a [`SearchIndex`](super::SearchIndex).
//!
//! # Example
//!
//! ```
//! use catalog_sync::index::{Fuzziness, TextQuery};
//! use catalog_sync::config::SortMode;
//!
//! let query = TextQuery::new("wireles headphones")
//!     .with_sort(SortMode::Rating)
//!     .with_limit(10);
//!
//! assert_eq!(query.fields, vec!["title", "description"]);
//! assert_eq!(query.fuzziness, Fuzziness::Auto);
//! assert_eq!(query.terms().count(), 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::config::SortMode;

/// Typo tolerance for analyzed queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fuzziness {
    /// Edit distance scaled by term length: 0 for 1-2 chars, 1 for 3-5, 2 beyond
    #[default]
    Auto,
    /// Exact term matches only
    #[serde(rename = "none")]
    Off,
    /// Fixed edit distance (capped at 2)
    Edits(u8),
}

impl Fuzziness {
    pub const MAX_EDITS: u8 = 2;

    /// Allowed edit distance for one query term.
    #[must_use]
    pub fn distance_for(&self, term: &str) -> usize {
        match self {
            Self::Off => 0,
            Self::Edits(n) => (*n).min(Self::MAX_EDITS) as usize,
            Self::Auto => match term.chars().count() {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
        }
    }

    /// Elasticsearch `fuzziness` parameter.
    #[must_use]
    pub fn as_es_param(&self) -> String {
        match self {
            Self::Auto => "AUTO".to_string(),
            Self::Off => "0".to_string(),
            Self::Edits(n) => (*n).min(Self::MAX_EDITS).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextQuery {
    /// Raw query text, already trimmed and non-empty
    pub text: String,
    /// Fields matched with `best_fields` semantics and OR between terms
    pub fields: Vec<String>,
    pub fuzziness: Fuzziness,
    pub sort: SortMode,
    pub limit: usize,
}

impl TextQuery {
    pub const DEFAULT_LIMIT: usize = 100;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fields: vec!["title".to_string(), "description".to_string()],
            fuzziness: Fuzziness::Auto,
            sort: SortMode::Relevance,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_fuzziness(mut self, fuzziness: Fuzziness) -> Self {
        self.fuzziness = fuzziness;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Whitespace-separated terms of the raw text
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.text.split_whitespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_fuzziness_scales_with_length() {
        let f = Fuzziness::Auto;
        assert_eq!(f.distance_for("tv"), 0);
        assert_eq!(f.distance_for("mouse"), 1);
        assert_eq!(f.distance_for("wireles"), 2);
    }

    #[test]
    fn test_fixed_fuzziness_is_capped() {
        assert_eq!(Fuzziness::Edits(5).distance_for("x"), 2);
        assert_eq!(Fuzziness::Edits(1).as_es_param(), "1");
        assert_eq!(Fuzziness::Off.distance_for("headphones"), 0);
    }

    #[test]
    fn test_fuzziness_serde_names() {
        let auto: Fuzziness = serde_json::from_str(r#""auto""#).unwrap();
        assert_eq!(auto, Fuzziness::Auto);
        let off: Fuzziness = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(off, Fuzziness::Off);
        let fixed: Fuzziness = serde_json::from_str(r#"{"edits": 1}"#).unwrap();
        assert_eq!(fixed, Fuzziness::Edits(1));
    }
}
