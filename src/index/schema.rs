// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index schema: analyzer chain and field mappings.
//!
//! One definition renders to both engine dialects.
//!
//! # Elasticsearch
//!
//! ```text
//! PUT /products
//! {
//!   "settings": { "analysis": {
//!     "filter":   { "catalog_synonyms": {...}, "catalog_snowball": {...} },
//!     "analyzer": { "catalog_text": { "tokenizer": "standard",
//!                   "filter": ["lowercase", "catalog_synonyms", "catalog_snowball"] } } } },
//!   "mappings": { "properties": { "title": { "type": "text", "analyzer": "catalog_text" }, ... } }
//! }
//! ```
//!
//! # RediSearch
//!
//! ```text
//! FT.CREATE products
//!   ON JSON
//!   PREFIX 1 products:
//!   LANGUAGE english
//!   SCHEMA
//!     $.id AS id NUMERIC
//!     $.title AS title TEXT
//!     $.rating AS rating NUMERIC SORTABLE
//!     $.image AS image TAG
//! ```

use serde_json::{json, Map, Value};

pub const ANALYZER_NAME: &str = "catalog_text";
const SYNONYM_FILTER: &str = "catalog_synonyms";
const STEMMER_FILTER: &str = "catalog_snowball";

/// Field types the catalog schema uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Analyzed full text
    Text,
    /// Integer (document id)
    Integer,
    /// Floating point (price, rating)
    Float,
    /// Opaque, unanalyzed string
    Keyword,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
    pub sortable: bool,
}

impl SchemaField {
    fn es_mapping(&self) -> Value {
        match self.field_type {
            FieldType::Text => json!({ "type": "text", "analyzer": ANALYZER_NAME }),
            FieldType::Integer => json!({ "type": "long" }),
            FieldType::Float => json!({ "type": "float" }),
            FieldType::Keyword => json!({ "type": "keyword" }),
        }
    }

    fn ft_schema_args(&self) -> Vec<String> {
        let ft_type = match self.field_type {
            FieldType::Text => "TEXT",
            FieldType::Integer | FieldType::Float => "NUMERIC",
            FieldType::Keyword => "TAG",
        };

        let mut args = vec![
            format!("$.{}", self.name),
            "AS".to_string(),
            self.name.clone(),
            ft_type.to_string(),
        ];
        if self.sortable {
            args.push("SORTABLE".to_string());
        }
        args
    }
}

/// Analyzer and mapping definition applied when an index is created.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSchema {
    pub fields: Vec<SchemaField>,
    /// Solr-format synonym groups
    pub synonyms: Vec<String>,
    /// Snowball stemmer language
    pub language: String,
}

impl IndexSchema {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            synonyms: Vec::new(),
            language: "english".to_string(),
        }
    }

    /// The product catalog schema.
    pub fn products(synonyms: &[String]) -> Self {
        Self::new()
            .integer("id")
            .text("title")
            .text("description")
            .float("price")
            .float_sortable("rating")
            .keyword("image")
            .with_synonyms(synonyms.iter().cloned())
    }

    fn push(mut self, name: impl Into<String>, field_type: FieldType, sortable: bool) -> Self {
        self.fields.push(SchemaField {
            name: name.into(),
            field_type,
            sortable,
        });
        self
    }

    /// Add an analyzed text field
    pub fn text(self, name: impl Into<String>) -> Self {
        self.push(name, FieldType::Text, false)
    }

    /// Add a 64-bit integer field
    pub fn integer(self, name: impl Into<String>) -> Self {
        self.push(name, FieldType::Integer, false)
    }

    /// Add a float field
    pub fn float(self, name: impl Into<String>) -> Self {
        self.push(name, FieldType::Float, false)
    }

    /// Add a sortable float field
    pub fn float_sortable(self, name: impl Into<String>) -> Self {
        self.push(name, FieldType::Float, true)
    }

    /// Add an unanalyzed keyword field
    pub fn keyword(self, name: impl Into<String>) -> Self {
        self.push(name, FieldType::Keyword, false)
    }

    pub fn with_synonyms<I: IntoIterator<Item = String>>(mut self, synonyms: I) -> Self {
        self.synonyms.extend(synonyms);
        self
    }

    /// Names of the analyzed text fields
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::Text)
            .map(|f| f.name.as_str())
    }

    /// Body for `PUT /<index>`.
    pub fn to_es_body(&self) -> Value {
        let mut filters = Map::new();
        let mut chain = vec![json!("lowercase")];

        if !self.synonyms.is_empty() {
            filters.insert(
                SYNONYM_FILTER.to_string(),
                json!({ "type": "synonym", "synonyms": self.synonyms }),
            );
            chain.push(json!(SYNONYM_FILTER));
        }

        filters.insert(
            STEMMER_FILTER.to_string(),
            json!({ "type": "snowball", "language": capitalize(&self.language) }),
        );
        chain.push(json!(STEMMER_FILTER));

        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.es_mapping()))
            .collect();

        json!({
            "settings": {
                "analysis": {
                    "filter": filters,
                    "analyzer": {
                        ANALYZER_NAME: {
                            "type": "custom",
                            "tokenizer": "standard",
                            "filter": chain
                        }
                    }
                }
            },
            "mappings": { "properties": properties }
        })
    }

    /// Key prefix covered by a RediSearch index of this name.
    pub fn doc_prefix(index_name: &str) -> String {
        format!("{}:", index_name)
    }

    /// Arguments for `FT.CREATE`.
    pub fn to_ft_create_args(&self, index_name: &str) -> Vec<String> {
        let mut args = vec![
            index_name.to_string(),
            "ON".to_string(),
            "JSON".to_string(),
            "PREFIX".to_string(),
            "1".to_string(),
            Self::doc_prefix(index_name),
            "LANGUAGE".to_string(),
            self.language.clone(),
            "SCHEMA".to_string(),
        ];

        for field in &self.fields {
            args.extend(field.ft_schema_args());
        }

        args
    }
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self::new()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
