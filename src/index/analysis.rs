// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Text analysis for the in-process index.
//!
//! Mirrors the chain configured on the external engines:
//!
//! ```text
//! "Mega Pixels camera"
//!     │ tokenize (split on non-alphanumerics)
//!     ▼
//! ["Mega", "Pixels", "camera"]
//!     │ lowercase
//!     ▼
//! ["mega", "pixels", "camera"]
//!     │ synonyms (multi-word aware, longest variant first)
//!     ▼
//! ["mp", "camera"]
//!     │ snowball english
//!     ▼
//! [Term{raw:"mp", stem:"mp"}, Term{raw:"camera", stem:"camera"}]
//! ```

use rust_stemmers::{Algorithm, Stemmer};

/// One analyzed token. `raw` is kept for edit-distance matching; `stem`
/// for exact matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub raw: String,
    pub stem: String,
}

#[derive(Debug, Clone)]
struct SynonymGroup {
    canonical: String,
    /// Token sequences, longest first
    variants: Vec<Vec<String>>,
}

pub struct Analyzer {
    stemmer: Stemmer,
    synonyms: Vec<SynonymGroup>,
}

impl Analyzer {
    /// Build from synonym groups in Solr format ("mp, megapixel, mega pixels").
    pub fn new(synonym_rules: &[String]) -> Self {
        let synonyms = synonym_rules
            .iter()
            .filter_map(|rule| {
                let mut variants: Vec<Vec<String>> = rule
                    .split(',')
                    .map(tokenize_lower)
                    .filter(|tokens| !tokens.is_empty())
                    .collect();
                let canonical = variants.first()?.join(" ");
                variants.sort_by(|a, b| b.len().cmp(&a.len()));
                variants.dedup();
                Some(SynonymGroup { canonical, variants })
            })
            .collect();

        Self {
            stemmer: Stemmer::create(Algorithm::English),
            synonyms,
        }
    }

    /// Run the full chain over `text`.
    pub fn analyze(&self, text: &str) -> Vec<Term> {
        let tokens = tokenize_lower(text);
        self.apply_synonyms(&tokens)
            .into_iter()
            .map(|raw| {
                let stem = self.stemmer.stem(&raw).into_owned();
                Term { raw, stem }
            })
            .collect()
    }

    fn apply_synonyms(&self, tokens: &[String]) -> Vec<String> {
        if self.synonyms.is_empty() {
            return tokens.to_vec();
        }

        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        'outer: while i < tokens.len() {
            for group in &self.synonyms {
                for variant in &group.variants {
                    if tokens[i..].starts_with(variant) {
                        out.push(group.canonical.clone());
                        i += variant.len();
                        continue 'outer;
                    }
                }
            }
            out.push(tokens[i].clone());
            i += 1;
        }
        out
    }
}

/// Standard-tokenizer approximation: alphanumeric runs, lowercased.
pub fn tokenize_lower(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
