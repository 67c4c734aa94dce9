// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Caller-facing error taxonomy.
//!
//! Adapters report [`StorageError`]; the synchronizer, router and health
//! reporter surface [`CatalogError`]. Every variant carries enough detail
//! for the caller to decide on remediation. Nothing here is retried
//! automatically.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::storage::traits::StorageError;

/// One document rejected by a bulk upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFailure {
    /// Document id (the product id)
    pub id: String,
    /// Per-item status code reported by the index
    pub status: u16,
    /// Backend error detail
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Client input error. Never reaches a backend.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Connectivity or protocol failure, including malformed responses.
    #[error("Backend unavailable ({backend}): {message}")]
    BackendUnavailable { backend: String, message: String },

    /// A backend call exceeded its bounded wait.
    #[error("Backend timeout: '{operation}' did not complete within {after:?}")]
    BackendTimeout { operation: String, after: Duration },

    /// Some documents were rejected. The rest stay committed.
    #[error("Failed to index {} of {submitted} products into '{index}'", .failures.len())]
    PartialIndexFailure {
        index: String,
        submitted: usize,
        indexed: usize,
        failures: Vec<DocumentFailure>,
    },

    /// Another rebuild holds the guard for this index name.
    #[error("A rebuild of '{index}' is already in progress")]
    RebuildInProgress { index: String },
}

impl CatalogError {
    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Attach the backend name to an adapter error. `limit` is the bound
    /// the call was running under, reported when the adapter itself timed out.
    pub fn from_storage(backend: &str, err: StorageError, limit: Duration) -> Self {
        match err {
            StorageError::Timeout(operation) => Self::BackendTimeout {
                operation,
                after: limit,
            },
            other => Self::unavailable(backend, other.to_string()),
        }
    }

    /// Short machine-readable name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidQuery(_) => "InvalidQuery",
            Self::BackendUnavailable { .. } => "BackendUnavailable",
            Self::BackendTimeout { .. } => "BackendTimeout",
            Self::PartialIndexFailure { .. } => "PartialIndexFailure",
            Self::RebuildInProgress { .. } => "RebuildInProgress",
        }
    }
}
