// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the catalog engine.

use serde::Serialize;

use crate::sync::SyncStatus;

/// Engine lifecycle state.
///
/// Use [`super::CatalogEngine::state()`] to check the current state or
/// [`super::CatalogEngine::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    /// Built, not yet started
    Created,
    /// Seeding the record store and checking index health
    Connecting,
    /// Creating the index if it is missing
    EnsuringSchema,
    /// Startup rebuild in progress
    Reindexing,
    /// Serving requests
    Ready,
    /// Startup failed; the error was returned from `start()`
    Failed,
    /// Graceful shutdown in progress
    ShuttingDown,
    /// Connections released
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Connecting => write!(f, "Connecting"),
            Self::EnsuringSchema => write!(f, "EnsuringSchema"),
            Self::Reindexing => write!(f, "Reindexing"),
            Self::Ready => write!(f, "Ready"),
            Self::Failed => write!(f, "Failed"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Snapshot returned by `/api/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub index_backend: &'static str,
    pub sync: SyncStatus,
}
