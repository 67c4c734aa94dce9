// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error-to-status mapping.
//!
//! | Error | Status |
//! |---|---|
//! | `InvalidQuery` | 400 |
//! | `RebuildInProgress` | 409 |
//! | `BackendUnavailable`, `BackendTimeout`, `PartialIndexFailure` | 500 |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::CatalogError;

impl CatalogError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::RebuildInProgress { .. } => StatusCode::CONFLICT,
            Self::BackendUnavailable { .. } | Self::BackendTimeout { .. } | Self::PartialIndexFailure { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> Value {
        match self {
            Self::InvalidQuery(reason) => json!({ "reason": reason }),
            Self::BackendUnavailable { backend, message } => json!({ "backend": backend, "message": message }),
            Self::BackendTimeout { operation, after } => {
                json!({ "operation": operation, "timeout_ms": after.as_millis() as u64 })
            }
            Self::PartialIndexFailure { failures, .. } => json!(failures),
            Self::RebuildInProgress { index } => json!({ "index": index }),
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(kind = self.kind(), error = %self, "Request failed");
        }
        let body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "details": self.details(),
        });
        (status, Json(body)).into_response()
    }
}
