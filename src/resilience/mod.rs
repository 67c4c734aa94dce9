// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded waits and startup retry.
//!
//! Request-path calls are never retried: a failed or slow backend call
//! surfaces to the caller as a typed [`CatalogError`](crate::CatalogError).
//! Retry is only used while establishing connections at startup.

pub mod retry;
pub mod timeout;
