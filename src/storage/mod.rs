// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record store: the authoritative product rows.
//!
//! - [`sql::SqlRecordStore`]: SQLite or MySQL via sqlx `Any`
//! - [`memory::MemoryRecordStore`]: in-process, for tests and demos

pub mod traits;
pub mod sql;
pub mod memory;
