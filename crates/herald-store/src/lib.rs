// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Herald delivery pipeline.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; the [`database::Database`] struct is the single writer. Schema
//! changes ship as refinery migrations embedded at build time.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod store;

pub use queries::rules::NewRule;
pub use store::SqliteRecordStore;
