//! Storage module for persisting finished scans
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Saving complete audit stores (sitemap, issues, plugin results, failures)
//! - Loading past audits back into memory

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;

/// Opens or creates a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Summary row of a stored audit
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub id: i64,
    pub target: String,
    pub version: String,
    pub revision: String,
    pub config_hash: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub delta_time_secs: f64,
}
