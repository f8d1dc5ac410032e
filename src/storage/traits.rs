//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::modules::{Issue, Severity};
use crate::output::AuditStore;
use crate::storage::AuditRecord;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Audit not found: {0}")]
    AuditNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence of finished scans
pub trait Storage {
    /// Writes a complete audit store, returning its audit ID
    ///
    /// The store is written in a single transaction.
    fn save_audit_store(&mut self, store: &AuditStore) -> StorageResult<i64>;

    /// Rebuilds the audit store saved under `audit_id`
    fn load_audit_store(&self, audit_id: i64) -> StorageResult<AuditStore>;

    fn get_audit(&self, audit_id: i64) -> StorageResult<AuditRecord>;

    fn get_latest_audit(&self) -> StorageResult<Option<AuditRecord>>;

    fn load_sitemap(&self, audit_id: i64) -> StorageResult<Vec<String>>;

    fn load_issues(&self, audit_id: i64) -> StorageResult<Vec<Issue>>;

    fn load_failures(&self, audit_id: i64) -> StorageResult<Vec<String>>;

    /// Issue counts per severity
    fn count_issues_by_severity(&self, audit_id: i64) -> StorageResult<BTreeMap<Severity, u64>>;
}
