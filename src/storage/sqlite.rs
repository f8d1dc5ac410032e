//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::config::Config;
use crate::modules::{Issue, Severity};
use crate::output::AuditStore;
use crate::plugins::PluginResult;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::AuditRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn read_audit(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRecord> {
        Ok(AuditRecord {
            id: row.get(0)?,
            target: row.get(1)?,
            version: row.get(2)?,
            revision: row.get(3)?,
            config_hash: row.get(4)?,
            started_at: row.get(5)?,
            finished_at: row.get(6)?,
            delta_time_secs: row.get(7)?,
        })
    }
}

fn parse_datetime(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

const AUDIT_COLUMNS: &str =
    "id, target, version, revision, config_hash, started_at, finished_at, delta_time_secs";

impl Storage for SqliteStorage {
    fn save_audit_store(&mut self, store: &AuditStore) -> StorageResult<i64> {
        let options = serde_json::to_string(&store.options)?;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO audits (target, version, revision, config_hash, options, started_at, finished_at, delta_time_secs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                store.options.scan.url,
                store.version,
                store.revision,
                store.config_hash,
                options,
                store.start_datetime.map(|dt| dt.to_rfc3339()),
                store.finish_datetime.map(|dt| dt.to_rfc3339()),
                store.delta_time_secs,
            ],
        )?;
        let audit_id = tx.last_insert_rowid();

        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO sitemap (audit_id, url) VALUES (?1, ?2)")?;
            for url in &store.sitemap {
                stmt.execute(params![audit_id, url])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO issues (audit_id, name, module, url, severity, description, remarks, verified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for issue in &store.issues {
                stmt.execute(params![
                    audit_id,
                    issue.name,
                    issue.module,
                    issue.url,
                    issue.severity.as_str(),
                    issue.description,
                    serde_json::to_string(&issue.remarks)?,
                    issue.verified,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO plugin_results (audit_id, name, description, results)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for result in store.plugins.values() {
                stmt.execute(params![
                    audit_id,
                    result.name,
                    result.description,
                    serde_json::to_string(&result.results)?,
                ])?;
            }

            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO failures (audit_id, url) VALUES (?1, ?2)")?;
            for url in &store.failures {
                stmt.execute(params![audit_id, url])?;
            }
        }

        tx.commit()?;
        Ok(audit_id)
    }

    fn load_audit_store(&self, audit_id: i64) -> StorageResult<AuditStore> {
        let record = self.get_audit(audit_id)?;
        let options: String = self.conn.query_row(
            "SELECT options FROM audits WHERE id = ?1",
            params![audit_id],
            |row| row.get(0),
        )?;
        let options: Config = serde_json::from_str(&options)?;

        let mut plugins = BTreeMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT name, description, results FROM plugin_results WHERE audit_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![audit_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (name, description, results) = row?;
            plugins.insert(
                name.clone(),
                PluginResult {
                    name,
                    description,
                    results: serde_json::from_str(&results)?,
                },
            );
        }

        Ok(AuditStore {
            version: record.version,
            revision: record.revision,
            config_hash: record.config_hash,
            options,
            sitemap: self.load_sitemap(audit_id)?,
            issues: self.load_issues(audit_id)?,
            plugins,
            failures: self.load_failures(audit_id)?,
            start_datetime: parse_datetime(record.started_at),
            finish_datetime: parse_datetime(record.finished_at),
            delta_time_secs: record.delta_time_secs,
        })
    }

    fn get_audit(&self, audit_id: i64) -> StorageResult<AuditRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM audits WHERE id = ?1", AUDIT_COLUMNS),
                params![audit_id],
                Self::read_audit,
            )
            .optional()?
            .ok_or(StorageError::AuditNotFound(audit_id))
    }

    fn get_latest_audit(&self) -> StorageResult<Option<AuditRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM audits ORDER BY id DESC LIMIT 1", AUDIT_COLUMNS),
                [],
                Self::read_audit,
            )
            .optional()?;
        Ok(record)
    }

    fn load_sitemap(&self, audit_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM sitemap WHERE audit_id = ?1 ORDER BY url")?;
        let urls = stmt
            .query_map(params![audit_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    fn load_issues(&self, audit_id: i64) -> StorageResult<Vec<Issue>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, module, url, severity, description, remarks, verified
             FROM issues WHERE audit_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![audit_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, bool>(6)?,
            ))
        })?;

        let mut issues = Vec::new();
        for row in rows {
            let (name, module, url, severity, description, remarks, verified) = row?;
            let severity =
                Severity::from_str_opt(&severity).ok_or_else(|| StorageError::InvalidValue {
                    column: "severity",
                    value: severity.clone(),
                })?;
            issues.push(Issue {
                name,
                module,
                url,
                severity,
                description,
                remarks: serde_json::from_str(&remarks)?,
                verified,
            });
        }
        Ok(issues)
    }

    fn load_failures(&self, audit_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM failures WHERE audit_id = ?1 ORDER BY url")?;
        let urls = stmt
            .query_map(params![audit_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    fn count_issues_by_severity(&self, audit_id: i64) -> StorageResult<BTreeMap<Severity, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT severity, COUNT(*) FROM issues WHERE audit_id = ?1 GROUP BY severity",
        )?;
        let rows = stmt.query_map(params![audit_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (severity, count) = row?;
            if let Some(severity) = Severity::from_str_opt(&severity) {
                counts.insert(severity, count as u64);
            }
        }
        Ok(counts)
    }
}
