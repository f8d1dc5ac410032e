//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the audit database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per finished scan
CREATE TABLE IF NOT EXISTS audits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target TEXT NOT NULL,
    version TEXT NOT NULL,
    revision TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    options TEXT NOT NULL,
    started_at TEXT,
    finished_at TEXT,
    delta_time_secs REAL NOT NULL DEFAULT 0
);

-- Every URL discovered during the scan
CREATE TABLE IF NOT EXISTS sitemap (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id INTEGER NOT NULL REFERENCES audits(id),
    url TEXT NOT NULL,
    UNIQUE(audit_id, url)
);

CREATE INDEX IF NOT EXISTS idx_sitemap_audit ON sitemap(audit_id);

-- Findings
CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id INTEGER NOT NULL REFERENCES audits(id),
    name TEXT NOT NULL,
    module TEXT NOT NULL,
    url TEXT NOT NULL,
    severity TEXT NOT NULL,
    description TEXT NOT NULL,
    remarks TEXT NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_issues_audit ON issues(audit_id);
CREATE INDEX IF NOT EXISTS idx_issues_severity ON issues(severity);

-- Plugin output, stored as JSON
CREATE TABLE IF NOT EXISTS plugin_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id INTEGER NOT NULL REFERENCES audits(id),
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    results TEXT NOT NULL,
    UNIQUE(audit_id, name)
);

-- URLs abandoned after repeated fetch failures
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id INTEGER NOT NULL REFERENCES audits(id),
    url TEXT NOT NULL,
    UNIQUE(audit_id, url)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
