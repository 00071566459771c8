pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

/// Open (or create) an agent's database at the given path and make sure the
/// schema is in place.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::ensure_schema(&mut conn).context("failed to initialize schema")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with foreign keys enabled and the schema applied.
pub fn open_memory_database() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::ensure_schema(&mut conn).context("failed to initialize schema")?;
    Ok(conn)
}

/// Outcome of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub foreign_keys_enabled: bool,
    pub tag_count: u64,
    pub content_count: u64,
    pub link_count: u64,
    /// Links whose content or tag row no longer exists. Always zero while
    /// foreign keys are enforced.
    pub orphan_links: u64,
}

pub fn check_database_health(conn: &Connection) -> rusqlite::Result<HealthReport> {
    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let foreign_keys: i64 = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;

    let count = |sql: &str| -> rusqlite::Result<u64> {
        conn.query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
    };

    Ok(HealthReport {
        integrity_ok: integrity == "ok",
        foreign_keys_enabled: foreign_keys == 1,
        tag_count: count("SELECT COUNT(*) FROM tags")?,
        content_count: count("SELECT COUNT(*) FROM content")?,
        link_count: count("SELECT COUNT(*) FROM content_tags")?,
        orphan_links: count(
            "SELECT COUNT(*) FROM content_tags ct \
             LEFT JOIN content c ON c.id = ct.content_id \
             LEFT JOIN tags t ON t.id = ct.tag_id \
             WHERE c.id IS NULL OR t.id IS NULL",
        )?,
    })
}
