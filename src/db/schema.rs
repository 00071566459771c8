//! SQL DDL for the tag store.
//!
//! Defines `tags`, `content`, and the `content_tags` junction. All DDL uses
//! `IF NOT EXISTS`, so [`ensure_schema`] is safe to run on every startup.

use rusqlite::Connection;

use super::migrations;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_text TEXT UNIQUE NOT NULL,
    timestamp_created TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS content (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_text TEXT NOT NULL,
    points INTEGER NOT NULL DEFAULT 0,
    timestamp_created TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS content_tags (
    content_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (content_id, tag_id),
    FOREIGN KEY (content_id) REFERENCES content(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_content_tags_tag ON content_tags(tag_id);
"#;

/// Create the three relations if absent and apply additive column checks,
/// all inside one transaction. Idempotent.
pub fn ensure_schema(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    migrations::ensure_additive_columns(&tx)?;
    tx.commit()?;

    tracing::debug!("schema checked");
    Ok(())
}
