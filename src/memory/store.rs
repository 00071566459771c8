//! Write path: content rows, tag resolution, and links.
//!
//! [`save_content_with_tags`] is the single-item entry point and [`save_many`]
//! writes several items at once. Both run inside one transaction: either the
//! content, its tags, and every link are committed together, or nothing is.

use rusqlite::{params, Connection, Transaction};

use super::{normalize_tag, now_timestamp};

/// One item to write with [`save_many`].
#[derive(Debug, Clone)]
pub struct NewContent {
    pub text: String,
    pub tags: Vec<String>,
}

impl NewContent {
    pub fn new(text: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            text: text.into(),
            tags,
        }
    }
}

/// Save `text` and link it to every tag in `tags`. Tags are trimmed and
/// lowercased; empty ones are skipped and duplicates collapse onto one link.
///
/// Returns the new content id. On error the transaction is rolled back.
pub fn save_content_with_tags<S: AsRef<str>>(
    conn: &mut Connection,
    text: &str,
    tags: &[S],
) -> rusqlite::Result<i64> {
    let tx = conn.transaction()?;
    let content_id = insert_content_with_tags(&tx, text, tags)?;
    tx.commit()?;
    Ok(content_id)
}

/// Save every item in one transaction. Returns the content ids in input order.
pub fn save_many(conn: &mut Connection, items: &[NewContent]) -> rusqlite::Result<Vec<i64>> {
    let tx = conn.transaction()?;
    let ids = items
        .iter()
        .map(|item| insert_content_with_tags(&tx, &item.text, &item.tags))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    tx.commit()?;
    Ok(ids)
}

fn insert_content_with_tags<S: AsRef<str>>(
    tx: &Transaction,
    text: &str,
    tags: &[S],
) -> rusqlite::Result<i64> {
    let now = now_timestamp();

    tx.execute(
        "INSERT INTO content (content_text, points, timestamp_created) VALUES (?1, 0, ?2)",
        params![text, now],
    )?;
    let content_id = tx.last_insert_rowid();

    let mut linked = Vec::with_capacity(tags.len());
    for tag in tags.iter().filter_map(|t| normalize_tag(t.as_ref())) {
        let tag_id = upsert_tag(tx, &tag, &now)?;
        tx.execute(
            "INSERT OR IGNORE INTO content_tags (content_id, tag_id) VALUES (?1, ?2)",
            params![content_id, tag_id],
        )?;
        linked.push(tag);
    }

    tracing::debug!(content_id, tags = ?linked, "content saved");
    Ok(content_id)
}

/// Insert the tag if it is new, then resolve its id.
fn upsert_tag(tx: &Transaction, tag: &str, now: &str) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT OR IGNORE INTO tags (tag_text, timestamp_created) VALUES (?1, ?2)",
        params![tag, now],
    )?;
    tx.query_row(
        "SELECT id FROM tags WHERE tag_text = ?1",
        params![tag],
        |row| row.get(0),
    )
}
