use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};

use super::normalize_tag;
use super::types::{ContentItem, RelatedContent};

// ── Public API ────────────────────────────────────────────────────────────────

/// Rank stored content by tag overlap with `tags` and return at most `limit` rows.
///
/// Order: distinct matched tags descending, then points descending, then oldest
/// first (row id breaks exact timestamp ties). Every returned row gets one point;
/// that increment is best-effort and a failure only logs a warning.
///
/// An empty tag set (after trimming) returns nothing without touching the store.
pub fn query_related<S: AsRef<str>>(
    conn: &Connection,
    tags: &[S],
    limit: usize,
) -> rusqlite::Result<Vec<RelatedContent>> {
    let query_tags: BTreeSet<String> = tags
        .iter()
        .filter_map(|t| normalize_tag(t.as_ref()))
        .collect();
    if query_tags.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    // 1. Rank by overlap
    let sql = format!(
        "SELECT c.id, c.content_text, c.points, c.timestamp_created, \
                COUNT(DISTINCT ct.tag_id) AS tag_match_count \
         FROM content AS c \
         JOIN content_tags AS ct ON c.id = ct.content_id \
         JOIN tags AS t ON ct.tag_id = t.id \
         WHERE t.tag_text IN ({}) \
         GROUP BY c.id \
         ORDER BY tag_match_count DESC, c.points DESC, c.timestamp_created ASC, c.id ASC \
         LIMIT ?",
        placeholders(query_tags.len())
    );
    let mut values: Vec<Value> = query_tags.into_iter().map(Value::Text).collect();
    values.push(Value::Integer(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let ranked = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok(RelatedContent {
                id: row.get(0)?,
                text: row.get(1)?,
                points: row.get(2)?,
                created_at: row.get(3)?,
                tag_match_count: row.get(4)?,
                tags: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if ranked.is_empty() {
        return Ok(ranked);
    }

    // 2. Attach the full tag set of each row
    let ids: Vec<i64> = ranked.iter().map(|r| r.id).collect();
    let mut tags_by_id = fetch_tags(conn, &ids)?;
    let results: Vec<RelatedContent> = ranked
        .into_iter()
        .map(|mut r| {
            r.tags = tags_by_id.remove(&r.id).unwrap_or_default();
            r
        })
        .collect();

    // 3. Popularity feedback
    if let Err(e) = bump_points(conn, &ids) {
        tracing::warn!(error = %e, ids = ?ids, "failed to increment points");
    }

    tracing::debug!(rows = results.len(), "related content retrieved");
    Ok(results)
}

/// Fetch one content item with its tags. No side effects.
pub fn inspect_content(conn: &Connection, content_id: i64) -> rusqlite::Result<Option<ContentItem>> {
    let item = conn
        .query_row(
            "SELECT id, content_text, points, timestamp_created FROM content WHERE id = ?1",
            params![content_id],
            |row| {
                Ok(ContentItem {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    points: row.get(2)?,
                    created_at: row.get(3)?,
                    tags: Vec::new(),
                })
            },
        )
        .optional()?;

    match item {
        Some(mut item) => {
            item.tags = fetch_tags(conn, &[content_id])?
                .remove(&content_id)
                .unwrap_or_default();
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

// ── Internals ─────────────────────────────────────────────────────────────────

/// Tags of each content id, alphabetically.
fn fetch_tags(conn: &Connection, ids: &[i64]) -> rusqlite::Result<HashMap<i64, Vec<String>>> {
    let sql = format!(
        "SELECT ct.content_id, t.tag_text \
         FROM content_tags AS ct \
         JOIN tags AS t ON ct.tag_id = t.id \
         WHERE ct.content_id IN ({}) \
         ORDER BY t.tag_text",
        placeholders(ids.len())
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut map: HashMap<i64, Vec<String>> = HashMap::new();
    for (id, tag) in rows {
        map.entry(id).or_default().push(tag);
    }
    Ok(map)
}

fn bump_points(conn: &Connection, ids: &[i64]) -> rusqlite::Result<usize> {
    let sql = format!(
        "UPDATE content SET points = points + 1 WHERE id IN ({})",
        placeholders(ids.len())
    );
    conn.execute(&sql, params_from_iter(ids.iter()))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
