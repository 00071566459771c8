use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

/// Response from [`memory_stats`].
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_content: u64,
    pub total_tags: u64,
    pub total_links: u64,
    /// Sum of all points, i.e. how many times content has been retrieved.
    pub total_points: u64,
    pub top_tags: Vec<TagUsage>,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_content: Option<String>,
}

/// A tag and the number of content items linked to it.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TagUsage {
    pub tag: String,
    pub uses: u64,
}

/// Compute tag store statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn memory_stats(
    conn: &Connection,
    top_n: usize,
    db_path: Option<&Path>,
) -> rusqlite::Result<StatsResponse> {
    let count = |sql: &str| -> rusqlite::Result<u64> {
        conn.query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
    };

    let total_content = count("SELECT COUNT(*) FROM content")?;
    let total_tags = count("SELECT COUNT(*) FROM tags")?;
    let total_links = count("SELECT COUNT(*) FROM content_tags")?;
    let total_points = count("SELECT COALESCE(SUM(points), 0) FROM content")?;
    let top_tags = top_tags(conn, top_n)?;

    let (oldest_content, newest_content) = conn.query_row(
        "SELECT MIN(timestamp_created), MAX(timestamp_created) FROM content",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_content,
        total_tags,
        total_links,
        total_points,
        top_tags,
        db_size_bytes,
        oldest_content,
        newest_content,
    })
}

/// Most linked tags, ties broken alphabetically.
fn top_tags(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<TagUsage>> {
    let mut stmt = conn.prepare(
        "SELECT t.tag_text, COUNT(ct.content_id) AS uses \
         FROM tags AS t \
         JOIN content_tags AS ct ON ct.tag_id = t.id \
         GROUP BY t.id \
         ORDER BY uses DESC, t.tag_text ASC \
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(TagUsage {
                tag: row.get(0)?,
                uses: row.get::<_, i64>(1)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::memory::search::query_related;
    use crate::memory::store::save_content_with_tags;

    #[test]
    fn test_stats_on_empty_store() {
        let conn = db::open_memory_database().unwrap();
        let stats = memory_stats(&conn, 5, None).unwrap();

        assert_eq!(stats.total_content, 0);
        assert_eq!(stats.total_tags, 0);
        assert_eq!(stats.total_points, 0);
        assert!(stats.top_tags.is_empty());
        assert!(stats.oldest_content.is_none());
    }

    #[test]
    fn test_stats_json_omits_missing_time_range() {
        let conn = db::open_memory_database().unwrap();
        let stats = memory_stats(&conn, 5, None).unwrap();

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_content"], 0);
        assert!(json["top_tags"].as_array().unwrap().is_empty());
        assert!(json.get("oldest_content").is_none());
    }

    #[test]
    fn test_stats_counts_and_top_tags() {
        let mut conn = db::open_memory_database().unwrap();
        save_content_with_tags(&mut conn, "user said: hi", &["user", "greeting"]).unwrap();
        save_content_with_tags(&mut conn, "agent said: hello", &["agent", "ai", "greeting"])
            .unwrap();
        query_related(&conn, &["greeting"], 5).unwrap();

        let stats = memory_stats(&conn, 2, None).unwrap();
        assert_eq!(stats.total_content, 2);
        assert_eq!(stats.total_tags, 4);
        assert_eq!(stats.total_links, 5);
        assert_eq!(stats.total_points, 2);
        assert_eq!(
            stats.top_tags,
            vec![
                TagUsage { tag: "greeting".into(), uses: 2 },
                TagUsage { tag: "agent".into(), uses: 1 },
            ]
        );
        assert!(stats.oldest_content <= stats.newest_content);
    }
}
