use anyhow::Result;

use tagmem::config::TagmemConfig;
use tagmem::memory::search::query_related;

use super::preview;

/// Rank stored content against `tags` and print the results.
///
/// This is a real retrieval: every listed row gains a point.
pub fn search(
    config: &TagmemConfig,
    tags: &[String],
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let conn = tagmem::db::open_database(config.resolved_db_path())?;
    let limit = limit.unwrap_or(config.memory.long_term_top_results);

    let results = query_related(&conn, tags, limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, r) in results.iter().enumerate() {
        println!(
            "  {}. #{} (matches: {}, points: {}, created: {})",
            i + 1,
            r.id,
            r.tag_match_count,
            r.points,
            r.created_at,
        );
        println!("     {}", preview(&r.text, 120));
        println!("     tags: {}", r.tags.join(", "));
        println!();
    }

    Ok(())
}
