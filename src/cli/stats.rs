use anyhow::Result;

use tagmem::config::TagmemConfig;

/// Display tag store statistics in the terminal.
pub fn stats(config: &TagmemConfig, top: usize, json: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = tagmem::db::open_database(&db_path)?;

    let response = tagmem::memory::stats::memory_stats(&conn, top, Some(db_path.as_path()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Memory Statistics ({})", config.agent.name);
    println!("{}", "=".repeat(40));
    println!("  Content items:       {}", response.total_content);
    println!("  Tags:                {}", response.total_tags);
    println!("  Tag links:           {}", response.total_links);
    println!("  Total points:        {}", response.total_points);
    println!();

    if !response.top_tags.is_empty() {
        println!("Top tags:");
        for usage in &response.top_tags {
            println!("  {:<24} {}", usage.tag, usage.uses);
        }
        println!();
    }

    println!("Database size:         {} bytes", response.db_size_bytes);
    if let Some(ref oldest) = response.oldest_content {
        println!("Oldest content:        {oldest}");
    }
    if let Some(ref newest) = response.newest_content {
        println!("Newest content:        {newest}");
    }

    Ok(())
}
