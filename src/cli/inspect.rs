//! CLI `inspect` command: display one stored content item.

use anyhow::{bail, Result};

use tagmem::config::TagmemConfig;

/// Print a content item with its tags. Does not change its points.
pub fn inspect(config: &TagmemConfig, id: i64, json: bool) -> Result<()> {
    let conn = tagmem::db::open_database(config.resolved_db_path())?;

    let Some(item) = tagmem::memory::search::inspect_content(&conn, id)? else {
        bail!("no content with id {id}");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("Content #{}", item.id);
    println!("{}", "=".repeat(50));
    println!("  Points:         {}", item.points);
    println!("  Created:        {}", item.created_at);
    println!("  Tags:           {}", item.tags.join(", "));
    println!();
    println!("Text:");
    println!("  {}", item.text);

    Ok(())
}
