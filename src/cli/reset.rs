//! CLI `reset` command: empty an agent's tag store after confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use tagmem::config::TagmemConfig;

/// Delete all content and tags after user confirmation.
pub fn reset(config: &TagmemConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    println!(
        "WARNING: This will permanently delete ALL content and tags of agent '{}'.",
        config.agent.name
    );
    println!("Database: {}", db_path.display());
    print!("\nType YES to confirm: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim() != "YES" {
        bail!("reset cancelled");
    }

    let mut conn = tagmem::db::open_database(&db_path)?;
    tagmem::memory::forget::reset_store(&mut conn)?;

    println!("All content deleted. Database reset complete.");
    Ok(())
}
