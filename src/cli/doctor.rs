//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use tagmem::config::TagmemConfig;
use tagmem::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &TagmemConfig, json: bool) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `tagmem chat` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn).context("failed to run health check")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("tagmem Health Report");
    println!("====================");
    println!();
    println!("Agent:             {}", config.agent.name);
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Backend:           {}", config.backend.url);
    println!();
    println!("Row counts:");
    println!("  Tags:            {}", report.tag_count);
    println!("  Content:         {}", report.content_count);
    println!("  Links:           {}", report.link_count);
    println!();
    println!(
        "Foreign keys:      {}",
        if report.foreign_keys_enabled { "ON" } else { "OFF" }
    );
    if report.orphan_links > 0 {
        println!("Orphan links:      {} (run `tagmem reset` or restore a backup)", report.orphan_links);
    }
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED");
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup of {}", db_path.display());
        println!("  2. Or start over with `tagmem reset`");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
