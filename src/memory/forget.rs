//! Administrative deletion.
//!
//! The conversation pipeline never deletes anything. These operations back the
//! `forget` and `reset` CLI commands; links disappear through `ON DELETE CASCADE`.

use rusqlite::{params, Connection};

/// Delete one content item. Returns `false` if no such item exists.
///
/// Requires `foreign_keys = ON` (set by [`crate::db::open_database`]) so the
/// item's links cascade. Tags are kept even if no content references them.
pub fn forget_content(conn: &mut Connection, content_id: i64) -> rusqlite::Result<bool> {
    let tx = conn.transaction()?;
    let removed = tx.execute("DELETE FROM content WHERE id = ?1", params![content_id])?;
    tx.commit()?;

    if removed > 0 {
        tracing::info!(content_id, "content forgotten");
    }
    Ok(removed > 0)
}

/// Delete every content item and tag.
pub fn reset_store(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    // Order matters only when foreign keys are off.
    tx.execute_batch(
        "DELETE FROM content_tags;
         DELETE FROM content;
         DELETE FROM tags;",
    )?;
    tx.commit()?;

    tracing::info!("store reset");
    Ok(())
}
