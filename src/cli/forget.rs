use anyhow::{bail, Result};

use tagmem::config::TagmemConfig;

/// Hard-delete one content item; its tag links go with it.
pub fn forget(config: &TagmemConfig, id: i64) -> Result<()> {
    let mut conn = tagmem::db::open_database(config.resolved_db_path())?;

    if !tagmem::memory::forget::forget_content(&mut conn, id)? {
        bail!("no content with id {id}");
    }
    println!("Forgot content #{id}.");
    Ok(())
}
