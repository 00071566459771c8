//! Additive, idempotent column checks.
//!
//! Databases written by older builds may lack columns that the current
//! `CREATE TABLE` statements declare. Each entry in [`ADDITIVE_COLUMNS`] is
//! added when missing; a column that already exists is not an error.

use rusqlite::Connection;

/// A column that may be missing from databases created by older builds.
struct AdditiveColumn {
    table: &'static str,
    column: &'static str,
    /// Column definition for `ALTER TABLE ... ADD COLUMN`. SQLite only accepts
    /// constant defaults here.
    definition: &'static str,
    /// Statement that fills the column for rows that predate it.
    backfill: Option<&'static str>,
}

const ADDITIVE_COLUMNS: &[AdditiveColumn] = &[
    AdditiveColumn {
        table: "tags",
        column: "timestamp_created",
        definition: "timestamp_created TEXT",
        backfill: Some(
            "UPDATE tags SET timestamp_created = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
             WHERE timestamp_created IS NULL",
        ),
    },
    AdditiveColumn {
        table: "content",
        column: "timestamp_created",
        definition: "timestamp_created TEXT",
        backfill: Some(
            "UPDATE content SET timestamp_created = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
             WHERE timestamp_created IS NULL",
        ),
    },
    AdditiveColumn {
        table: "content",
        column: "points",
        definition: "points INTEGER NOT NULL DEFAULT 0",
        backfill: None,
    },
];

/// Whether `table` currently has a column named `column`.
pub fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

/// Add every missing column in [`ADDITIVE_COLUMNS`].
pub fn ensure_additive_columns(conn: &Connection) -> rusqlite::Result<()> {
    for col in ADDITIVE_COLUMNS {
        if has_column(conn, col.table, col.column)? {
            continue;
        }

        tracing::info!(table = col.table, column = col.column, "adding missing column");
        let sql = format!("ALTER TABLE {} ADD COLUMN {}", col.table, col.definition);
        match conn.execute(&sql, []) {
            Ok(_) => {}
            Err(e) if is_duplicate_column(&e) => {
                tracing::debug!(
                    table = col.table,
                    column = col.column,
                    "column already exists"
                );
                continue;
            }
            Err(e) => return Err(e),
        }

        if let Some(backfill) = col.backfill {
            conn.execute(backfill, [])?;
        }
    }
    Ok(())
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("duplicate column name")
    )
}
