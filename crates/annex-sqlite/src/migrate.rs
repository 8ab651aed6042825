//! Schema migrations
//!
//! Migration SQL is embedded from `migrations/` and applied in order, each in
//! its own transaction, recording the version in `schema_migrations`.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, SqliteError};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "000",
        include_str!("../migrations/000_create_schema_migrations.sql"),
    ),
    (
        "001",
        include_str!("../migrations/001_create_records_table.sql"),
    ),
    (
        "002",
        include_str!("../migrations/002_create_models_table.sql"),
    ),
];

/// Bring the schema up to date, skipping versions already recorded.
///
/// # Errors
///
/// Returns `SqliteError::Migration` naming the first version whose SQL fails;
/// earlier versions stay applied.
pub fn migrate(conn: &Connection) -> Result<()> {
    let applied = applied_versions(conn)?;
    let pending = MIGRATIONS
        .iter()
        .filter(|(version, _)| !applied.iter().any(|v| v == version));

    for (version, sql) in pending {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .map_err(|e| SqliteError::Migration(format!("{}: {}", version, e)))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, CURRENT_TIMESTAMP)",
            [version],
        )?;
        tx.commit()?;
        debug!("Applied migration {}", version);
    }
    Ok(())
}

/// Versions recorded so far; empty on a fresh database.
fn applied_versions(conn: &Connection) -> Result<Vec<String>> {
    let has_table = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'")?
        .exists([])?;
    if !has_table {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut versions = Vec::new();
    for version in rows {
        versions.push(version?);
    }
    Ok(versions)
}
