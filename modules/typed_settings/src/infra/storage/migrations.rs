//! Database migrations for the SQLite settings backend
//!
//! Applied migrations are tracked with SQLite's `user_version` pragma: a
//! database at version N has the first N migrations applied.

use anyhow::{Context, Result};
use rusqlite::Connection;

pub struct Migration {
    pub name: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[Migration {
    name: "m20241210_000001_create_settings",
    up: "
        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_name TEXT NOT NULL,
            name TEXT NOT NULL,
            payload TEXT NULL,
            locked INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(group_name, name)
        );

        CREATE INDEX IF NOT EXISTS idx_settings_group_name ON settings (group_name);
    ",
}];

/// Apply every migration the database has not seen yet
pub fn run(conn: &mut Connection) -> Result<usize> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("failed to read settings schema version")?;
    let version = usize::try_from(version).context("invalid settings schema version")?;

    let pending = MIGRATIONS.iter().enumerate().skip(version);
    let mut applied = 0;
    for (index, migration) in pending {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.up)
            .with_context(|| format!("failed to apply migration {}", migration.name))?;
        tx.pragma_update(None, "user_version", (index + 1) as i64)?;
        tx.commit()?;

        tracing::info!(migration = migration.name, "Settings migration applied");
        applied += 1;
    }
    Ok(applied)
}
