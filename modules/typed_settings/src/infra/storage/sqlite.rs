//! SQLite storage backend
//!
//! Values are stored as JSON text. Every bulk call runs in one transaction.

use super::migrations;
use crate::contract::{Setting, SettingsError};
use crate::domain::prepare::{Encoding, NormalizedSetting, PrepareValue};
use crate::domain::repository::SettingsStorage;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use serde_json::Value;
use std::path::Path;

const COLUMNS: &str = "group_name, name, payload, locked, created_at, updated_at";

/// Settings stored in a SQLite database
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and apply pending migrations
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open settings database {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("failed to open in-memory settings database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migrations::run(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn in_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

struct SettingRow {
    group: String,
    name: String,
    payload: Option<String>,
    locked: bool,
    created_at: String,
    updated_at: String,
}

impl SettingRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            group: row.get(0)?,
            name: row.get(1)?,
            payload: row.get(2)?,
            locked: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_setting(self) -> Result<Setting> {
        Ok(Setting {
            payload: self.payload.map_or(Value::Null, Value::String),
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            name: self.name,
            group: self.group,
            locked: self.locked,
        })
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("invalid settings timestamp: {text}"))?
        .with_timezone(&Utc))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Encoded payload as a nullable TEXT column
fn payload_text(setting: &NormalizedSetting) -> Option<String> {
    match setting.payload.transform() {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn placeholders(count: usize, offset: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", i + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

fn select(tx: &Transaction<'_>, group: &str, names: Option<&[String]>) -> Result<Vec<Setting>> {
    let rows = match names {
        Some(names) => {
            let sql = format!(
                "SELECT {COLUMNS} FROM settings WHERE group_name = ?1 AND name IN ({}) ORDER BY id",
                placeholders(names.len(), 2)
            );
            let mut stmt = tx.prepare(&sql)?;
            let params = std::iter::once(group).chain(names.iter().map(String::as_str));
            let rows = stmt
                .query_map(params_from_iter(params), SettingRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        None => {
            let sql = format!("SELECT {COLUMNS} FROM settings WHERE group_name = ?1 ORDER BY id");
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params![group], SettingRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };

    rows.into_iter().map(SettingRow::into_setting).collect()
}

/// Fail with `Locked` when any of `names` is locked in `group`
fn ensure_unlocked<'a>(
    tx: &Transaction<'_>,
    group: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let names: Vec<String> = names.into_iter().map(str::to_string).collect();
    if names.is_empty() {
        return Ok(());
    }

    let locked: Vec<String> = select(tx, group, Some(&names))?
        .into_iter()
        .filter(|setting| setting.locked)
        .map(|setting| setting.name)
        .collect();
    if !locked.is_empty() {
        return Err(SettingsError::Locked { names: locked }.into());
    }
    Ok(())
}

impl SettingsStorage for SqliteStorage {
    fn encoding(&self) -> Encoding {
        Encoding::Json
    }

    fn fetch(&self, group: &str, names: Option<&[String]>) -> Result<Vec<Setting>> {
        if names.is_some_and(|names| names.is_empty()) {
            return Ok(Vec::new());
        }
        self.in_transaction(|tx| select(tx, group, names))
    }

    fn insert_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO settings (group_name, name, payload, locked, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)
                 ON CONFLICT(group_name, name) DO NOTHING",
            )?;
            let now = now();
            for setting in settings {
                stmt.execute(params![group, setting.name, payload_text(setting), now])?;
            }
            Ok(())
        })
    }

    fn update_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()> {
        self.in_transaction(|tx| {
            ensure_unlocked(tx, group, settings.iter().map(|s| s.name.as_str()))?;

            let mut stmt = tx.prepare(
                "UPDATE settings SET payload = ?3, updated_at = ?4
                 WHERE group_name = ?1 AND name = ?2",
            )?;
            let now = now();
            for setting in settings {
                stmt.execute(params![group, setting.name, payload_text(setting), now])?;
            }
            Ok(())
        })
    }

    fn upsert_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()> {
        self.in_transaction(|tx| {
            ensure_unlocked(tx, group, settings.iter().map(|s| s.name.as_str()))?;

            let mut stmt = tx.prepare(
                "INSERT INTO settings (group_name, name, payload, locked, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)
                 ON CONFLICT(group_name, name)
                 DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            )?;
            let now = now();
            for setting in settings {
                stmt.execute(params![group, setting.name, payload_text(setting), now])?;
            }
            Ok(())
        })
    }

    fn delete_many(&self, group: &str, names: &[String]) -> Result<usize> {
        self.in_transaction(|tx| {
            ensure_unlocked(tx, group, names.iter().map(String::as_str))?;

            let mut stmt = tx.prepare("DELETE FROM settings WHERE group_name = ?1 AND name = ?2")?;
            let mut removed = 0;
            for name in names {
                removed += stmt.execute(params![group, name])?;
            }
            Ok(removed)
        })
    }

    fn drop_group(&self, group: &str) -> Result<usize> {
        self.in_transaction(|tx| {
            let names: Vec<String> = select(tx, group, None)?
                .into_iter()
                .map(|setting| setting.name)
                .collect();
            ensure_unlocked(tx, group, names.iter().map(String::as_str))?;

            Ok(tx.execute("DELETE FROM settings WHERE group_name = ?1", params![group])?)
        })
    }

    fn rename_group(&self, from: &str, to: &str) -> Result<usize> {
        if from == to {
            return Ok(self.fetch(from, None)?.len());
        }

        self.in_transaction(|tx| {
            let taken: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT name FROM settings
                     WHERE group_name = ?1
                       AND name IN (SELECT name FROM settings WHERE group_name = ?2)
                     ORDER BY id",
                )?;
                let names = stmt
                    .query_map(params![from, to], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                names
            };
            if !taken.is_empty() {
                bail!(
                    "cannot rename settings group [{from}] to [{to}]: settings already exist: {}",
                    taken.join(", ")
                );
            }

            Ok(tx.execute(
                "UPDATE settings SET group_name = ?2, updated_at = ?3 WHERE group_name = ?1",
                params![from, to, now()],
            )?)
        })
    }

    fn set_locked(&self, group: &str, names: &[String], locked: bool) -> Result<usize> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "UPDATE settings SET locked = ?3 WHERE group_name = ?1 AND name = ?2",
            )?;
            let mut changed = 0;
            for name in names {
                changed += stmt.execute(params![group, name, locked])?;
            }
            Ok(changed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3, 2), "?2, ?3, ?4");
        assert_eq!(placeholders(0, 2), "");
    }

    #[test]
    fn test_null_payload_is_stored_as_null() {
        let setting = NormalizedSetting::new("debug", Encoding::Json.prepare(Value::Null));
        assert_eq!(payload_text(&setting), None);

        let setting = NormalizedSetting::new("debug", Encoding::Json.prepare(Value::Bool(true)));
        assert_eq!(payload_text(&setting), Some("true".to_string()));
    }

    #[test]
    fn test_timestamps_round_trip() {
        let stamp = now();
        assert_eq!(parse_timestamp(&stamp).unwrap().to_rfc3339(), stamp);
    }
}
