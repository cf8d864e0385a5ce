//! Storage trait and the group-scoped repository built on top of it
//!
//! `SettingsStorage` is the backend seam (implementations live in
//! `infra/storage`). `Repository` normalizes the accepted call shapes into
//! bulk storage calls: one fetch per read and at most one write per mutation.

use super::prepare::{Encoding, NormalizedSetting, PrepareValue};
use super::validation::validate_group;
use crate::contract::{Lookup, Setting, SettingsError, SettingsInput};
use anyhow::Result;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Storage backend for settings records.
///
/// Every bulk call must be atomic: either all named entries are written or
/// none are. Backends report locked entries with `SettingsError::Locked`.
pub trait SettingsStorage: Send + Sync {
    /// Encoding applied to values before they reach this backend
    fn encoding(&self) -> Encoding;

    /// Records of a group, restricted to `names` when given
    fn fetch(&self, group: &str, names: Option<&[String]>) -> Result<Vec<Setting>>;

    /// Insert entries; existing names are left untouched
    fn insert_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()>;

    /// Overwrite entries that already exist
    fn update_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()>;

    /// Create or overwrite entries
    fn upsert_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()>;

    /// Delete named entries, returning how many were removed
    fn delete_many(&self, group: &str, names: &[String]) -> Result<usize>;

    /// Delete every entry of a group
    fn drop_group(&self, group: &str) -> Result<usize>;

    /// Move every entry of `from` into `to`
    fn rename_group(&self, from: &str, to: &str) -> Result<usize>;

    /// Set or clear the locked flag of named entries
    fn set_locked(&self, group: &str, names: &[String], locked: bool) -> Result<usize>;
}

/// Group-scoped settings repository
#[derive(Clone)]
pub struct Repository {
    storage: Arc<dyn SettingsStorage>,
    group: Option<String>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("group", &self.group)
            .field("encoding", &self.storage.encoding())
            .finish()
    }
}

impl Repository {
    pub fn new(storage: Arc<dyn SettingsStorage>) -> Self {
        Self {
            storage,
            group: None,
        }
    }

    pub fn with_group(storage: Arc<dyn SettingsStorage>, group: impl Into<String>) -> Self {
        Self {
            storage,
            group: Some(group.into()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn SettingsStorage> {
        &self.storage
    }

    /// Active group
    pub fn group(&self) -> Result<&str, SettingsError> {
        let group = self.group.as_deref().ok_or(SettingsError::MissingGroup)?;
        validate_group(group)?;
        Ok(group)
    }

    pub fn set_group(&mut self, group: impl Into<String>) {
        self.group = Some(group.into());
    }

    /// Stored value of one name (`Lookup::Value`) or of several (`Lookup::Map`,
    /// in request order). Missing names yield `default`.
    pub fn get(
        &self,
        input: impl Into<SettingsInput>,
        default: Value,
    ) -> Result<Lookup, SettingsError> {
        let input = input.into();
        match input {
            SettingsInput::Name(name) => {
                let mut values = self.lookup(vec![name.clone()], &IndexMap::new(), &default)?;
                Ok(Lookup::Value(values.shift_remove(&name).unwrap_or(default)))
            }
            SettingsInput::Names(names) => {
                Ok(Lookup::Map(self.lookup(names, &IndexMap::new(), &default)?))
            }
            SettingsInput::Entries(entries) => {
                let names = entries.keys().cloned().collect();
                Ok(Lookup::Map(self.lookup(names, &entries, &default)?))
            }
        }
    }

    /// Stored value of `name`, or `default`
    pub fn get_value(&self, name: &str, default: Value) -> Result<Value, SettingsError> {
        Ok(self.get(name, default)?.into_value())
    }

    /// Stored values of `names` in request order; missing names yield `default`
    pub fn get_many(
        &self,
        names: &[String],
        default: Value,
    ) -> Result<IndexMap<String, Value>, SettingsError> {
        self.lookup(names.to_vec(), &IndexMap::new(), &default)
    }

    /// Every stored entry of the active group
    pub fn get_all(&self) -> Result<IndexMap<String, Value>, SettingsError> {
        let group = self.group()?;
        let records = self
            .storage
            .fetch(group, None)
            .map_err(SettingsError::from_storage)?;

        records
            .into_iter()
            .map(|record| Ok((record.name, self.restore(record.payload)?)))
            .collect()
    }

    /// Insert entries whose names are not stored yet. Never overwrites.
    pub fn insert(
        &self,
        input: impl Into<SettingsInput>,
        default: Value,
    ) -> Result<(), SettingsError> {
        let entries = input.into().into_entries(&default);
        if entries.is_empty() {
            return Ok(());
        }

        let group = self.group()?;
        let existing = self.existing_names(group, &entries)?;
        let settings = self.normalize(
            entries
                .into_iter()
                .filter(|(name, _)| !existing.contains(name)),
        );
        if settings.is_empty() {
            return Ok(());
        }

        tracing::debug!(group, count = settings.len(), "Inserting settings");
        self.storage
            .insert_many(group, &settings)
            .map_err(SettingsError::from_storage)
    }

    /// Overwrite entries that are already stored. Never creates.
    ///
    /// Returns the names that were written, in input order.
    pub fn update(
        &self,
        input: impl Into<SettingsInput>,
        default: Value,
    ) -> Result<Vec<String>, SettingsError> {
        let entries = input.into().into_entries(&default);
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let group = self.group()?;
        let existing = self.existing_names(group, &entries)?;
        let settings = self.normalize(
            entries
                .into_iter()
                .filter(|(name, _)| existing.contains(name)),
        );
        if settings.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(group, count = settings.len(), "Updating settings");
        self.storage
            .update_many(group, &settings)
            .map_err(SettingsError::from_storage)?;
        Ok(settings.into_iter().map(|setting| setting.name).collect())
    }

    /// Create or overwrite entries
    pub fn upsert(
        &self,
        input: impl Into<SettingsInput>,
        default: Value,
    ) -> Result<(), SettingsError> {
        let entries = input.into().into_entries(&default);
        if entries.is_empty() {
            return Ok(());
        }

        let group = self.group()?;
        let settings = self.normalize(entries);

        tracing::debug!(group, count = settings.len(), "Upserting settings");
        self.storage
            .upsert_many(group, &settings)
            .map_err(SettingsError::from_storage)
    }

    /// Delete stored entries, returning how many were removed
    pub fn delete(&self, input: impl Into<SettingsInput>) -> Result<usize, SettingsError> {
        let names = input.into().names();
        if names.is_empty() {
            return Ok(0);
        }

        let group = self.group()?;
        let existing: Vec<String> = self
            .storage
            .fetch(group, Some(&names))
            .map_err(SettingsError::from_storage)?
            .into_iter()
            .map(|record| record.name)
            .collect();
        if existing.is_empty() {
            return Ok(0);
        }

        tracing::debug!(group, count = existing.len(), "Deleting settings");
        self.storage
            .delete_many(group, &existing)
            .map_err(SettingsError::from_storage)
    }

    /// Delete every entry of the active group
    pub fn drop_group(&self) -> Result<usize, SettingsError> {
        let group = self.group()?;
        let removed = self
            .storage
            .drop_group(group)
            .map_err(SettingsError::from_storage)?;

        tracing::debug!(group, count = removed, "Dropped settings group");
        Ok(removed)
    }

    /// Move every entry of the active group to `new_group` and switch to it
    pub fn rename_group(&mut self, new_group: &str) -> Result<usize, SettingsError> {
        validate_group(new_group)?;
        let group = self.group()?.to_string();
        let moved = self
            .storage
            .rename_group(&group, new_group)
            .map_err(SettingsError::from_storage)?;

        tracing::debug!(from = %group, to = new_group, count = moved, "Renamed settings group");
        self.group = Some(new_group.to_string());
        Ok(moved)
    }

    /// Mark entries immutable
    pub fn lock(&self, input: impl Into<SettingsInput>) -> Result<usize, SettingsError> {
        self.set_locked(input.into(), true)
    }

    /// Make locked entries mutable again
    pub fn unlock(&self, input: impl Into<SettingsInput>) -> Result<usize, SettingsError> {
        self.set_locked(input.into(), false)
    }

    fn set_locked(&self, input: SettingsInput, locked: bool) -> Result<usize, SettingsError> {
        let names = input.names();
        if names.is_empty() {
            return Ok(0);
        }

        let group = self.group()?;
        self.storage
            .set_locked(group, &names, locked)
            .map_err(SettingsError::from_storage)
    }

    /// One fetch for `names`; each name maps to its restored value, else its
    /// per-name fallback, else `default`
    fn lookup(
        &self,
        names: Vec<String>,
        fallbacks: &IndexMap<String, Value>,
        default: &Value,
    ) -> Result<IndexMap<String, Value>, SettingsError> {
        if names.is_empty() {
            return Ok(IndexMap::new());
        }

        let group = self.group()?;
        let mut stored: IndexMap<String, Value> = self
            .storage
            .fetch(group, Some(&names))
            .map_err(SettingsError::from_storage)?
            .into_iter()
            .map(|record| (record.name, record.payload))
            .collect();

        names
            .into_iter()
            .map(|name| {
                let value = match stored.shift_remove(&name) {
                    Some(payload) => self.restore(payload)?,
                    None => fallbacks.get(&name).unwrap_or(default).clone(),
                };
                Ok((name, value))
            })
            .collect()
    }

    fn existing_names(
        &self,
        group: &str,
        entries: &IndexMap<String, Value>,
    ) -> Result<HashSet<String>, SettingsError> {
        let names: Vec<String> = entries.keys().cloned().collect();
        Ok(self
            .storage
            .fetch(group, Some(&names))
            .map_err(SettingsError::from_storage)?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    fn normalize(
        &self,
        entries: impl IntoIterator<Item = (String, Value)>,
    ) -> Vec<NormalizedSetting> {
        let encoding = self.storage.encoding();
        entries
            .into_iter()
            .map(|(name, value)| NormalizedSetting::new(name, encoding.prepare(value)))
            .collect()
    }

    fn restore(&self, payload: Value) -> Result<Value, SettingsError> {
        self.storage.encoding().prepare(payload).restore()
    }
}
