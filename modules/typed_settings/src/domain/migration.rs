//! Settings migrations
//!
//! A migration describes the settings a group should gain or lose with a
//! `Blueprint`:
//!
//! ```ignore
//! migrator.in_group("mail", |blueprint| {
//!     blueprint.add("host", json!("localhost")).add("port", json!(25));
//!     blueprint.remove("legacy_relay");
//! })?;
//! ```

use super::repository::{Repository, SettingsStorage};
use super::validation::{setting_name, validate_group};
use crate::contract::{SettingsError, DEFAULT_GROUP};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Settings to add to and remove from one group
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Blueprint {
    add: IndexMap<String, Value>,
    remove: Vec<String>,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a setting with its initial value. The name is stored in snake_case.
    pub fn add(&mut self, name: &str, value: Value) -> &mut Self {
        self.add.insert(setting_name(name), value);
        self
    }

    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.remove.push(name.to_string());
        self
    }

    pub fn additions(&self) -> &IndexMap<String, Value> {
        &self.add
    }

    pub fn removals(&self) -> &[String] {
        &self.remove
    }

    /// Delete the removals, then insert the additions. Existing settings are
    /// never overwritten.
    fn apply(self, repository: &Repository) -> Result<(), SettingsError> {
        let removed = repository.delete(self.remove)?;
        let added = self.add.len();
        repository.insert(self.add, Value::Null)?;

        tracing::info!(
            group = repository.group()?,
            added,
            removed,
            "Settings migration applied"
        );
        Ok(())
    }
}

/// Applies settings migrations against a storage backend
pub struct SettingsMigrator {
    storage: Arc<dyn SettingsStorage>,
}

impl SettingsMigrator {
    pub fn new(storage: Arc<dyn SettingsStorage>) -> Self {
        Self { storage }
    }

    /// Build a blueprint for `group` and apply it
    pub fn in_group<F>(&self, group: &str, build: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Blueprint),
    {
        validate_group(group)?;
        let mut blueprint = Blueprint::new();
        build(&mut blueprint);
        blueprint.apply(&Repository::with_group(self.storage.clone(), group))
    }

    pub fn default_group<F>(&self, build: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Blueprint),
    {
        self.in_group(DEFAULT_GROUP, build)
    }

    /// Delete every setting of `group`
    pub fn drop_group(&self, group: &str) -> Result<usize, SettingsError> {
        Repository::with_group(self.storage.clone(), group).drop_group()
    }

    /// Move every setting of `from` into `to`
    pub fn rename(&self, from: &str, to: &str) -> Result<usize, SettingsError> {
        Repository::with_group(self.storage.clone(), from).rename_group(to)
    }
}
