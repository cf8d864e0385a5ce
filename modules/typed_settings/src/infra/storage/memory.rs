//! In-memory storage backend

use crate::contract::{Setting, SettingsError};
use crate::domain::prepare::{Encoding, NormalizedSetting, PrepareValue};
use crate::domain::repository::SettingsStorage;
use anyhow::{bail, Result};
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;

type Group = IndexMap<String, Setting>;

/// Settings kept in process memory, per group in insertion order
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    groups: RwLock<HashMap<String, Group>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of settings stored in `group`
    pub fn count(&self, group: &str) -> usize {
        self.groups.read().get(group).map_or(0, IndexMap::len)
    }

    fn ensure_unlocked<'a>(
        group: Option<&Group>,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let Some(group) = group else {
            return Ok(());
        };

        let locked: Vec<String> = names
            .into_iter()
            .filter(|name| group.get(*name).is_some_and(|setting| setting.locked))
            .map(str::to_string)
            .collect();

        if !locked.is_empty() {
            return Err(SettingsError::Locked { names: locked }.into());
        }
        Ok(())
    }

    fn write(group_name: &str, group: &mut Group, setting: &NormalizedSetting) {
        let now = Utc::now();
        let payload = setting.payload.transform();
        match group.get_mut(&setting.name) {
            Some(existing) => {
                existing.payload = payload;
                existing.updated_at = now;
            }
            None => {
                group.insert(
                    setting.name.clone(),
                    Setting {
                        name: setting.name.clone(),
                        group: group_name.to_string(),
                        payload,
                        locked: false,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
    }
}

impl SettingsStorage for InMemoryStorage {
    fn encoding(&self) -> Encoding {
        Encoding::Identity
    }

    fn fetch(&self, group: &str, names: Option<&[String]>) -> Result<Vec<Setting>> {
        let groups = self.groups.read();
        let Some(settings) = groups.get(group) else {
            return Ok(Vec::new());
        };

        Ok(match names {
            Some(names) => names
                .iter()
                .filter_map(|name| settings.get(name).cloned())
                .collect(),
            None => settings.values().cloned().collect(),
        })
    }

    fn insert_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()> {
        let mut groups = self.groups.write();
        let entries = groups.entry(group.to_string()).or_default();
        for setting in settings {
            if !entries.contains_key(&setting.name) {
                Self::write(group, entries, setting);
            }
        }
        Ok(())
    }

    fn update_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()> {
        let mut groups = self.groups.write();
        Self::ensure_unlocked(
            groups.get(group),
            settings.iter().map(|setting| setting.name.as_str()),
        )?;

        let Some(entries) = groups.get_mut(group) else {
            return Ok(());
        };
        for setting in settings {
            if entries.contains_key(&setting.name) {
                Self::write(group, entries, setting);
            }
        }
        Ok(())
    }

    fn upsert_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()> {
        let mut groups = self.groups.write();
        Self::ensure_unlocked(
            groups.get(group),
            settings.iter().map(|setting| setting.name.as_str()),
        )?;

        let entries = groups.entry(group.to_string()).or_default();
        for setting in settings {
            Self::write(group, entries, setting);
        }
        Ok(())
    }

    fn delete_many(&self, group: &str, names: &[String]) -> Result<usize> {
        let mut groups = self.groups.write();
        Self::ensure_unlocked(groups.get(group), names.iter().map(String::as_str))?;

        let Some(entries) = groups.get_mut(group) else {
            return Ok(0);
        };
        Ok(names
            .iter()
            .filter(|name| entries.shift_remove(name.as_str()).is_some())
            .count())
    }

    fn drop_group(&self, group: &str) -> Result<usize> {
        let mut groups = self.groups.write();
        let Some(entries) = groups.get(group) else {
            return Ok(0);
        };
        Self::ensure_unlocked(Some(entries), entries.keys().map(String::as_str))?;

        Ok(groups.remove(group).map_or(0, |entries| entries.len()))
    }

    fn rename_group(&self, from: &str, to: &str) -> Result<usize> {
        if from == to {
            return Ok(self.count(from));
        }

        let mut groups = self.groups.write();
        let Some(moving) = groups.get(from) else {
            return Ok(0);
        };

        if let Some(target) = groups.get(to) {
            let taken: Vec<&String> = moving.keys().filter(|name| target.contains_key(*name)).collect();
            if !taken.is_empty() {
                bail!(
                    "cannot rename settings group [{from}] to [{to}]: settings already exist: {}",
                    taken
                        .iter()
                        .map(|name| name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }

        let Some(moving) = groups.remove(from) else {
            return Ok(0);
        };
        let now = Utc::now();
        let moved = moving.len();
        let target = groups.entry(to.to_string()).or_default();
        for (name, mut setting) in moving {
            setting.group = to.to_string();
            setting.updated_at = now;
            target.insert(name, setting);
        }
        Ok(moved)
    }

    fn set_locked(&self, group: &str, names: &[String], locked: bool) -> Result<usize> {
        let mut groups = self.groups.write();
        let Some(entries) = groups.get_mut(group) else {
            return Ok(0);
        };

        let mut changed = 0;
        for name in names {
            if let Some(setting) = entries.get_mut(name) {
                setting.locked = locked;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
