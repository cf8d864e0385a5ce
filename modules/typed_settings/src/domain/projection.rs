//! Typed and dynamic projections of a settings group
//!
//! A projection loads its group once at construction, keeps an initial
//! snapshot of what was loaded, and writes back only the fields whose current
//! value differs from that snapshot.
//!
//! Every field is seeded at construction. A field the store does not hold is
//! seeded with `null`, so assigning it later makes it dirty like any other.
//! `save` only writes entries that already exist; a dirty field the store
//! does not hold stays dirty until it is created through `Repository::insert`
//! or a migration.
//!
//! Loaded values that are blank (`null`, whitespace, empty array or object)
//! become `null` without a cast. Assigned values are cast, and `null` is only
//! accepted by nullable or undeclared types. A value that has a supported
//! target type but cannot be read as it (`"abc"` for `int`) fails with
//! `CastError::Coercion`.

use super::cast::{cast, cast_assigned, is_blank};
use super::repository::Repository;
use super::schema::Schema;
use crate::contract::{CastError, SettingsError};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Projection shared between the registry cache and its callers
pub type SharedProjection = Arc<parking_lot::Mutex<Projection>>;

/// Current state, initial snapshot and old-values trail of a projection
#[derive(Debug, Clone, Default)]
struct FieldState {
    current: IndexMap<String, Value>,
    initial: IndexMap<String, Value>,
    old: IndexMap<String, Value>,
}

impl FieldState {
    fn with_fields<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let current: IndexMap<String, Value> = names
            .into_iter()
            .map(|name| (name.to_string(), Value::Null))
            .collect();
        Self {
            initial: current.clone(),
            current,
            old: IndexMap::new(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.current.contains_key(name)
    }

    fn add_field(&mut self, name: &str) {
        if !self.contains(name) {
            self.current.insert(name.to_string(), Value::Null);
            self.initial.insert(name.to_string(), Value::Null);
        }
    }

    /// Cast every known entry first, then assign them all. Unknown names are
    /// ignored. With `seed`, the snapshot of each field is set the first time
    /// it receives a non-null value. The caster sees every value, null included.
    fn assign<F>(
        &mut self,
        data: impl IntoIterator<Item = (String, Value)>,
        seed: bool,
        caster: F,
    ) -> Result<(), CastError>
    where
        F: Fn(&str, Value) -> Result<Value, CastError>,
    {
        let mut casted = Vec::new();
        for (name, value) in data {
            if !self.contains(&name) {
                continue;
            }
            let value = caster(&name, value)?;
            casted.push((name, value));
        }

        for (name, value) in casted {
            if seed && self.initial.get(&name).map_or(true, Value::is_null) {
                self.initial.insert(name.clone(), value.clone());
            }
            self.current.insert(name, value);
        }
        Ok(())
    }

    fn get(&self, name: &str, default: Value) -> Value {
        match self.current.get(name) {
            Some(Value::Null) | None => default,
            Some(value) => value.clone(),
        }
    }

    fn dirty(&self) -> IndexMap<String, Value> {
        self.current
            .iter()
            .filter(|(name, value)| self.initial.get(name.as_str()) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Advance the snapshot of the `written` names to their dirty value
    fn commit(&mut self, dirty: &IndexMap<String, Value>, written: &[String]) {
        for name in written {
            let Some(value) = dirty.get(name) else {
                continue;
            };
            if let Some(previous) = self.initial.insert(name.clone(), value.clone()) {
                self.old.insert(name.clone(), previous);
            }
        }
    }

    fn all(&self) -> IndexMap<String, Value> {
        let mut all = self.initial.clone();
        all.extend(self.dirty());
        all
    }
}

/// Projection whose fields and their types come from a `Schema`
#[derive(Debug)]
pub struct TypedProjection {
    repository: Repository,
    type_id: &'static str,
    schema: Arc<Schema>,
    state: FieldState,
}

impl TypedProjection {
    /// Load the schema's fields of `group` with one bulk read
    pub fn new(
        mut repository: Repository,
        group: &str,
        type_id: &'static str,
        schema: Arc<Schema>,
    ) -> Result<Self, SettingsError> {
        repository.set_group(group);
        let mut projection = Self {
            state: FieldState::with_fields(schema.names()),
            repository,
            type_id,
            schema,
        };

        let names: Vec<String> = projection.schema.names().map(str::to_string).collect();
        let loaded = projection.repository.get_many(&names, Value::Null)?;
        projection.fill(loaded)?;

        tracing::debug!(
            group,
            settings = type_id,
            fields = projection.schema.len(),
            "Loaded settings projection"
        );
        Ok(projection)
    }

    pub fn type_id(&self) -> &'static str {
        self.type_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Masked assignment of loaded values that also seeds the snapshot.
    /// Blank values become `null`, the rest are cast.
    pub fn fill(
        &mut self,
        data: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), SettingsError> {
        let schema = self.schema.clone();
        self.state.assign(data, true, |name, value| match schema.get(name) {
            Some(_) if is_blank(&value) => Ok(Value::Null),
            Some(decl) => cast(value, decl),
            None => Ok(value),
        })?;
        Ok(())
    }

    /// Masked, cast assignment; the snapshot is left alone. `null` on a
    /// non-nullable field fails with `CastError::NotNullable`.
    pub fn update(
        &mut self,
        data: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), SettingsError> {
        let schema = self.schema.clone();
        self.state.assign(data, false, |name, value| match schema.get(name) {
            Some(decl) => cast_assigned(value, decl),
            None => Ok(value),
        })?;
        Ok(())
    }

    pub fn get(&self, key: &str, default: Value) -> Value {
        self.state.get(key, default)
    }

    pub fn get_many(&self, keys: &[&str], default: Value) -> IndexMap<String, Value> {
        keys.iter()
            .map(|key| (key.to_string(), self.state.get(key, default.clone())))
            .collect()
    }

    pub fn get_updated(&self) -> IndexMap<String, Value> {
        self.state.dirty()
    }

    pub fn save(&mut self) -> Result<(), SettingsError> {
        save(&self.repository, &mut self.state)
    }

    pub fn all(&self) -> IndexMap<String, Value> {
        self.state.all()
    }

    pub fn old_values(&self) -> &IndexMap<String, Value> {
        &self.state.old
    }
}

/// Untyped projection over whatever keys its group stores
#[derive(Debug)]
pub struct DynamicProjection {
    repository: Repository,
    state: FieldState,
}

impl DynamicProjection {
    /// Insert `seed` (existing names are kept) and load every entry of `group`
    pub fn new(
        mut repository: Repository,
        group: &str,
        seed: IndexMap<String, Value>,
    ) -> Result<Self, SettingsError> {
        repository.set_group(group);
        repository.insert(seed, Value::Null)?;

        let loaded = repository.get_all()?;
        let mut state = FieldState::default();
        for name in loaded.keys() {
            state.add_field(name);
        }
        state.assign(loaded, true, |_, value| Ok(value))?;

        tracing::debug!(group, fields = state.current.len(), "Loaded dynamic settings");
        Ok(Self { repository, state })
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn fill(
        &mut self,
        data: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), SettingsError> {
        self.state.assign(data, true, |_, value| Ok(value))?;
        Ok(())
    }

    pub fn update(
        &mut self,
        data: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), SettingsError> {
        self.state.assign(data, false, |_, value| Ok(value))?;
        Ok(())
    }

    pub fn get(&self, key: &str, default: Value) -> Value {
        self.state.get(key, default)
    }

    pub fn get_many(&self, keys: &[&str], default: Value) -> IndexMap<String, Value> {
        keys.iter()
            .map(|key| (key.to_string(), self.state.get(key, default.clone())))
            .collect()
    }

    pub fn get_updated(&self) -> IndexMap<String, Value> {
        self.state.dirty()
    }

    pub fn save(&mut self) -> Result<(), SettingsError> {
        save(&self.repository, &mut self.state)
    }

    pub fn all(&self) -> IndexMap<String, Value> {
        self.state.all()
    }

    pub fn old_values(&self) -> &IndexMap<String, Value> {
        &self.state.old
    }
}

fn save(repository: &Repository, state: &mut FieldState) -> Result<(), SettingsError> {
    let dirty = state.dirty();
    if dirty.is_empty() {
        return Ok(());
    }

    let written = repository.update(dirty.clone(), Value::Null)?;
    state.commit(&dirty, &written);

    let group = repository.group().unwrap_or_default();
    if written.len() < dirty.len() {
        tracing::warn!(
            group,
            unsaved = dirty.len() - written.len(),
            "Dirty settings not stored yet were left unsaved"
        );
    }
    tracing::debug!(group, count = written.len(), "Saved settings");
    Ok(())
}

/// A settings projection: typed by schema or dynamic over stored keys
#[derive(Debug)]
pub enum Projection {
    Typed(TypedProjection),
    Dynamic(DynamicProjection),
}

impl Projection {
    pub fn into_shared(self) -> SharedProjection {
        Arc::new(parking_lot::Mutex::new(self))
    }

    /// Identifier of the settings type; `None` for dynamic projections
    pub fn type_id(&self) -> Option<&'static str> {
        match self {
            Projection::Typed(typed) => Some(typed.type_id()),
            Projection::Dynamic(_) => None,
        }
    }

    pub fn group(&self) -> Result<&str, SettingsError> {
        self.repository().group()
    }

    pub fn repository(&self) -> &Repository {
        match self {
            Projection::Typed(typed) => typed.repository(),
            Projection::Dynamic(dynamic) => dynamic.repository(),
        }
    }

    /// Field names, in declaration (or storage) order
    pub fn field_names(&self) -> Vec<String> {
        self.state().current.keys().cloned().collect()
    }

    pub fn fill(
        &mut self,
        data: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), SettingsError> {
        match self {
            Projection::Typed(typed) => typed.fill(data),
            Projection::Dynamic(dynamic) => dynamic.fill(data),
        }
    }

    pub fn update(
        &mut self,
        data: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), SettingsError> {
        match self {
            Projection::Typed(typed) => typed.update(data),
            Projection::Dynamic(dynamic) => dynamic.update(data),
        }
    }

    /// Assign one field
    pub fn set<V: Serialize>(&mut self, key: &str, value: V) -> Result<(), SettingsError> {
        let value = serde_json::to_value(value)?;
        self.update([(key.to_string(), value)])
    }

    pub fn get(&self, key: &str, default: Value) -> Value {
        match self {
            Projection::Typed(typed) => typed.get(key, default),
            Projection::Dynamic(dynamic) => dynamic.get(key, default),
        }
    }

    pub fn get_many(&self, keys: &[&str], default: Value) -> IndexMap<String, Value> {
        match self {
            Projection::Typed(typed) => typed.get_many(keys, default),
            Projection::Dynamic(dynamic) => dynamic.get_many(keys, default),
        }
    }

    /// Deserialize one field
    pub fn value<T: DeserializeOwned>(&self, key: &str) -> Result<T, SettingsError> {
        Ok(serde_json::from_value(self.get(key, Value::Null))?)
    }

    /// Deserialize the current state into a settings struct
    pub fn extract<S: DeserializeOwned>(&self) -> Result<S, SettingsError> {
        let state = self.state().current.clone().into_iter().collect();
        Ok(serde_json::from_value(Value::Object(state))?)
    }

    /// Apply a settings struct through `update`
    pub fn assign<S: Serialize>(&mut self, settings: &S) -> Result<(), SettingsError> {
        match serde_json::to_value(settings)? {
            Value::Object(map) => self.update(map),
            other => Err(SettingsError::Payload(serde::ser::Error::custom(format!(
                "expected a settings object, got {other}"
            )))),
        }
    }

    pub fn get_updated(&self) -> IndexMap<String, Value> {
        match self {
            Projection::Typed(typed) => typed.get_updated(),
            Projection::Dynamic(dynamic) => dynamic.get_updated(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.get_updated().is_empty()
    }

    pub fn save(&mut self) -> Result<(), SettingsError> {
        match self {
            Projection::Typed(typed) => typed.save(),
            Projection::Dynamic(dynamic) => dynamic.save(),
        }
    }

    pub fn all(&self) -> IndexMap<String, Value> {
        match self {
            Projection::Typed(typed) => typed.all(),
            Projection::Dynamic(dynamic) => dynamic.all(),
        }
    }

    pub fn old_values(&self) -> &IndexMap<String, Value> {
        match self {
            Projection::Typed(typed) => typed.old_values(),
            Projection::Dynamic(dynamic) => dynamic.old_values(),
        }
    }

    fn state(&self) -> &FieldState {
        match self {
            Projection::Typed(typed) => &typed.state,
            Projection::Dynamic(dynamic) => &dynamic.state,
        }
    }
}
