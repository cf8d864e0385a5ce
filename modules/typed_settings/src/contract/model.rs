//! Contract models for the settings store
//!
//! These models are transport-agnostic. Setting values are plain JSON values:
//! strings, numbers, booleans, arrays, objects or null.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;

/// Group used when a settings type does not declare one
pub const DEFAULT_GROUP: &str = "default";

/// A setting record as kept by a storage backend
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    /// Setting name, unique within its group
    pub name: String,
    /// Group that owns this setting
    pub group: String,
    /// Stored (encoded) form of the value
    pub payload: Value,
    /// Locked settings cannot be updated or deleted
    pub locked: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Call shapes accepted by the repository.
///
/// A list of names never carries values: every name is paired with the
/// operation's shared default. Only `Entries` supplies a value per name.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsInput {
    /// A single setting name
    Name(String),
    /// Setting names sharing one default value
    Names(Vec<String>),
    /// Explicit name to value pairs
    Entries(IndexMap<String, Value>),
}

impl SettingsInput {
    pub fn is_empty(&self) -> bool {
        match self {
            SettingsInput::Name(name) => name.is_empty(),
            SettingsInput::Names(names) => names.is_empty(),
            SettingsInput::Entries(entries) => entries.is_empty(),
        }
    }

    /// Requested setting names, in call order
    pub fn names(&self) -> Vec<String> {
        match self {
            SettingsInput::Name(name) => vec![name.clone()],
            SettingsInput::Names(names) => names.clone(),
            SettingsInput::Entries(entries) => entries.keys().cloned().collect(),
        }
    }

    /// Pair every name with its value, using `default` where none was supplied
    pub fn into_entries(self, default: &Value) -> IndexMap<String, Value> {
        match self {
            SettingsInput::Name(name) => IndexMap::from([(name, default.clone())]),
            SettingsInput::Names(names) => names
                .into_iter()
                .map(|name| (name, default.clone()))
                .collect(),
            SettingsInput::Entries(entries) => entries,
        }
    }
}

impl From<&str> for SettingsInput {
    fn from(name: &str) -> Self {
        SettingsInput::Name(name.to_string())
    }
}

impl From<String> for SettingsInput {
    fn from(name: String) -> Self {
        SettingsInput::Name(name)
    }
}

impl From<Vec<String>> for SettingsInput {
    fn from(names: Vec<String>) -> Self {
        SettingsInput::Names(names)
    }
}

impl From<Vec<&str>> for SettingsInput {
    fn from(names: Vec<&str>) -> Self {
        SettingsInput::Names(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for SettingsInput {
    fn from(names: &[&str]) -> Self {
        SettingsInput::Names(names.iter().map(|name| name.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for SettingsInput {
    fn from(names: [&str; N]) -> Self {
        SettingsInput::Names(names.iter().map(|name| name.to_string()).collect())
    }
}

impl From<IndexMap<String, Value>> for SettingsInput {
    fn from(entries: IndexMap<String, Value>) -> Self {
        SettingsInput::Entries(entries)
    }
}

impl From<serde_json::Map<String, Value>> for SettingsInput {
    fn from(entries: serde_json::Map<String, Value>) -> Self {
        SettingsInput::Entries(entries.into_iter().collect())
    }
}

impl From<Vec<(String, Value)>> for SettingsInput {
    fn from(entries: Vec<(String, Value)>) -> Self {
        SettingsInput::Entries(entries.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, Value); N]> for SettingsInput {
    fn from(entries: [(&str, Value); N]) -> Self {
        SettingsInput::Entries(
            entries
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }
}

impl<V: Into<Value>> From<(&str, V)> for SettingsInput {
    fn from((name, value): (&str, V)) -> Self {
        SettingsInput::Entries(IndexMap::from([(name.to_string(), value.into())]))
    }
}

/// Result of a repository lookup: a scalar for a single name, a map otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Value(Value),
    Map(IndexMap<String, Value>),
}

impl Lookup {
    /// Collapse into a JSON value; maps become objects
    pub fn into_value(self) -> Value {
        match self {
            Lookup::Value(value) => value,
            Lookup::Map(map) => Value::Object(map.into_iter().collect()),
        }
    }

    pub fn into_map(self) -> Option<IndexMap<String, Value>> {
        match self {
            Lookup::Value(_) => None,
            Lookup::Map(map) => Some(map),
        }
    }
}
