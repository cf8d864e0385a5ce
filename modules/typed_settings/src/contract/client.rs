//! Native client trait for group-scoped settings access
//!
//! Callers that only know a group name (not the settings type bound to it)
//! read and write values through this API. NO projections leak out of it.

use super::error::SettingsError;
use indexmap::IndexMap;
use serde_json::Value;

/// Settings API for in-process callers
pub trait SettingsApi: Send + Sync {
    /// Get one setting of a group, or `default` when it is unset
    fn get(&self, group: &str, key: &str, default: Value) -> Result<Value, SettingsError>;

    /// Get several settings of a group, in request order
    fn get_many(
        &self,
        group: &str,
        keys: &[&str],
        default: Value,
    ) -> Result<IndexMap<String, Value>, SettingsError>;

    /// Assign the given values to the group and persist what changed.
    /// Names the group does not declare are ignored, and entries not stored
    /// yet stay pending until they are created.
    fn set(&self, group: &str, values: IndexMap<String, Value>) -> Result<(), SettingsError>;

    /// Current state of every setting of the group
    fn all(&self, group: &str) -> Result<IndexMap<String, Value>, SettingsError>;
}
