//! Native client implementation - serves settings groups through the registry

use crate::contract::{SettingsApi, SettingsError};
use crate::domain::{SettingsRegistry, SharedProjection};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Group-scoped access to registered settings
///
/// Each call resolves the projection bound to the group, so callers never
/// need to know which settings type serves it.
#[derive(Clone)]
pub struct NativeClient {
    registry: Arc<SettingsRegistry>,
}

impl NativeClient {
    pub fn new(registry: Arc<SettingsRegistry>) -> Self {
        Self { registry }
    }

    fn projection(&self, group: &str) -> Result<SharedProjection, SettingsError> {
        self.registry
            .resolve_settings(group)?
            .ok_or_else(|| SettingsError::GroupNotFound {
                group: group.to_string(),
            })
    }
}

impl SettingsApi for NativeClient {
    fn get(&self, group: &str, key: &str, default: Value) -> Result<Value, SettingsError> {
        Ok(self.projection(group)?.lock().get(key, default))
    }

    fn get_many(
        &self,
        group: &str,
        keys: &[&str],
        default: Value,
    ) -> Result<IndexMap<String, Value>, SettingsError> {
        Ok(self.projection(group)?.lock().get_many(keys, default))
    }

    fn set(&self, group: &str, values: IndexMap<String, Value>) -> Result<(), SettingsError> {
        let projection = self.projection(group)?;
        let mut projection = projection.lock();
        projection.update(values)?;
        projection.save()?;

        tracing::debug!(group, "Settings group updated");
        Ok(())
    }

    fn all(&self, group: &str) -> Result<IndexMap<String, Value>, SettingsError> {
        Ok(self.projection(group)?.lock().all())
    }
}
