//! Module declaration: wires storage, manifest, finder and registry from `Config`

use crate::api::native::NativeClient;
use crate::config::{Config, RepositoryKind};
use crate::contract::{SettingsApi, SettingsError};
use crate::domain::{
    InventoryFinder, SettingsFinder, SettingsManifest, SettingsMigrator, SettingsRegistry,
    SettingsStorage,
};
use crate::infra::storage::{InMemoryStorage, SqliteStorage};
use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// Typed settings module
pub struct SettingsModule {
    config: RwLock<Config>,
    storage: RwLock<Option<Arc<dyn SettingsStorage>>>,
    registry: RwLock<Option<Arc<SettingsRegistry>>>,
}

impl Default for SettingsModule {
    fn default() -> Self {
        Self {
            config: RwLock::new(Config::default()),
            storage: RwLock::new(None),
            registry: RwLock::new(None),
        }
    }
}

impl SettingsModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize with settings types discovered through `submit_settings!`
    pub fn init(&self, config: Config) -> Result<()> {
        self.init_with_finder(config, Arc::new(InventoryFinder))
    }

    /// Build the configured storage, register configured types and
    /// namespaces, then boot the registry
    pub fn init_with_finder(&self, config: Config, finder: Arc<dyn SettingsFinder>) -> Result<()> {
        let storage: Arc<dyn SettingsStorage> = match config.repository {
            RepositoryKind::InMemory => Arc::new(InMemoryStorage::new()),
            RepositoryKind::Sqlite => Arc::new(SqliteStorage::open(&config.database_path)?),
        };
        tracing::info!(repository = ?config.repository, "Settings storage ready");

        let manifest = SettingsManifest::new(&config.manifest_path);
        let registry = Arc::new(SettingsRegistry::new(
            storage.clone(),
            manifest,
            finder.clone(),
        ));

        for namespace in &config.namespaces {
            registry.register_namespace(namespace);
        }

        let descriptors = config
            .classes
            .iter()
            .map(|type_id| {
                finder
                    .find(type_id)
                    .ok_or_else(|| SettingsError::UnknownSettingsType {
                        type_id: type_id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        registry.register_settings(descriptors)?;
        registry.boot()?;

        *self.config.write() = config;
        *self.storage.write() = Some(storage);
        *self.registry.write() = Some(registry.clone());

        tracing::info!(
            groups = registry.registered().len(),
            "Typed settings module initialized"
        );
        Ok(())
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn registry(&self) -> Result<Arc<SettingsRegistry>> {
        self.registry
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow!("Settings module not initialized"))
    }

    /// Group-scoped client over the registry
    pub fn client(&self) -> Result<Arc<dyn SettingsApi>> {
        Ok(Arc::new(NativeClient::new(self.registry()?)))
    }

    /// Configured storage backend
    pub fn storage(&self) -> Result<Arc<dyn SettingsStorage>> {
        self.storage
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow!("Settings module not initialized"))
    }

    /// Migrator over the configured storage
    pub fn migrator(&self) -> Result<SettingsMigrator> {
        Ok(SettingsMigrator::new(self.storage()?))
    }
}
