//! Settings registry: binds settings types to groups and boots them
//!
//! Each group is served by exactly one settings type. Boot prefers the
//! manifest (warm boot) and falls back to discovering the registered
//! namespaces (cold boot).
//!
//! Not found is an expected outcome here: `resolve_settings` returns `None`
//! for a term nothing is bound to. Conflicting registrations are errors and
//! leave the registry unchanged.

use super::finder::SettingsFinder;
use super::manifest::SettingsManifest;
use super::projection::{DynamicProjection, Projection, SharedProjection, TypedProjection};
use super::repository::{Repository, SettingsStorage};
use super::schema::{SchemaCache, Settings, SettingsDescriptor};
use super::validation::{normalize_namespace, validate_group};
use crate::contract::SettingsError;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Projection instances, keyed by settings type identifier
#[derive(Default)]
pub struct InstanceCache {
    instances: Mutex<HashMap<String, SharedProjection>>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<SharedProjection> {
        self.instances.lock().get(key).cloned()
    }

    /// Cache `projection` unless another one got there first; returns the
    /// cached instance either way
    pub fn get_or_insert(&self, key: &str, projection: SharedProjection) -> SharedProjection {
        self.instances
            .lock()
            .entry(key.to_string())
            .or_insert(projection)
            .clone()
    }

    pub fn remove(&self, key: &str) -> Option<SharedProjection> {
        self.instances.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    pub fn clear(&self) {
        self.instances.lock().clear();
    }
}

/// Registry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    Unbooted,
    Booting,
    Booted,
}

#[derive(Debug, Clone)]
struct Binding {
    descriptor: SettingsDescriptor,
    group: String,
}

struct RegistryState {
    phase: BootPhase,
    /// group -> settings type identifier
    settings: IndexMap<String, String>,
    /// settings type identifier -> binding
    bindings: HashMap<String, Binding>,
    namespaces: Vec<String>,
    /// group -> fake projection
    fakes: HashMap<String, SharedProjection>,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            phase: BootPhase::Unbooted,
            settings: IndexMap::new(),
            bindings: HashMap::new(),
            namespaces: Vec::new(),
            fakes: HashMap::new(),
        }
    }

    /// Validate the whole batch, then insert and bind every entry
    fn register(&mut self, descriptors: &[SettingsDescriptor]) -> Result<(), SettingsError> {
        let mut batch: IndexMap<&str, &str> = IndexMap::new();

        for descriptor in descriptors {
            let type_id = descriptor.type_id();
            let group = descriptor.group();
            validate_group(group)?;

            if self.bindings.contains_key(type_id) || batch.values().any(|t| *t == type_id) {
                return Err(SettingsError::SettingsAlreadyRegistered {
                    settings: type_id.to_string(),
                });
            }

            let registered = self
                .settings
                .get(group)
                .map(String::as_str)
                .or_else(|| batch.get(group).copied());
            if let Some(registered) = registered {
                return Err(SettingsError::GroupAlreadyRegistered {
                    settings: type_id.to_string(),
                    registered: registered.to_string(),
                    group: group.to_string(),
                });
            }

            batch.insert(group, type_id);
        }

        for descriptor in descriptors {
            self.bind(*descriptor, descriptor.group().to_string());
            tracing::info!(
                group = descriptor.group(),
                settings = descriptor.type_id(),
                "Settings registered"
            );
        }
        Ok(())
    }

    /// Bind `descriptor` to `group`. A type that owned `group` is unbound and
    /// a previous group of `descriptor` is released, so each group keeps a
    /// single live type. Returns the type identifiers whose binding changed.
    fn bind(&mut self, descriptor: SettingsDescriptor, group: String) -> Vec<String> {
        let type_id = descriptor.type_id().to_string();
        let mut changed = Vec::new();

        if let Some(owner) = self.settings.get(&group).filter(|owner| **owner != type_id) {
            self.bindings.remove(owner.as_str());
            changed.push(owner.clone());
        }
        if let Some(previous) = self.bindings.get(&type_id) {
            if previous.group != group {
                self.settings.shift_remove(&previous.group);
                changed.push(type_id.clone());
            }
        }

        self.settings.insert(group.clone(), type_id.clone());
        self.bindings.insert(type_id, Binding { descriptor, group });
        changed
    }

    fn is_bound_to(&self, descriptor: &SettingsDescriptor) -> bool {
        self.bindings
            .get(descriptor.type_id())
            .is_some_and(|binding| binding.group == descriptor.group())
    }
}

pub struct SettingsRegistry {
    storage: Arc<dyn SettingsStorage>,
    manifest: SettingsManifest,
    finder: Arc<dyn SettingsFinder>,
    schemas: Arc<SchemaCache>,
    instances: Arc<InstanceCache>,
    state: Mutex<RegistryState>,
}

impl SettingsRegistry {
    pub fn new(
        storage: Arc<dyn SettingsStorage>,
        manifest: SettingsManifest,
        finder: Arc<dyn SettingsFinder>,
    ) -> Self {
        Self::with_caches(
            storage,
            manifest,
            finder,
            Arc::new(SchemaCache::new()),
            Arc::new(InstanceCache::new()),
        )
    }

    pub fn with_caches(
        storage: Arc<dyn SettingsStorage>,
        manifest: SettingsManifest,
        finder: Arc<dyn SettingsFinder>,
        schemas: Arc<SchemaCache>,
        instances: Arc<InstanceCache>,
    ) -> Self {
        Self {
            storage,
            manifest,
            finder,
            schemas,
            instances,
            state: Mutex::new(RegistryState::new()),
        }
    }

    pub fn manifest(&self) -> &SettingsManifest {
        &self.manifest
    }

    pub fn schemas(&self) -> &Arc<SchemaCache> {
        &self.schemas
    }

    pub fn instances(&self) -> &Arc<InstanceCache> {
        &self.instances
    }

    pub fn phase(&self) -> BootPhase {
        self.state.lock().phase
    }

    pub fn is_booted(&self) -> bool {
        self.phase() == BootPhase::Booted
    }

    /// Add a namespace searched by cold boot
    pub fn register_namespace(&self, namespace: &str) {
        let namespace = normalize_namespace(namespace);
        let mut state = self.state.lock();
        if !state.namespaces.contains(&namespace) {
            tracing::debug!(namespace = %namespace, "Settings namespace registered");
            state.namespaces.push(namespace);
        }
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.state.lock().namespaces.clone()
    }

    pub fn register<S: Settings>(&self) -> Result<(), SettingsError> {
        self.register_settings([SettingsDescriptor::of::<S>()])
    }

    /// Register settings types. Nothing is registered if any of them
    /// conflicts with the registry or with another type of the batch.
    pub fn register_settings(
        &self,
        descriptors: impl IntoIterator<Item = SettingsDescriptor>,
    ) -> Result<(), SettingsError> {
        let descriptors: Vec<SettingsDescriptor> = descriptors.into_iter().collect();
        if descriptors.is_empty() {
            return Ok(());
        }

        self.state.lock().register(&descriptors)
    }

    /// Registered group to settings type map
    pub fn registered(&self) -> IndexMap<String, String> {
        self.state.lock().settings.clone()
    }

    /// Load the registry from the manifest when present, else discover every
    /// registered namespace. Calling it again once booted does nothing.
    pub fn boot(&self) -> Result<(), SettingsError> {
        let mut state = self.state.lock();
        if state.phase != BootPhase::Unbooted {
            return Ok(());
        }

        state.phase = BootPhase::Booting;
        let checkpoint = (state.settings.clone(), state.bindings.clone());

        let result = if self.manifest.present() {
            self.warm_boot(&mut state)
        } else {
            self.cold_boot(&mut state)
        };

        match result {
            Ok(()) => {
                state.phase = BootPhase::Booted;
                tracing::info!(count = state.settings.len(), "Settings registry booted");
                Ok(())
            }
            Err(err) => {
                (state.settings, state.bindings) = checkpoint;
                state.phase = BootPhase::Unbooted;
                tracing::warn!(error = %err, "Settings registry boot failed");
                Err(err)
            }
        }
    }

    fn warm_boot(&self, state: &mut RegistryState) -> Result<(), SettingsError> {
        let entries = self.manifest.load()?;
        tracing::info!(
            path = %self.manifest.path().display(),
            count = entries.len(),
            "Warm booting settings from manifest"
        );

        let mut resolved = Vec::with_capacity(entries.len());
        for (group, type_id) in entries {
            validate_group(&group)?;
            let descriptor = self
                .finder
                .find(&type_id)
                .ok_or(SettingsError::UnknownSettingsType { type_id })?;
            resolved.push((group, descriptor));
        }

        for (group, descriptor) in resolved {
            for type_id in state.bind(descriptor, group.clone()) {
                tracing::warn!(
                    group = %group,
                    settings = %type_id,
                    "Manifest replaced an earlier settings binding"
                );
                self.instances.remove(&type_id);
            }
        }
        Ok(())
    }

    fn cold_boot(&self, state: &mut RegistryState) -> Result<(), SettingsError> {
        let namespaces = state.namespaces.clone();
        tracing::info!(namespaces = namespaces.len(), "Cold booting settings");

        for namespace in namespaces {
            let Some(discovered) = self.finder.discover(&namespace) else {
                tracing::debug!(namespace = %namespace, "No settings discovered");
                continue;
            };

            let fresh: Vec<SettingsDescriptor> = discovered
                .into_iter()
                .filter(|descriptor| !state.is_bound_to(descriptor))
                .collect();
            state.register(&fresh)?;
        }
        Ok(())
    }

    /// Projection bound to a group name or settings type identifier, or
    /// `None` when nothing is bound to `term`
    pub fn resolve_settings(&self, term: &str) -> Result<Option<SharedProjection>, SettingsError> {
        let binding = {
            let state = self.state.lock();
            if let Some(fake) = state.fakes.get(term) {
                return Ok(Some(fake.clone()));
            }

            let type_id = state.settings.get(term).map_or(term, String::as_str);
            let Some(binding) = state.bindings.get(type_id).cloned() else {
                return Ok(None);
            };
            if let Some(fake) = state.fakes.get(&binding.group) {
                return Ok(Some(fake.clone()));
            }
            binding
        };

        let type_id = binding.descriptor.type_id();
        if let Some(cached) = self.instances.get(type_id) {
            return Ok(Some(cached));
        }

        let schema = self.schemas.get_or_derive(&binding.descriptor);
        let projection = TypedProjection::new(
            Repository::new(self.storage.clone()),
            &binding.group,
            type_id,
            schema,
        )?;

        Ok(Some(self.instances.get_or_insert(
            type_id,
            Projection::Typed(projection).into_shared(),
        )))
    }

    pub fn resolve<S: Settings>(&self) -> Result<Option<SharedProjection>, SettingsError> {
        self.resolve_settings(S::TYPE_ID)
    }

    /// Forget every registration, fake and cached instance. Registered
    /// namespaces are kept so the next boot can rediscover them.
    pub fn clear_registered_settings(&self) {
        let mut state = self.state.lock();
        state.settings.clear();
        state.bindings.clear();
        state.fakes.clear();
        state.phase = BootPhase::Unbooted;
        self.schemas.clear();
        self.instances.clear();
        tracing::info!("Registered settings cleared");
    }

    /// Write the current group to settings type map to the manifest
    pub fn generate_manifest(&self) -> Result<(), SettingsError> {
        self.manifest.generate(&self.registered())
    }

    pub fn clear_manifest(&self) -> Result<bool, SettingsError> {
        self.manifest.clear()
    }

    /// Serve `group` from a dynamic projection over `storage`, seeded with
    /// `data`, until the registry is cleared
    pub fn fake(
        &self,
        storage: Arc<dyn SettingsStorage>,
        group: &str,
        data: IndexMap<String, Value>,
    ) -> Result<SharedProjection, SettingsError> {
        validate_group(group)?;
        let projection =
            Projection::Dynamic(DynamicProjection::new(Repository::new(storage), group, data)?)
                .into_shared();

        self.state
            .lock()
            .fakes
            .insert(group.to_string(), projection.clone());
        tracing::debug!(group, "Settings group faked");
        Ok(projection)
    }
}
