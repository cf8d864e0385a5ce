//! Settings type discovery
//!
//! Cold boot asks a finder for the settings types under each registered
//! namespace. Warm boot only has type identifiers from the manifest and uses
//! `find` to map them back to descriptors.

use super::schema::SettingsDescriptor;
use super::validation::normalize_namespace;

/// Discovers settings types
pub trait SettingsFinder: Send + Sync {
    /// Settings types declared directly in `namespace`, or `None` when there
    /// are none
    fn discover(&self, namespace: &str) -> Option<Vec<SettingsDescriptor>>;

    /// Descriptor of the settings type with the given identifier
    fn find(&self, type_id: &str) -> Option<SettingsDescriptor>;
}

fn discover_in<'a>(
    descriptors: impl Iterator<Item = &'a SettingsDescriptor>,
    namespace: &str,
) -> Option<Vec<SettingsDescriptor>> {
    let namespace = normalize_namespace(namespace);
    let mut found: Vec<SettingsDescriptor> = descriptors
        .filter(|descriptor| descriptor.namespace() == namespace)
        .copied()
        .collect();

    if found.is_empty() {
        return None;
    }

    found.sort_by_key(|descriptor| descriptor.type_id());
    found.dedup();
    Some(found)
}

/// Finder over the types submitted with `submit_settings!`
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryFinder;

impl SettingsFinder for InventoryFinder {
    fn discover(&self, namespace: &str) -> Option<Vec<SettingsDescriptor>> {
        discover_in(inventory::iter::<SettingsDescriptor>.into_iter(), namespace)
    }

    fn find(&self, type_id: &str) -> Option<SettingsDescriptor> {
        inventory::iter::<SettingsDescriptor>
            .into_iter()
            .find(|descriptor| descriptor.type_id() == type_id)
            .copied()
    }
}

/// Finder over an explicit list of types
#[derive(Debug, Default, Clone)]
pub struct StaticFinder {
    descriptors: Vec<SettingsDescriptor>,
}

impl StaticFinder {
    pub fn new(descriptors: impl IntoIterator<Item = SettingsDescriptor>) -> Self {
        Self {
            descriptors: descriptors.into_iter().collect(),
        }
    }

    pub fn with(mut self, descriptor: SettingsDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }
}

impl SettingsFinder for StaticFinder {
    fn discover(&self, namespace: &str) -> Option<Vec<SettingsDescriptor>> {
        discover_in(self.descriptors.iter(), namespace)
    }

    fn find(&self, type_id: &str) -> Option<SettingsDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.type_id() == type_id)
            .copied()
    }
}
