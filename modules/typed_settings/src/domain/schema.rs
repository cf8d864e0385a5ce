//! Settings type descriptors and their field schemas
//!
//! A settings type declares its schema statically: an ordered list of field
//! names with their declared types. The registry derives it once per type and
//! keeps it in a `SchemaCache` for the cache's lifetime.

use super::cast::TypeDecl;
use crate::contract::DEFAULT_GROUP;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Field names used for projection bookkeeping; never part of a schema
pub const RESERVED_FIELDS: &[&str] = &["group"];

/// Ordered field name to declared type mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: IndexMap<String, TypeDecl>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. Reserved names are skipped.
    pub fn field(mut self, name: impl Into<String>, decl: TypeDecl) -> Self {
        let name = name.into();
        if RESERVED_FIELDS.contains(&name.as_str()) {
            tracing::warn!(field = %name, "Ignoring reserved settings field");
            return self;
        }
        self.fields.insert(name, decl);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeDecl)> {
        self.fields.iter().map(|(name, decl)| (name.as_str(), decl))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, TypeDecl)> for Schema {
    fn from_iter<I: IntoIterator<Item = (S, TypeDecl)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Schema::new(), |schema, (name, decl)| schema.field(name, decl))
    }
}

/// A settings type: a named group of typed fields.
///
/// ```ignore
/// struct MailSettings;
///
/// impl Settings for MailSettings {
///     const TYPE_ID: &'static str = settings_type_id!(MailSettings);
///     const GROUP: &'static str = "mail";
///
///     fn schema() -> Schema {
///         Schema::new()
///             .field("host", TypeDecl::string())
///             .field("port", TypeDecl::int())
///     }
/// }
/// ```
pub trait Settings: 'static {
    /// Fully qualified identifier; this is what the manifest stores
    const TYPE_ID: &'static str;

    /// Group served by this type
    const GROUP: &'static str = DEFAULT_GROUP;

    fn schema() -> Schema;
}

/// Type-erased handle on a settings type
#[derive(Debug, Clone, Copy)]
pub struct SettingsDescriptor {
    type_id: &'static str,
    group: &'static str,
    schema: fn() -> Schema,
}

impl SettingsDescriptor {
    pub const fn new(type_id: &'static str, group: &'static str, schema: fn() -> Schema) -> Self {
        Self {
            type_id,
            group,
            schema,
        }
    }

    pub const fn of<S: Settings>() -> Self {
        Self::new(S::TYPE_ID, S::GROUP, S::schema)
    }

    pub fn type_id(&self) -> &'static str {
        self.type_id
    }

    pub fn group(&self) -> &'static str {
        self.group
    }

    /// Module path the type lives in (its identifier minus the last segment)
    pub fn namespace(&self) -> &'static str {
        self.type_id
            .rsplit_once("::")
            .map(|(namespace, _)| namespace)
            .unwrap_or("")
    }

    pub fn derive_schema(&self) -> Schema {
        (self.schema)()
    }
}

impl PartialEq for SettingsDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.group == other.group
    }
}

impl Eq for SettingsDescriptor {}

inventory::collect!(SettingsDescriptor);

/// Schemas derived so far, keyed by settings type identifier
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: RwLock<HashMap<&'static str, Arc<Schema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached schema of the descriptor's type, derived on first use
    pub fn get_or_derive(&self, descriptor: &SettingsDescriptor) -> Arc<Schema> {
        if let Some(schema) = self.schemas.read().get(descriptor.type_id()) {
            return schema.clone();
        }

        let derived = Arc::new(descriptor.derive_schema());
        self.schemas
            .write()
            .entry(descriptor.type_id())
            .or_insert(derived)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    pub fn clear(&self) {
        self.schemas.write().clear();
    }
}
