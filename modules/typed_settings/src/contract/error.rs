//! Contract error types for the settings store
//!
//! "Not found" is deliberately NOT an error in this crate: `Repository::get`
//! falls back to the caller's default and `SettingsRegistry::resolve_settings`
//! returns `None`. Conflicting state (registration collisions, locked entries,
//! bad casts) always is.

use std::path::PathBuf;

/// Errors raised while casting a raw value to a field's declared type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CastError {
    #[error("intersection types are not supported")]
    Intersection,

    #[error("union types with more than one type are not supported (found {members})")]
    Union { members: usize },

    #[error("unsupported type casting: {type_name}")]
    Unsupported { type_name: String },

    /// The value has a supported target type but cannot be coerced to it
    #[error("cannot cast {value} to {target}")]
    Coercion { value: String, target: &'static str },

    /// Null assigned to a field whose declared type does not allow it
    #[error("null is not allowed for {type_name}")]
    NotNullable { type_name: String },
}

/// Settings store errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Cast(#[from] CastError),

    /// The same settings type was registered twice
    #[error("the settings [{settings}] is already registered with its group")]
    SettingsAlreadyRegistered { settings: String },

    /// A different settings type already owns the group
    #[error("the settings [{settings}] cannot be registered at group [{group}], it is taken by [{registered}]")]
    GroupAlreadyRegistered {
        settings: String,
        registered: String,
        group: String,
    },

    #[error("the settings group must not be empty")]
    MissingGroup,

    #[error("settings manifest not found at [{}]", path.display())]
    ManifestLoad { path: PathBuf },

    #[error("cannot access settings manifest at [{}]", path.display())]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings manifest at [{}] is malformed", path.display())]
    ManifestFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Update or delete touched entries the backing store marks immutable
    #[error("{}", locked_message(names))]
    Locked { names: Vec<String> },

    /// A manifest or configuration names a settings type nobody provides
    #[error("unknown settings type: {type_id}")]
    UnknownSettingsType { type_id: String },

    #[error("settings group [{group}] not found")]
    GroupNotFound { group: String },

    #[error("invalid settings payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid settings configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error(transparent)]
    Storage(anyhow::Error),
}

impl SettingsError {
    /// Convert a storage backend failure, keeping settings errors raised by the
    /// backend (such as `Locked`) intact.
    pub fn from_storage(err: anyhow::Error) -> Self {
        match err.downcast::<SettingsError>() {
            Ok(settings_error) => settings_error,
            Err(other) => SettingsError::Storage(other),
        }
    }
}

fn locked_message(names: &[String]) -> String {
    if names.len() > 1 {
        format!(
            "the settings provided are locked and cannot be modified: {}",
            names.join(", ")
        )
    } else {
        format!(
            "the setting provided is locked and cannot be modified: {}",
            names.join(", ")
        )
    }
}
