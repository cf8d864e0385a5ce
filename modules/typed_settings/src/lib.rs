//! Typed Settings Module
//!
//! Group-scoped application settings exposed as typed projections. A
//! projection loads its group once, tracks which fields changed and writes
//! back only those. The registry guarantees one settings type per group and
//! can boot from a generated manifest instead of rediscovering types.

// Public exports
pub mod contract;
pub use contract::{
    client::SettingsApi, error::CastError, error::SettingsError, Lookup, Setting, SettingsInput,
    DEFAULT_GROUP,
};

pub mod domain;
pub use domain::{
    Projection, Repository, Schema, Settings, SettingsDescriptor, SettingsRegistry,
    SharedProjection, TypeDecl,
};

pub mod module;
pub use module::SettingsModule;

pub mod config;
pub use config::Config;

#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod infra;

pub use infra::storage::{InMemoryStorage, SqliteStorage};

#[doc(hidden)]
pub use inventory;

/// Identifier of a settings type: its module path and name
#[macro_export]
macro_rules! settings_type_id {
    ($ty:ident) => {
        concat!(module_path!(), "::", stringify!($ty))
    };
}

/// Make a settings type discoverable by `InventoryFinder`
#[macro_export]
macro_rules! submit_settings {
    ($ty:ty) => {
        $crate::inventory::submit! {
            $crate::domain::SettingsDescriptor::of::<$ty>()
        }
    };
}
