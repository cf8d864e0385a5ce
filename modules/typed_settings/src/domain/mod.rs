//! Domain layer - projections, repository, registry and their collaborators

pub mod cast;
pub mod finder;
pub mod manifest;
pub mod migration;
pub mod prepare;
pub mod projection;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod validation;

pub use cast::{accepts_null, cast, cast_assigned, is_blank, NamedType, TypeDecl, TypeName};
pub use finder::{InventoryFinder, SettingsFinder, StaticFinder};
pub use manifest::SettingsManifest;
pub use migration::{Blueprint, SettingsMigrator};
pub use prepare::{Encoding, NormalizedSetting, PrepareValue, PreparedValue};
pub use projection::{DynamicProjection, Projection, SharedProjection, TypedProjection};
pub use registry::{BootPhase, InstanceCache, SettingsRegistry};
pub use repository::{Repository, SettingsStorage};
pub use schema::{Schema, SchemaCache, Settings, SettingsDescriptor};
