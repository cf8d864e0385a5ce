//! Contract layer - public API for in-process callers
//!
//! This layer contains transport-agnostic models, errors and the native client trait.

pub mod client;
pub mod error;
pub mod model;

pub use client::SettingsApi;
pub use error::{CastError, SettingsError};
pub use model::{Lookup, Setting, SettingsInput, DEFAULT_GROUP};
