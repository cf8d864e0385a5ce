//! Storage layer - settings storage backends and their migrations

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::InMemoryStorage;
pub use sqlite::SqliteStorage;
