//! Configuration for the typed settings module

use crate::contract::SettingsError;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of the environment variables overriding the configuration
pub const ENV_PREFIX: &str = "SETTINGS_";

/// Storage backend used by the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryKind {
    #[default]
    InMemory,
    Sqlite,
}

/// Typed settings configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Storage backend
    #[serde(default)]
    pub repository: RepositoryKind,

    /// Database file used by the SQLite backend
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Location of the warm boot manifest
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    /// Namespaces (module paths) searched on cold boot
    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Settings type identifiers registered before boot
    #[serde(default)]
    pub classes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository: RepositoryKind::default(),
            database_path: default_database_path(),
            manifest_path: default_manifest_path(),
            namespaces: Vec::new(),
            classes: Vec::new(),
        }
    }
}

impl Config {
    /// Defaults, overridden by the YAML file at `path` (when given) and then
    /// by `SETTINGS_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).only(&[
                "repository",
                "database_path",
                "manifest_path",
                "namespaces",
                "classes",
            ]))
            .extract()
            .map_err(|err| SettingsError::Config(Box::new(err)))
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("storage/settings.sqlite")
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("bootstrap/cache/settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.repository, RepositoryKind::InMemory);
        assert_eq!(config.manifest_path, PathBuf::from("bootstrap/cache/settings.json"));
        assert!(config.namespaces.is_empty());
    }

    #[test]
    fn test_load_yaml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "settings.yaml",
                "repository: sqlite\ndatabase_path: data/app.sqlite\nnamespaces:\n  - app::settings\n",
            )?;

            let config = Config::load(Some(Path::new("settings.yaml")))
                .map_err(|err| err.to_string())?;
            assert_eq!(config.repository, RepositoryKind::Sqlite);
            assert_eq!(config.database_path, PathBuf::from("data/app.sqlite"));
            assert_eq!(config.namespaces, vec!["app::settings".to_string()]);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("settings.yaml", "repository: sqlite\n")?;
            jail.set_env("SETTINGS_REPOSITORY", "in_memory");
            jail.set_env("SETTINGS_MANIFEST_PATH", "cache/manifest.json");

            let config = Config::load(Some(Path::new("settings.yaml")))
                .map_err(|err| err.to_string())?;
            assert_eq!(config.repository, RepositoryKind::InMemory);
            assert_eq!(config.manifest_path, PathBuf::from("cache/manifest.json"));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("settings.yaml", "driver: postgres\n")?;

            assert!(Config::load(Some(Path::new("settings.yaml"))).is_err());
            Ok(())
        });
    }
}
