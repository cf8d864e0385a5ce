//! Persisted group to settings type map used for warm boot
//!
//! The manifest is a JSON object `{ "group": "type::identifier" }`. It is
//! always written in full; a stale manifest is the caller's problem.

use crate::contract::SettingsError;
use indexmap::IndexMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SettingsManifest {
    path: PathBuf,
}

impl SettingsManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn present(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<IndexMap<String, String>, SettingsError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SettingsError::ManifestLoad {
                    path: self.path.clone(),
                })
            }
            Err(source) => {
                return Err(SettingsError::ManifestIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&contents).map_err(|source| SettingsError::ManifestFormat {
            path: self.path.clone(),
            source,
        })
    }

    /// Write `settings` as the new manifest, replacing any previous one
    pub fn generate(&self, settings: &IndexMap<String, String>) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let contents =
            serde_json::to_string_pretty(settings).map_err(|source| SettingsError::ManifestFormat {
                path: self.path.clone(),
                source,
            })?;
        fs::write(&self.path, contents).map_err(|source| self.io_error(source))?;

        tracing::info!(
            path = %self.path.display(),
            count = settings.len(),
            "Settings manifest generated"
        );
        Ok(())
    }

    /// Delete the manifest. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, SettingsError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Settings manifest cleared");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::ManifestIo {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_absent_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = SettingsManifest::new(dir.path().join("settings.json"));

        assert!(!manifest.present());
        assert!(matches!(
            manifest.load(),
            Err(SettingsError::ManifestLoad { .. })
        ));
    }

    #[test]
    fn test_generate_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = SettingsManifest::new(dir.path().join("cache").join("settings.json"));
        let map = IndexMap::from([
            ("mail".to_string(), "app::settings::Mail".to_string()),
            ("default".to_string(), "app::settings::General".to_string()),
        ]);

        manifest.generate(&map).unwrap();
        assert!(manifest.present());
        assert_eq!(manifest.load().unwrap(), map);

        assert!(manifest.clear().unwrap());
        assert!(!manifest.present());
        assert!(!manifest.clear().unwrap());
    }

    #[test]
    fn test_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2").unwrap();

        let manifest = SettingsManifest::new(path);
        assert!(matches!(
            manifest.load(),
            Err(SettingsError::ManifestFormat { .. })
        ));
    }
}
