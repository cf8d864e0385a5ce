//! Integration tests for the module wiring, the native client and migrations

mod common;

use common::app_settings::{GeneralSettings, MailSettings};
use common::billing_settings::BillingSettings;
use common::{print_json, print_test_header};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::sync::Arc;
use typed_settings::config::RepositoryKind;
use typed_settings::domain::{InventoryFinder, SettingsManifest, SettingsMigrator};
use typed_settings::{
    Config, InMemoryStorage, Repository, Settings, SettingsApi, SettingsDescriptor,
    SettingsError, SettingsModule, SettingsRegistry,
};

fn config(dir: &tempfile::TempDir) -> Config {
    Config {
        repository: RepositoryKind::InMemory,
        database_path: dir.path().join("settings.sqlite"),
        manifest_path: dir.path().join("settings.json"),
        namespaces: vec![SettingsDescriptor::of::<MailSettings>().namespace().to_string()],
        classes: vec![BillingSettings::TYPE_ID.to_string()],
    }
}

#[test]
fn test_module_init_registers_and_boots() {
    print_test_header(
        "test_module_init_registers_and_boots",
        &[
            "init registers configured types, discovers namespaces and boots",
            "The client serves every registered group",
        ],
    );

    let dir = tempfile::tempdir().unwrap();
    let module = SettingsModule::new();
    module.init(config(&dir)).unwrap();

    let registry = module.registry().unwrap();
    assert!(registry.is_booted());
    assert_eq!(
        registry.registered(),
        IndexMap::from([
            ("billing".to_string(), BillingSettings::TYPE_ID.to_string()),
            ("default".to_string(), GeneralSettings::TYPE_ID.to_string()),
            ("mail".to_string(), MailSettings::TYPE_ID.to_string()),
        ])
    );
    println!("✅ {} groups registered", registry.registered().len());
}

#[test]
fn test_module_init_rejects_unknown_class() {
    print_test_header(
        "test_module_init_rejects_unknown_class",
        &["A configured type nobody provides fails init"],
    );

    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.classes.push("nowhere::Ghost".to_string());

    let module = SettingsModule::new();
    let err = module.init(config).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SettingsError>(),
        Some(SettingsError::UnknownSettingsType { .. })
    ));
    assert!(module.registry().is_err());
}

#[test]
fn test_client_get_and_set() {
    print_test_header(
        "test_client_get_and_set",
        &["Group-scoped get/set through the native client"],
    );

    let dir = tempfile::tempdir().unwrap();
    let module = SettingsModule::new();
    module.init(config(&dir)).unwrap();

    module
        .migrator()
        .unwrap()
        .in_group("mail", |blueprint| {
            blueprint.add("host", json!("localhost")).add("port", json!(25));
        })
        .unwrap();

    let client = module.client().unwrap();
    assert_eq!(
        client.get("mail", "host", Value::Null).unwrap(),
        json!("localhost")
    );

    client
        .set(
            "mail",
            IndexMap::from([
                ("port".to_string(), json!("587")),
                ("unknown".to_string(), json!(true)),
            ]),
        )
        .unwrap();

    let values = client.get_many("mail", &["host", "port"], Value::Null).unwrap();
    print_json("mail", &Value::Object(values.clone().into_iter().collect()));
    assert_eq!(values["port"], json!(587));

    let stored = Repository::with_group(module.storage().unwrap(), "mail")
        .get_value("port", Value::Null)
        .unwrap();
    assert_eq!(stored, json!(587));
    assert_eq!(
        client.all("mail").unwrap(),
        IndexMap::from([
            ("host".to_string(), json!("localhost")),
            ("port".to_string(), json!(587)),
        ])
    );
}

#[test]
fn test_client_unknown_group() {
    print_test_header(
        "test_client_unknown_group",
        &["The client reports groups nothing is bound to"],
    );

    let dir = tempfile::tempdir().unwrap();
    let module = SettingsModule::new();
    module.init(config(&dir)).unwrap();
    let client = module.client().unwrap();

    assert!(matches!(
        client.get("nowhere", "key", Value::Null),
        Err(SettingsError::GroupNotFound { group }) if group == "nowhere"
    ));
}

#[test]
fn test_module_with_sqlite_and_manifest() {
    print_test_header(
        "test_module_with_sqlite_and_manifest",
        &[
            "A second init warm boots from the manifest written by the first",
            "Values persist in the SQLite database",
        ],
    );

    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.repository = RepositoryKind::Sqlite;

    let first = SettingsModule::new();
    first.init(config.clone()).unwrap();
    first
        .migrator()
        .unwrap()
        .in_group("billing", |blueprint| {
            blueprint.add("currency", json!("EUR"));
        })
        .unwrap();
    first.registry().unwrap().generate_manifest().unwrap();
    drop(first);

    let mut warm_config = config.clone();
    warm_config.namespaces.clear();
    warm_config.classes.clear();
    let second = SettingsModule::new();
    second.init(warm_config).unwrap();

    let registry = second.registry().unwrap();
    assert_eq!(registry.registered().len(), 3);
    assert_eq!(
        second
            .client()
            .unwrap()
            .get("billing", "currency", Value::Null)
            .unwrap(),
        json!("EUR")
    );
}

#[test]
fn test_migrations() {
    print_test_header(
        "test_migrations",
        &[
            "Blueprints remove first, then add without overwriting",
            "Added names are stored in snake_case",
        ],
    );

    let storage = Arc::new(InMemoryStorage::new());
    let migrator = SettingsMigrator::new(storage.clone());

    migrator
        .default_group(|blueprint| {
            blueprint.add("siteName", json!("Acme")).add("legacy", json!(1));
        })
        .unwrap();
    migrator
        .default_group(|blueprint| {
            blueprint.remove("legacy");
            blueprint.add("site_name", json!("Other"));
        })
        .unwrap();

    let repo = Repository::with_group(storage.clone(), "default");
    assert_eq!(
        repo.get_all().unwrap(),
        IndexMap::from([("site_name".to_string(), json!("Acme"))])
    );

    assert_eq!(migrator.rename("default", "general").unwrap(), 1);
    assert_eq!(storage.count("general"), 1);
    assert_eq!(migrator.drop_group("general").unwrap(), 1);
    assert_eq!(storage.count("general"), 0);
}

#[test]
fn test_registry_over_shared_caches() {
    print_test_header(
        "test_registry_over_shared_caches",
        &["Caches are injected objects owned by whoever builds the registry"],
    );

    let dir = tempfile::tempdir().unwrap();
    let schemas = Arc::new(typed_settings::domain::SchemaCache::new());
    let instances = Arc::new(typed_settings::domain::InstanceCache::new());
    let registry = SettingsRegistry::with_caches(
        Arc::new(InMemoryStorage::new()),
        SettingsManifest::new(dir.path().join("settings.json")),
        Arc::new(InventoryFinder),
        schemas.clone(),
        instances.clone(),
    );

    registry.register::<MailSettings>().unwrap();
    registry.resolve_settings("mail").unwrap().unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(instances.len(), 1);

    registry.clear_registered_settings();
    assert!(schemas.is_empty());
    assert!(instances.is_empty());
}
