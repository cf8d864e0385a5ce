//! Common test utilities: tracing setup, output helpers, a recording storage
//! double and sample settings types

#![allow(dead_code)]

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::{Arc, Once};
use typed_settings::domain::prepare::{Encoding, NormalizedSetting, PrepareValue};
use typed_settings::domain::SettingsStorage;
use typed_settings::{InMemoryStorage, Schema, Setting, Settings, TypeDecl};

static TRACING: Once = Once::new();

/// Install a fmt subscriber honoring `RUST_LOG`, once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    init_tracing();
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

pub fn print_json(label: &str, value: &serde_json::Value) {
    println!(
        "   {}: {}",
        label,
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "N/A".to_string())
    );
}

/// A storage call as seen by `RecordingStorage`
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch {
        group: String,
        names: Option<Vec<String>>,
    },
    Insert {
        group: String,
        names: Vec<String>,
    },
    Update {
        group: String,
        entries: Vec<(String, serde_json::Value)>,
    },
    Upsert {
        group: String,
        names: Vec<String>,
    },
    Delete {
        group: String,
        names: Vec<String>,
    },
    Drop {
        group: String,
    },
    Rename {
        from: String,
        to: String,
    },
    SetLocked {
        group: String,
        names: Vec<String>,
        locked: bool,
    },
}

impl Call {
    pub fn is_write(&self) -> bool {
        !matches!(self, Call::Fetch { .. })
    }
}

/// In-memory storage that records every call it receives
pub struct RecordingStorage {
    inner: InMemoryStorage,
    calls: Mutex<Vec<Call>>,
    fail_writes: Mutex<bool>,
}

impl RecordingStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStorage::new(),
            calls: Mutex::new(Vec::new()),
            fail_writes: Mutex::new(false),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls().iter().filter(|call| !call.is_write()).count()
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    /// Make every following write fail with a backend error
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Stored (encoded) payload of one setting
    pub fn stored(&self, group: &str, name: &str) -> Option<serde_json::Value> {
        let names = [name.to_string()];
        self.inner
            .fetch(group, Some(&names[..]))
            .ok()?
            .into_iter()
            .next()
            .map(|setting| setting.payload)
    }

    fn record(&self, call: Call) -> Result<()> {
        let is_write = call.is_write();
        self.calls.lock().push(call);
        if is_write && *self.fail_writes.lock() {
            anyhow::bail!("storage unavailable");
        }
        Ok(())
    }
}

fn names(settings: &[NormalizedSetting]) -> Vec<String> {
    settings.iter().map(|setting| setting.name.clone()).collect()
}

impl SettingsStorage for RecordingStorage {
    fn encoding(&self) -> Encoding {
        self.inner.encoding()
    }

    fn fetch(&self, group: &str, names: Option<&[String]>) -> Result<Vec<Setting>> {
        self.record(Call::Fetch {
            group: group.to_string(),
            names: names.map(<[String]>::to_vec),
        })?;
        self.inner.fetch(group, names)
    }

    fn insert_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()> {
        self.record(Call::Insert {
            group: group.to_string(),
            names: names(settings),
        })?;
        self.inner.insert_many(group, settings)
    }

    fn update_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()> {
        self.record(Call::Update {
            group: group.to_string(),
            entries: settings
                .iter()
                .map(|setting| (setting.name.clone(), setting.payload.raw().clone()))
                .collect(),
        })?;
        self.inner.update_many(group, settings)
    }

    fn upsert_many(&self, group: &str, settings: &[NormalizedSetting]) -> Result<()> {
        self.record(Call::Upsert {
            group: group.to_string(),
            names: names(settings),
        })?;
        self.inner.upsert_many(group, settings)
    }

    fn delete_many(&self, group: &str, names: &[String]) -> Result<usize> {
        self.record(Call::Delete {
            group: group.to_string(),
            names: names.to_vec(),
        })?;
        self.inner.delete_many(group, names)
    }

    fn drop_group(&self, group: &str) -> Result<usize> {
        self.record(Call::Drop {
            group: group.to_string(),
        })?;
        self.inner.drop_group(group)
    }

    fn rename_group(&self, from: &str, to: &str) -> Result<usize> {
        self.record(Call::Rename {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        self.inner.rename_group(from, to)
    }

    fn set_locked(&self, group: &str, names: &[String], locked: bool) -> Result<usize> {
        self.record(Call::SetLocked {
            group: group.to_string(),
            names: names.to_vec(),
            locked,
        })?;
        self.inner.set_locked(group, names, locked)
    }
}

// ===== Sample settings types =====

pub mod app_settings {
    use super::*;
    use serde::{Deserialize, Serialize};

    /// Settings of the default group
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct GeneralSettings {
        pub site_name: String,
        pub max_retries: i64,
        pub ratio: f64,
        pub debug: bool,
        pub tags: Vec<String>,
        pub timezone: Option<String>,
    }

    impl Settings for GeneralSettings {
        const TYPE_ID: &'static str = typed_settings::settings_type_id!(GeneralSettings);

        fn schema() -> Schema {
            Schema::new()
                .field("site_name", TypeDecl::string())
                .field("max_retries", TypeDecl::int())
                .field("ratio", TypeDecl::float())
                .field("debug", TypeDecl::bool())
                .field("tags", TypeDecl::array())
                .field("timezone", TypeDecl::string().nullable())
        }
    }

    pub struct MailSettings;

    impl Settings for MailSettings {
        const TYPE_ID: &'static str = typed_settings::settings_type_id!(MailSettings);
        const GROUP: &'static str = "mail";

        fn schema() -> Schema {
            Schema::new()
                .field("host", TypeDecl::string())
                .field("port", TypeDecl::int())
        }
    }

    /// Competes with `MailSettings` for the `mail` group
    pub struct LegacyMailSettings;

    impl Settings for LegacyMailSettings {
        const TYPE_ID: &'static str = typed_settings::settings_type_id!(LegacyMailSettings);
        const GROUP: &'static str = "mail";

        fn schema() -> Schema {
            Schema::new().field("relay", TypeDecl::string())
        }
    }

    typed_settings::submit_settings!(GeneralSettings);
    typed_settings::submit_settings!(MailSettings);
}

pub mod billing_settings {
    use super::*;

    pub struct BillingSettings;

    impl Settings for BillingSettings {
        const TYPE_ID: &'static str = typed_settings::settings_type_id!(BillingSettings);
        const GROUP: &'static str = "billing";

        fn schema() -> Schema {
            Schema::new()
                .field("currency", TypeDecl::string())
                .field("vat", TypeDecl::float())
                .field("invoice_prefix", TypeDecl::Mixed)
        }
    }

    typed_settings::submit_settings!(BillingSettings);
}
