//! Value preparers applied around storage
//!
//! A preparer wraps one raw value and knows how to encode it for a backend
//! (`transform`) and decode it back (`restore`). Every preparer satisfies
//! `restore(transform(v)) == v`.

use crate::contract::SettingsError;
use serde_json::Value;

/// Encode/decode wrapper around a raw setting value
pub trait PrepareValue {
    /// Encoded form handed to the storage backend
    fn transform(&self) -> Value;

    /// Decoded form of a value read back from the storage backend
    fn restore(&self) -> Result<Value, SettingsError>;

    /// The wrapped value as given
    fn raw(&self) -> &Value;
}

/// Stores values as they are
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityValue(Value);

impl PrepareValue for IdentityValue {
    fn transform(&self) -> Value {
        self.0.clone()
    }

    fn restore(&self) -> Result<Value, SettingsError> {
        Ok(self.0.clone())
    }

    fn raw(&self) -> &Value {
        &self.0
    }
}

/// Stores values as JSON text; null stays null
#[derive(Debug, Clone, PartialEq)]
pub struct JsonValue(Value);

impl PrepareValue for JsonValue {
    fn transform(&self) -> Value {
        match &self.0 {
            Value::Null => Value::Null,
            value => Value::String(value.to_string()),
        }
    }

    fn restore(&self) -> Result<Value, SettingsError> {
        match &self.0 {
            Value::String(text) => Ok(serde_json::from_str(text)?),
            value => Ok(value.clone()),
        }
    }

    fn raw(&self) -> &Value {
        &self.0
    }
}

/// Encoding used by a storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Identity,
    Json,
}

impl Encoding {
    pub fn prepare(self, value: Value) -> PreparedValue {
        match self {
            Encoding::Identity => PreparedValue::Identity(IdentityValue(value)),
            Encoding::Json => PreparedValue::Json(JsonValue(value)),
        }
    }
}

/// A value wrapped by the preparer of its backend's encoding
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedValue {
    Identity(IdentityValue),
    Json(JsonValue),
}

impl PrepareValue for PreparedValue {
    fn transform(&self) -> Value {
        match self {
            PreparedValue::Identity(value) => value.transform(),
            PreparedValue::Json(value) => value.transform(),
        }
    }

    fn restore(&self) -> Result<Value, SettingsError> {
        match self {
            PreparedValue::Identity(value) => value.restore(),
            PreparedValue::Json(value) => value.restore(),
        }
    }

    fn raw(&self) -> &Value {
        match self {
            PreparedValue::Identity(value) => value.raw(),
            PreparedValue::Json(value) => value.raw(),
        }
    }
}

/// A setting name paired with its prepared value, ready for a bulk write
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSetting {
    pub name: String,
    pub payload: PreparedValue,
}

impl NormalizedSetting {
    pub fn new(name: impl Into<String>, payload: PreparedValue) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn samples() -> Vec<Value> {
        vec![
            json!("dark"),
            json!("42"),
            json!(""),
            json!(7),
            json!(1.5),
            json!(false),
            json!([1, "two", null]),
            json!({"nested": {"deep": true}}),
            Value::Null,
        ]
    }

    #[test]
    fn test_identity_round_trip() {
        for value in samples() {
            let stored = Encoding::Identity.prepare(value.clone()).transform();
            let restored = Encoding::Identity.prepare(stored).restore().unwrap();
            assert_eq!(restored, value);
        }
    }

    #[test]
    fn test_json_round_trip() {
        for value in samples() {
            let stored = Encoding::Json.prepare(value.clone()).transform();
            let restored = Encoding::Json.prepare(stored.clone()).restore().unwrap();
            assert_eq!(restored, value, "stored form: {stored:?}");
        }
    }

    #[test]
    fn test_json_transform_produces_text() {
        let prepared = Encoding::Json.prepare(json!({"a": 1}));

        assert_eq!(prepared.transform(), json!("{\"a\":1}"));
        assert_eq!(prepared.raw(), &json!({"a": 1}));
    }

    #[test]
    fn test_json_restore_rejects_garbage() {
        let prepared = Encoding::Json.prepare(json!("not json"));
        assert!(matches!(prepared.restore(), Err(SettingsError::Payload(_))));
    }
}
