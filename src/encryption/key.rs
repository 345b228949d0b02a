// ABOUTME: Encryption key entries referencing a provider by name
// ABOUTME: Resolves key properties with fallback to the deprecated top-level key fields

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncryptionKey {
    #[serde(default)]
    pub provider_name: Option<String>,

    #[serde(default)]
    pub active: bool,

    /// Usually a mapping; other shapes are carried through untouched.
    #[serde(default)]
    pub key_properties: Option<JsonValue>,

    /// Deprecated; superseded by `key_properties.encryption_key_name`
    #[serde(default)]
    pub encryption_key_name: Option<String>,

    /// Deprecated; superseded by `key_properties.encryption_password`
    #[serde(default)]
    pub encryption_password: Option<String>,

    #[serde(default)]
    pub dev_key: Option<JsonValue>,
}

impl EncryptionKey {
    fn properties_map(&self) -> Option<&Map<String, JsonValue>> {
        self.key_properties.as_ref().and_then(JsonValue::as_object)
    }

    fn property_str(&self, key: &str) -> Option<&str> {
        self.properties_map()
            .and_then(|props| props.get(key))
            .and_then(JsonValue::as_str)
    }

    /// Password from key properties, else the deprecated field
    pub fn password(&self) -> Option<&str> {
        self.property_str("encryption_password")
            .or(self.encryption_password.as_deref())
    }

    pub fn key_name(&self) -> Option<&str> {
        self.property_str("encryption_key_name")
            .or(self.encryption_key_name.as_deref())
    }

    /// `key_properties.encryption_password` was written, whatever its value
    pub fn declares_password(&self) -> bool {
        self.properties_map()
            .is_some_and(|props| props.contains_key("encryption_password"))
    }

    pub fn has_dev_key(&self) -> bool {
        self.dev_key.is_some()
    }

    /// Properties as written into the application config; the active key is flagged.
    pub fn rendered_properties(&self) -> JsonValue {
        let mut props = match &self.key_properties {
            Some(JsonValue::Object(map)) => map.clone(),
            Some(other) => return other.clone(),
            None => {
                let mut map = Map::new();
                if let Some(name) = &self.encryption_key_name {
                    map.insert("encryption_key_name".to_string(), name.clone().into());
                }
                if let Some(password) = &self.encryption_password {
                    map.insert("encryption_password".to_string(), password.clone().into());
                }
                map
            }
        };

        if self.active {
            props.insert("active".to_string(), JsonValue::Bool(true));
        }
        JsonValue::Object(props)
    }
}
