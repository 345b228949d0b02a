// ABOUTME: Encryption provider entries and their connection properties
// ABOUTME: Covers internal, HSM and kms-plugin providers including deprecated direct partition fields

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

pub const DEFAULT_HSM_PORT: u16 = 1792;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    Internal,
    Hsm,
    KmsPlugin,
}

impl ProviderType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "internal" => Some(Self::Internal),
            "hsm" => Some(Self::Hsm),
            "kms-plugin" => Some(Self::KmsPlugin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Hsm => "hsm",
            Self::KmsPlugin => "kms-plugin",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncryptionProvider {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub provider_type: Option<String>,

    #[serde(default)]
    pub connection_properties: Option<Map<String, JsonValue>>,

    /// Deprecated; superseded by `connection_properties.partition`
    #[serde(default)]
    pub partition: Option<JsonValue>,

    /// Deprecated; superseded by `connection_properties.partition_password`
    #[serde(default)]
    pub partition_password: Option<JsonValue>,

    /// Deprecated; superseded by `connection_properties.servers`
    #[serde(default)]
    pub servers: Option<Vec<HsmServer>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HsmServer {
    pub host: String,

    #[serde(default)]
    pub port: Option<JsonValue>,

    #[serde(default)]
    pub certificate: Option<String>,

    #[serde(default)]
    pub partition_serial_number: Option<JsonValue>,
}

impl HsmServer {
    pub fn port(&self) -> String {
        match &self.port {
            Some(JsonValue::Number(n)) => n.to_string(),
            Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
            _ => DEFAULT_HSM_PORT.to_string(),
        }
    }
}

impl EncryptionProvider {
    pub fn kind(&self) -> Option<ProviderType> {
        self.provider_type.as_deref().and_then(ProviderType::parse)
    }

    pub fn is(&self, kind: ProviderType) -> bool {
        self.kind() == Some(kind)
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn connection_property(&self, key: &str) -> Option<&JsonValue> {
        self.connection_properties
            .as_ref()
            .and_then(|props| props.get(key))
            .filter(|value| !value.is_null())
    }

    /// Non-empty string connection property
    pub fn connection_str(&self, key: &str) -> Option<&str> {
        self.connection_property(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.connection_str("endpoint")
    }

    pub fn has_direct_partition(&self) -> bool {
        self.partition.is_some() || self.partition_password.is_some()
    }

    /// Partition from connection properties, falling back to the deprecated direct fields
    pub fn partition(&self) -> Option<String> {
        self.connection_str("partition")
            .map(str::to_string)
            .or_else(|| scalar_string(self.partition.as_ref()))
    }

    pub fn partition_password(&self) -> Option<String> {
        self.connection_str("partition_password")
            .map(str::to_string)
            .or_else(|| scalar_string(self.partition_password.as_ref()))
    }

    /// HSM servers from connection properties, falling back to the deprecated `servers` list
    pub fn hsm_servers(&self) -> Vec<HsmServer> {
        if let Some(servers) = self.connection_property("servers") {
            if let Ok(parsed) = serde_json::from_value::<Vec<HsmServer>>(servers.clone()) {
                return parsed;
            }
        }
        self.servers.clone().unwrap_or_default()
    }
}

fn scalar_string(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
