// ABOUTME: Encryption key and provider model for the credhub job
// ABOUTME: Flattens nested key/provider lists, pairs keys with providers and enforces key rules

pub mod error;
pub mod key;
pub mod provider;

pub use error::{EncryptionError, Result};
pub use key::EncryptionKey;
pub use provider::{EncryptionProvider, HsmServer, ProviderType, DEFAULT_HSM_PORT};

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::parser::properties::EncryptionProperties;

pub const MIN_PASSWORD_LENGTH: usize = 20;

const HSM_REQUIRED_CONNECTION_PROPERTIES: &[&str] = &[
    "partition",
    "partition_password",
    "client_certificate",
    "client_key",
];

/// Expand one level of list nesting; ops files concatenate key and provider lists.
pub fn flatten(values: &[JsonValue]) -> Vec<JsonValue> {
    let mut flat = Vec::with_capacity(values.len());
    for value in values {
        match value {
            JsonValue::Array(inner) => flat.extend(inner.iter().cloned()),
            other => flat.push(other.clone()),
        }
    }
    flat
}

#[derive(Debug, Clone, Default)]
pub struct EncryptionConfig {
    pub keys: Vec<EncryptionKey>,
    pub providers: Vec<EncryptionProvider>,
}

/// One provider entry of `encryption.providers` in the application config
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderConfig {
    pub provider_name: String,
    pub provider_type: String,
    pub keys: Vec<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Map<String, JsonValue>>,
}

impl EncryptionConfig {
    pub fn from_properties(properties: &EncryptionProperties) -> Result<Self> {
        let keys = flatten(&properties.keys)
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|e| EncryptionError::Malformed {
                    kind: "key".to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<EncryptionKey>>>()?;

        let providers = flatten(&properties.providers)
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|e| EncryptionError::Malformed {
                    kind: "provider".to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<EncryptionProvider>>>()?;

        debug!(
            "Loaded {} encryption keys across {} providers",
            keys.len(),
            providers.len()
        );
        Ok(Self { keys, providers })
    }

    pub fn active_keys(&self) -> Vec<&EncryptionKey> {
        self.keys.iter().filter(|k| k.active).collect()
    }

    pub fn provider(&self, name: &str) -> Option<&EncryptionProvider> {
        self.providers.iter().find(|p| p.name.as_deref() == Some(name))
    }

    pub fn providers_of(&self, kind: ProviderType) -> Vec<&EncryptionProvider> {
        self.providers.iter().filter(|p| p.is(kind)).collect()
    }

    pub fn hsm_provider(&self) -> Option<&EncryptionProvider> {
        self.providers.iter().find(|p| p.is(ProviderType::Hsm))
    }

    /// Keys paired with their provider, in provider order then key order
    pub fn keys_by_provider(&self) -> Vec<(&EncryptionProvider, Vec<&EncryptionKey>)> {
        self.providers
            .iter()
            .map(|provider| {
                let keys = self
                    .keys
                    .iter()
                    .filter(|k| k.provider_name.is_some() && k.provider_name == provider.name)
                    .collect();
                (provider, keys)
            })
            .collect()
    }

    /// Distinct provider names referenced by keys, in first-use order
    pub fn providers_in_use(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for key in &self.keys {
            if let Some(name) = &key.provider_name {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Deployment-time rules on the key and provider lists. Stops at the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.keys.iter().any(EncryptionKey::has_dev_key) {
            return Err(EncryptionError::DevKeyUnsupported);
        }

        let active = self.active_keys();
        if active.len() != 1 {
            return Err(EncryptionError::ActiveKeyCount {
                found: active.len(),
            });
        }

        if let Some(invalid) = self.providers.iter().find(|p| p.kind().is_none()) {
            return Err(EncryptionError::InvalidProviderType {
                provider_type: invalid.provider_type.clone(),
            });
        }

        for kind in [ProviderType::Hsm, ProviderType::KmsPlugin] {
            if self.providers_of(kind).len() > 1 {
                return Err(EncryptionError::DuplicateProviderType {
                    provider_type: kind.to_string(),
                });
            }
        }

        for provider in &self.providers {
            match provider.kind() {
                Some(ProviderType::Internal) if provider.connection_properties.is_some() => {
                    return Err(EncryptionError::UnexpectedConnectionProperties {
                        provider: provider.name.clone(),
                    });
                }
                Some(ProviderType::KmsPlugin) if provider.endpoint().is_none() => {
                    return Err(EncryptionError::MissingEndpoint {
                        provider: provider.name.clone(),
                    });
                }
                Some(ProviderType::Hsm)
                    if provider.connection_properties.is_some()
                        && provider.has_direct_partition() =>
                {
                    return Err(EncryptionError::PartitionProvidedTwice {
                        provider: provider.name.clone(),
                    });
                }
                _ => {}
            }
        }

        for key in &self.keys {
            let known = key
                .provider_name
                .as_deref()
                .is_some_and(|name| self.provider(name).is_some());
            if !known {
                return Err(EncryptionError::UnknownProvider {
                    provider_name: key.provider_name.clone(),
                });
            }
        }

        if self
            .keys
            .iter()
            .any(|k| k.declares_password() && k.password().map_or(true, str::is_empty))
        {
            return Err(EncryptionError::EmptyPassword);
        }

        if let Some(password) = active[0].password() {
            let length = password.chars().count();
            if length < MIN_PASSWORD_LENGTH {
                return Err(EncryptionError::PasswordTooShort { length });
            }
        }

        Ok(())
    }

    /// Keys may only reference one provider when migration between providers is unsupported.
    pub fn validate_single_provider(&self) -> Result<()> {
        let providers = self.providers_in_use();
        if providers.len() > 1 {
            return Err(EncryptionError::MultipleProvidersInUse { providers });
        }
        Ok(())
    }

    /// Build the `encryption.providers` entries, checking each provider has what it needs.
    pub fn provider_configs(&self) -> Result<Vec<ProviderConfig>> {
        self.keys_by_provider()
            .into_iter()
            .map(|(provider, keys)| {
                let kind = provider.kind();

                for key in &keys {
                    check_key_properties(kind, key)?;
                }

                let configuration = match kind {
                    Some(ProviderType::Internal) => None,
                    Some(ProviderType::KmsPlugin) => {
                        if provider.endpoint().is_none() {
                            return Err(missing(ProviderType::KmsPlugin, "endpoint"));
                        }
                        provider.connection_properties.clone()
                    }
                    Some(ProviderType::Hsm) => {
                        for property in HSM_REQUIRED_CONNECTION_PROPERTIES {
                            if provider.connection_str(property).is_none() {
                                return Err(missing(
                                    ProviderType::Hsm,
                                    &format!("connection_properties.{}", property),
                                ));
                            }
                        }
                        provider.connection_properties.clone()
                    }
                    None => provider.connection_properties.clone(),
                };

                Ok(ProviderConfig {
                    provider_name: provider.name().to_string(),
                    provider_type: provider.provider_type.clone().unwrap_or_default(),
                    keys: keys.iter().map(|k| k.rendered_properties()).collect(),
                    configuration,
                })
            })
            .collect()
    }
}

fn missing(kind: ProviderType, property: &str) -> EncryptionError {
    EncryptionError::MissingProperty {
        provider_type: kind.to_string(),
        property: property.to_string(),
    }
}

fn check_key_properties(kind: Option<ProviderType>, key: &EncryptionKey) -> Result<()> {
    let present = |value: Option<&str>| value.is_some_and(|v| !v.is_empty());
    match kind {
        Some(ProviderType::Internal) if !present(key.password()) => {
            Err(missing(ProviderType::Internal, "encryption_password"))
        }
        Some(kind @ (ProviderType::KmsPlugin | ProviderType::Hsm)) if !present(key.key_name()) => {
            Err(missing(kind, "encryption_key_name"))
        }
        _ => Ok(()),
    }
}
