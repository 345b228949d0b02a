// ABOUTME: Typed view of the credhub job properties with job spec defaults applied
// ABOUTME: Key and provider lists stay raw so nested and malformed shapes reach validation

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error::{ParserError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredhubProperties {
    pub port: u16,
    pub java7_tls_ciphers_enabled: bool,
    pub max_heap_size: u32,
    pub log_level: String,
    pub tls: TlsProperties,
    pub authentication: AuthenticationProperties,
    pub authorization: AuthorizationProperties,
    pub data_storage: DataStorageProperties,
    pub encryption: EncryptionProperties,
    pub certificates: CertificatesProperties,
    pub backend: BackendProperties,
    pub backends: BackendsProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsProperties {
    pub certificate: Option<String>,
    pub private_key: Option<String>,
    pub ca: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationProperties {
    pub uaa: UaaProperties,
    pub mutual_tls: MutualTlsProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UaaProperties {
    pub enabled: bool,
    pub url: Option<String>,
    pub internal_url: Option<String>,
    /// Anything but a list of strings reads as no CA certs
    #[serde(deserialize_with = "string_list_or_empty")]
    pub ca_certs: Vec<String>,
    pub wait_for_start: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MutualTlsProperties {
    pub trusted_cas: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationProperties {
    pub acls: AclProperties,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AclProperties {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// Required; a missing path is reported by the authorization rule rather than at load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub operations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataStorageProperties {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub host: Option<String>,
    /// Integer or string; rendered as written.
    pub port: Option<JsonValue>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Kept untyped so a non-boolean value can be reported instead of rejected at load.
    pub require_tls: JsonValue,
    pub tls_ca: Option<String>,
    pub hostname_verification: HostnameVerification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostnameVerification {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionProperties {
    pub keys: Vec<JsonValue>,
    pub providers: Vec<JsonValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificatesProperties {
    pub concatenate_cas: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendProperties {
    pub enable_swappable_backend: bool,
    pub socket_file: Option<String>,
    pub host: Option<String>,
    pub ca_cert: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsProperties {
    pub conjur: ConjurProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConjurProperties {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub base_policy: Option<String>,
    pub account_name: Option<String>,
    pub user_name: Option<String>,
    pub api_key: Option<String>,
}

impl Default for CredhubProperties {
    fn default() -> Self {
        Self {
            port: 8844,
            java7_tls_ciphers_enabled: false,
            max_heap_size: 1024,
            log_level: "info".to_string(),
            tls: TlsProperties::default(),
            authentication: AuthenticationProperties::default(),
            authorization: AuthorizationProperties::default(),
            data_storage: DataStorageProperties::default(),
            encryption: EncryptionProperties::default(),
            certificates: CertificatesProperties::default(),
            backend: BackendProperties::default(),
            backends: BackendsProperties::default(),
        }
    }
}

impl Default for UaaProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            internal_url: None,
            ca_certs: Vec::new(),
            wait_for_start: true,
        }
    }
}

impl Default for AclProperties {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for DataStorageProperties {
    fn default() -> Self {
        Self {
            kind: None,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            require_tls: JsonValue::Bool(true),
            tls_ca: None,
            hostname_verification: HostnameVerification::default(),
        }
    }
}

impl Default for HostnameVerification {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn string_list_or_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl CredhubProperties {
    /// Extract the `credhub` subtree from a manifest property tree
    pub fn from_properties(properties: &JsonValue) -> Result<Self> {
        match properties.get("credhub") {
            None | Some(JsonValue::Null) => Ok(Self::default()),
            Some(credhub) => {
                serde_json::from_value(credhub.clone()).map_err(|e| ParserError::InvalidProperty {
                    path: "credhub".to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn tls_certificate_and_key(&self) -> Option<(&str, &str)> {
        match (self.tls.certificate.as_deref(), self.tls.private_key.as_deref()) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => Some((cert, key)),
            _ => None,
        }
    }

    pub fn mutual_tls_enabled(&self) -> bool {
        !self.authentication.mutual_tls.trusted_cas.is_empty()
    }
}

impl UaaProperties {
    /// URL used to reach UAA from this instance; empty values count as unset
    pub fn reachable_url(&self) -> Option<&str> {
        self.internal_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or(self.url.as_deref().filter(|url| !url.is_empty()))
    }
}

impl DataStorageProperties {
    /// `None` when `require_tls` is not a boolean
    pub fn require_tls(&self) -> Option<bool> {
        self.require_tls.as_bool()
    }

    pub fn tls_ca(&self) -> Option<&str> {
        self.tls_ca.as_deref().filter(|ca| !ca.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_without_credhub_section() {
        let props = CredhubProperties::from_properties(&json!({})).unwrap();

        assert_eq!(props.port, 8844);
        assert_eq!(props.max_heap_size, 1024);
        assert_eq!(props.log_level, "info");
        assert!(props.authentication.uaa.enabled);
        assert!(props.authentication.uaa.wait_for_start);
        assert!(props.authorization.acls.enabled);
        assert!(props.authorization.permissions.is_empty());
        assert_eq!(props.data_storage.require_tls(), Some(true));
        assert!(props.data_storage.hostname_verification.enabled);
        assert!(!props.backends.conjur.enabled);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let props = CredhubProperties::from_properties(&json!({
            "credhub": {
                "authentication": {"uaa": {"url": "https://uaa.example.com"}},
                "data_storage": {"type": "mysql", "port": "3306"}
            }
        }))
        .unwrap();

        assert!(props.authentication.uaa.enabled);
        assert_eq!(
            props.authentication.uaa.url.as_deref(),
            Some("https://uaa.example.com")
        );
        assert_eq!(props.data_storage.kind.as_deref(), Some("mysql"));
        assert_eq!(props.data_storage.port, Some(json!("3306")));
        assert_eq!(props.data_storage.require_tls(), Some(true));
    }

    #[test]
    fn test_scalar_ca_certs_read_as_empty() {
        let props = CredhubProperties::from_properties(&json!({
            "credhub": {"authentication": {"uaa": {"ca_certs": "FAKE-TEST-CA-CERT"}}}
        }))
        .unwrap();

        assert!(props.authentication.uaa.ca_certs.is_empty());
    }

    #[test]
    fn test_non_boolean_require_tls_is_preserved() {
        let props = CredhubProperties::from_properties(&json!({
            "credhub": {"data_storage": {"require_tls": "yes"}}
        }))
        .unwrap();

        assert_eq!(props.data_storage.require_tls(), None);
    }

    #[test]
    fn test_conjur_properties_use_dashed_names() {
        let props = CredhubProperties::from_properties(&json!({
            "credhub": {"backends": {"conjur": {
                "enabled": true,
                "base-url": "https://conjur",
                "api-key": "secret"
            }}}
        }))
        .unwrap();

        assert!(props.backends.conjur.enabled);
        assert_eq!(props.backends.conjur.base_url.as_deref(), Some("https://conjur"));
        assert_eq!(props.backends.conjur.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_reachable_url_prefers_internal_url() {
        let mut uaa = UaaProperties {
            url: Some("https://public".to_string()),
            ..Default::default()
        };
        assert_eq!(uaa.reachable_url(), Some("https://public"));

        uaa.internal_url = Some("https://internal".to_string());
        assert_eq!(uaa.reachable_url(), Some("https://internal"));

        let empty = UaaProperties {
            url: Some(String::new()),
            internal_url: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(empty.reachable_url(), None);
    }

    #[test]
    fn test_tls_certificate_requires_both_halves() {
        let mut props = CredhubProperties::default();
        props.tls.certificate = Some("cert".to_string());
        assert!(props.tls_certificate_and_key().is_none());

        props.tls.private_key = Some("key".to_string());
        assert_eq!(props.tls_certificate_and_key(), Some(("cert", "key")));
    }

    #[test]
    fn test_permission_without_path_still_loads() {
        let props = CredhubProperties::from_properties(&json!({
            "credhub": {"authorization": {"permissions": [
                {"actors": ["uaa-user:admin"], "operations": ["read"]}
            ]}}
        }))
        .unwrap();

        let permission = &props.authorization.permissions[0];
        assert!(permission.path.is_none());
        assert_eq!(permission.actors, vec!["uaa-user:admin"]);
    }

    #[test]
    fn test_wrong_type_is_reported_with_path() {
        let err = CredhubProperties::from_properties(&json!({
            "credhub": {"port": "not-a-port"}
        }))
        .unwrap_err();

        assert!(err.to_string().contains("credhub"));
    }
}
