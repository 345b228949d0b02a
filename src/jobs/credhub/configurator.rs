// ABOUTME: Legacy single-file application.yml read by older CredHub releases
// ABOUTME: Rendered on request or by `configure`; whole-job renders and checks skip it

use serde::Serialize;

use super::application::{
    CIPHER_SUITES, JAVA7_CIPHER_SUITES, KEY_STORE_PATH, LOG4J_CONFIG_PATH, MTLS_TRUST_STORE_PATH,
    TLS_KEY_ALIAS,
};
use super::JOB;
use crate::database::{DataStorage, DataStorageType, TRUST_STORE_PATH};
use crate::encryption::{EncryptionConfig, ProviderType};
use crate::jobs::{to_yaml, RenderContext, RenderUnit, Result, UnitKind};

pub const LEGACY_APPLICATION_PATH: &str = "config/application.yml";

pub const KEY_STORE_PASSWORD_PLACEHOLDER: &str = "KEY_STORE_PASSWORD_PLACEHOLDER";
pub const TRUST_STORE_PASSWORD_PLACEHOLDER: &str = "TRUST_STORE_PASSWORD_PLACEHOLDER";
pub const MTLS_TRUST_STORE_PASSWORD_PLACEHOLDER: &str = "MTLS_TRUST_STORE_PASSWORD_PLACEHOLDER";

#[derive(Debug, Serialize)]
pub struct LegacyApplicationConfig {
    pub server: Server,
    pub security: Security,
    pub auth_server: AuthServer,
    pub spring: Spring,
    pub flyway: Flyway,
    pub encryption: Encryption,
    pub hsm: Hsm,
    pub logging: Logging,
}

#[derive(Debug, Serialize)]
pub struct Server {
    pub port: u16,
    pub ssl: Ssl,
}

#[derive(Debug, Serialize)]
pub struct Ssl {
    pub enabled: bool,
    pub key_store: &'static str,
    pub key_password: &'static str,
    pub key_alias: &'static str,
    pub ciphers: String,
    pub enabled_protocols: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_auth: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_store: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_store_password: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_store_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct Security {
    pub oauth2: Toggle,
    pub authorization: Authorization,
}

#[derive(Debug, Serialize)]
pub struct Toggle {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct Authorization {
    pub acls: Toggle,
}

/// Empty strings throughout when UAA is disabled
#[derive(Debug, Default, Serialize)]
pub struct AuthServer {
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub internal_url: String,
    pub trust_store: String,
    pub trust_store_password: String,
}

#[derive(Debug, Serialize)]
pub struct Spring {
    pub jpa: Jpa,
    pub datasource: Datasource,
}

#[derive(Debug, Serialize)]
pub struct Jpa {
    pub hibernate: Hibernate,
}

#[derive(Debug, Serialize)]
pub struct Hibernate {
    pub ddl_auto: &'static str,
}

/// Empty strings for in-memory storage
#[derive(Debug, Default, Serialize)]
pub struct Datasource {
    pub username: String,
    pub password: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct Flyway {
    pub locations: Vec<String>,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct Encryption {
    pub key_creation_enabled: bool,
    pub keys: Vec<Key>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Key {
    pub provider_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key_name: Option<String>,
    pub active: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct Hsm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Logging {
    pub config: &'static str,
}

impl LegacyApplicationConfig {
    /// Build the document; keys must stay within one provider.
    pub fn build(ctx: &RenderContext) -> Result<Self> {
        let credhub = &ctx.credhub;
        let encryption = ctx.encryption()?;
        encryption.validate_single_provider()?;
        let storage = ctx.data_storage()?;

        let mut ciphers: Vec<&str> = CIPHER_SUITES.to_vec();
        if credhub.java7_tls_ciphers_enabled {
            ciphers.extend_from_slice(JAVA7_CIPHER_SUITES);
        }

        let mtls = credhub.mutual_tls_enabled();
        let server = Server {
            port: credhub.port,
            ssl: Ssl {
                enabled: true,
                key_store: KEY_STORE_PATH,
                key_password: KEY_STORE_PASSWORD_PLACEHOLDER,
                key_alias: TLS_KEY_ALIAS,
                ciphers: ciphers.join(", "),
                enabled_protocols: "TLSv1.2",
                client_auth: mtls.then_some("want"),
                trust_store: mtls.then_some(MTLS_TRUST_STORE_PATH),
                trust_store_password: mtls.then_some(MTLS_TRUST_STORE_PASSWORD_PLACEHOLDER),
                trust_store_type: mtls.then_some("JKS"),
            },
        };

        let uaa = &credhub.authentication.uaa;
        let auth_server = if uaa.enabled {
            AuthServer {
                url: uaa.url.clone().unwrap_or_default(),
                internal_url: uaa.internal_url.clone().unwrap_or_default(),
                trust_store: TRUST_STORE_PATH.to_string(),
                trust_store_password: TRUST_STORE_PASSWORD_PLACEHOLDER.to_string(),
            }
        } else {
            AuthServer::default()
        };

        let (keys, hsm) = keys_and_hsm(&encryption);

        Ok(Self {
            server,
            security: Security {
                oauth2: Toggle {
                    enabled: uaa.enabled,
                },
                authorization: Authorization {
                    acls: Toggle {
                        enabled: credhub.authorization.acls.enabled,
                    },
                },
            },
            auth_server,
            spring: Spring {
                jpa: Jpa {
                    hibernate: Hibernate {
                        ddl_auto: "validate",
                    },
                },
                datasource: datasource(&storage),
            },
            flyway: Flyway {
                locations: storage.kind.flyway_locations(),
                enabled: ctx.bootstrap(),
            },
            encryption: Encryption {
                key_creation_enabled: ctx.bootstrap(),
                keys,
            },
            hsm,
            logging: Logging {
                config: LOG4J_CONFIG_PATH,
            },
        })
    }
}

/// One entry per key, typed by its provider; the last HSM provider referenced sets the partition.
fn keys_and_hsm(encryption: &EncryptionConfig) -> (Vec<Key>, Hsm) {
    let mut hsm = Hsm::default();
    let keys = encryption
        .keys
        .iter()
        .map(|key| {
            let provider = key
                .provider_name
                .as_deref()
                .and_then(|name| encryption.provider(name));

            if let Some(provider) = provider.filter(|p| p.is(ProviderType::Hsm)) {
                hsm = Hsm {
                    partition: provider.partition(),
                    partition_password: provider.partition_password(),
                };
            }

            Key {
                provider_type: provider
                    .and_then(|p| p.provider_type.clone())
                    .unwrap_or_default(),
                encryption_password: key.password().filter(|p| !p.is_empty()).map(str::to_string),
                encryption_key_name: key.key_name().filter(|n| !n.is_empty()).map(str::to_string),
                active: key.active,
            }
        })
        .collect();
    (keys, hsm)
}

fn datasource(storage: &DataStorage) -> Datasource {
    let host = storage.host.as_deref().unwrap_or_default();
    let port = storage.port.as_deref().unwrap_or_default();
    let database = storage.database.as_deref().unwrap_or_default();

    let url = match storage.kind {
        DataStorageType::InMemory => return Datasource::default(),
        DataStorageType::Mysql => {
            let mut url = format!("jdbc:mariadb://{}:{}/{}?autoReconnect=true", host, port, database);
            if storage.require_tls {
                url.push_str("&useSSL=true&requireSSL=true&verifyServerCertificate=true");
                url.push_str("&enabledSslProtocolSuites=TLSv1,TLSv1.1,TLSv1.2");
                url.push_str(&format!(
                    "&trustCertificateKeyStorePassword={}",
                    TRUST_STORE_PASSWORD_PLACEHOLDER
                ));
                url.push_str(&format!("&trustCertificateKeyStoreUrl={}", TRUST_STORE_PATH));
                if !storage.hostname_verification {
                    url.push_str("&disableSslHostnameVerification=true");
                }
            }
            url
        }
        DataStorageType::Postgres => {
            let mut url = format!("jdbc:postgresql://{}:{}/{}?autoReconnect=true", host, port, database);
            if storage.require_tls {
                url.push_str("&ssl=true");
            }
            url
        }
    };

    Datasource {
        username: storage.username.clone().unwrap_or_default(),
        password: storage.password.clone().unwrap_or_default(),
        url,
    }
}

pub struct LegacyApplicationFile;

impl RenderUnit for LegacyApplicationFile {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        LEGACY_APPLICATION_PATH
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Legacy
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        to_yaml(Some(&LegacyApplicationConfig::build(ctx)?))
    }
}
