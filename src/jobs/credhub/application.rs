// ABOUTME: Spring Boot application documents of the credhub job (config/application/*.yml)
// ABOUTME: Each document is its own render unit, loaded by Spring Boot from the directory

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::JOB;
use crate::database::TRUST_STORE_PATH;
use crate::jobs::{to_yaml, RenderContext, RenderError, RenderUnit, Result, UnitKind};
use crate::parser::Permission;

pub const KEY_STORE_PATH: &str = "/var/vcap/jobs/credhub/config/cacerts.jks";
pub const MTLS_TRUST_STORE_PATH: &str = "/var/vcap/jobs/credhub/config/mtls_trust_store.jks";
pub const LOG4J_CONFIG_PATH: &str = "/var/vcap/jobs/credhub/config/log4j2.properties";
pub const TLS_KEY_ALIAS: &str = "credhub_tls_cert";

pub const CIPHER_SUITES: &[&str] = &[
    "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_DHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
];

pub const JAVA7_CIPHER_SUITES: &[&str] = &[
    "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
];

type DocumentFn = fn(&RenderContext) -> Result<Option<JsonValue>>;

/// Documents in the order Spring Boot loads them
const DOCUMENTS: &[(&str, DocumentFn)] = &[
    ("config/application/server.yml", server_document),
    ("config/application/security.yml", security_document),
    ("config/application/auth-server.yml", auth_server_document),
    ("config/application/spring.yml", spring_document),
    ("config/application/encryption.yml", encryption_document),
    ("config/application/conjur.yml", conjur_document),
    ("config/application/logging.yml", logging_document),
];

#[derive(Serialize)]
struct ServerDocument {
    server: Server,
    spring: Profiles,
    certificates: Certificates,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<Backend>,
}

#[derive(Serialize)]
struct Server {
    port: u16,
    ssl: Ssl,
}

#[derive(Serialize)]
struct Ssl {
    enabled: bool,
    enabled_protocols: &'static str,
    key_store: &'static str,
    key_password: &'static str,
    key_store_password: &'static str,
    key_alias: &'static str,
    ciphers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_auth: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trust_store: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trust_store_password: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trust_store_type: Option<&'static str>,
}

#[derive(Serialize)]
struct Profiles {
    profiles: ActiveProfiles,
}

#[derive(Serialize)]
struct ActiveProfiles {
    active: String,
}

#[derive(Serialize)]
struct Certificates {
    concatenate_cas: bool,
}

#[derive(Serialize)]
struct Backend {
    socket_file: String,
    host: String,
    ca_cert: String,
}

fn server_document(ctx: &RenderContext) -> Result<Option<JsonValue>> {
    let credhub = &ctx.credhub;

    let mut ciphers: Vec<&str> = CIPHER_SUITES.to_vec();
    if credhub.java7_tls_ciphers_enabled {
        ciphers.extend_from_slice(JAVA7_CIPHER_SUITES);
    }

    let mtls = credhub.mutual_tls_enabled();
    let ssl = Ssl {
        enabled: true,
        enabled_protocols: "TLSv1.2",
        key_store: KEY_STORE_PATH,
        key_password: "${KEY_STORE_PASSWORD}",
        key_store_password: "${KEY_STORE_PASSWORD}",
        key_alias: TLS_KEY_ALIAS,
        ciphers: ciphers.join(","),
        client_auth: mtls.then_some("want"),
        trust_store: mtls.then_some(MTLS_TRUST_STORE_PATH),
        trust_store_password: mtls.then_some("${MTLS_TRUST_STORE_PASSWORD}"),
        trust_store_type: mtls.then_some("JKS"),
    };

    let swappable = &credhub.backend;
    let backend = if swappable.enable_swappable_backend {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    RenderError::invalid(format!(
                        "{} must be set when enable_swappable_backend is true",
                        name
                    ))
                })
        };
        let socket_file = required(&swappable.socket_file, "socket_file")?;
        let ca_cert = required(&swappable.ca_cert, "ca_cert")?;
        let host = required(&swappable.host, "host")?;
        Some(Backend {
            socket_file,
            host,
            ca_cert,
        })
    } else {
        None
    };

    let active = if backend.is_some() { "prod, remote" } else { "prod" };

    let document = ServerDocument {
        server: Server {
            port: credhub.port,
            ssl,
        },
        spring: Profiles {
            profiles: ActiveProfiles {
                active: active.to_string(),
            },
        },
        certificates: Certificates {
            concatenate_cas: credhub.certificates.concatenate_cas,
        },
        backend,
    };
    Ok(Some(serde_json::to_value(document)?))
}

#[derive(Serialize)]
struct SecurityDocument<'a> {
    security: Security<'a>,
}

#[derive(Serialize)]
struct Security<'a> {
    oauth2: Toggle,
    authorization: Authorization<'a>,
}

#[derive(Serialize)]
struct Toggle {
    enabled: bool,
}

#[derive(Serialize)]
struct Authorization<'a> {
    acls: Toggle,
    permissions: &'a [Permission],
}

fn security_document(ctx: &RenderContext) -> Result<Option<JsonValue>> {
    let document = SecurityDocument {
        security: Security {
            oauth2: Toggle {
                enabled: ctx.credhub.authentication.uaa.enabled,
            },
            authorization: Authorization {
                acls: Toggle {
                    enabled: ctx.credhub.authorization.acls.enabled,
                },
                permissions: &ctx.credhub.authorization.permissions,
            },
        },
    };
    Ok(Some(serde_json::to_value(document)?))
}

#[derive(Serialize)]
struct AuthServerDocument<'a> {
    #[serde(rename = "auth-server")]
    auth_server: AuthServer<'a>,
}

#[derive(Serialize)]
struct AuthServer<'a> {
    url: Option<&'a str>,
    trust_store: &'static str,
    trust_store_password: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    internal_url: Option<&'a str>,
}

fn auth_server_document(ctx: &RenderContext) -> Result<Option<JsonValue>> {
    let uaa = &ctx.credhub.authentication.uaa;
    if !uaa.enabled {
        return Ok(None);
    }

    let document = AuthServerDocument {
        auth_server: AuthServer {
            url: uaa.url.as_deref(),
            trust_store: TRUST_STORE_PATH,
            trust_store_password: "TRUST_STORE_PASSWORD_PLACEHOLDER",
            internal_url: uaa.internal_url.as_deref().filter(|url| !url.is_empty()),
        },
    };
    Ok(Some(serde_json::to_value(document)?))
}

#[derive(Serialize)]
struct SpringDocument {
    spring: Spring,
}

#[derive(Serialize)]
struct Spring {
    jpa: Jpa,
    flyway: Flyway,
    #[serde(skip_serializing_if = "Option::is_none")]
    datasource: Option<Datasource>,
}

#[derive(Serialize)]
struct Jpa {
    hibernate: Hibernate,
}

#[derive(Serialize)]
struct Hibernate {
    ddl_auto: &'static str,
}

#[derive(Serialize)]
struct Flyway {
    enabled: bool,
    locations: Vec<String>,
}

#[derive(Serialize)]
struct Datasource {
    username: Option<String>,
    password: Option<String>,
    url: String,
}

fn spring_document(ctx: &RenderContext) -> Result<Option<JsonValue>> {
    let storage = ctx.data_storage()?;
    let datasource = storage.jdbc_url()?.map(|url| Datasource {
        username: storage.username.clone(),
        password: storage.password.clone(),
        url,
    });

    let document = SpringDocument {
        spring: Spring {
            jpa: Jpa {
                hibernate: Hibernate {
                    ddl_auto: "validate",
                },
            },
            flyway: Flyway {
                enabled: ctx.bootstrap(),
                locations: storage.kind.flyway_locations(),
            },
            datasource,
        },
    };
    Ok(Some(serde_json::to_value(document)?))
}

#[derive(Serialize)]
struct EncryptionDocument {
    encryption: Encryption,
}

#[derive(Serialize)]
struct Encryption {
    key_creation_enabled: bool,
    providers: Vec<crate::encryption::ProviderConfig>,
}

fn encryption_document(ctx: &RenderContext) -> Result<Option<JsonValue>> {
    let document = EncryptionDocument {
        encryption: Encryption {
            key_creation_enabled: ctx.bootstrap(),
            providers: ctx.encryption()?.provider_configs()?,
        },
    };
    Ok(Some(serde_json::to_value(document)?))
}

#[derive(Serialize)]
struct ConjurDocument<'a> {
    conjur: Conjur<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Conjur<'a> {
    base_url: Option<&'a str>,
    base_policy: Option<&'a str>,
    account_name: Option<&'a str>,
    user_name: Option<&'a str>,
    api_key: Option<&'a str>,
}

fn conjur_document(ctx: &RenderContext) -> Result<Option<JsonValue>> {
    let conjur = &ctx.credhub.backends.conjur;
    if !conjur.enabled {
        return Ok(None);
    }

    let document = ConjurDocument {
        conjur: Conjur {
            base_url: conjur.base_url.as_deref(),
            base_policy: conjur.base_policy.as_deref(),
            account_name: conjur.account_name.as_deref(),
            user_name: conjur.user_name.as_deref(),
            api_key: conjur.api_key.as_deref(),
        },
    };
    Ok(Some(serde_json::to_value(document)?))
}

fn logging_document(_ctx: &RenderContext) -> Result<Option<JsonValue>> {
    Ok(Some(serde_json::json!({
        "logging": { "config": LOG4J_CONFIG_PATH }
    })))
}

/// One `config/application/*.yml` document
pub struct ApplicationDocument {
    path: &'static str,
    build: DocumentFn,
}

impl RenderUnit for ApplicationDocument {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        self.path
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Config
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        to_yaml((self.build)(ctx)?.as_ref())
    }
}

pub fn documents() -> Vec<ApplicationDocument> {
    DOCUMENTS
        .iter()
        .map(|(path, build)| ApplicationDocument {
            path,
            build: *build,
        })
        .collect()
}
