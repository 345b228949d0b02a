// ABOUTME: Data storage resolution for the credhub job: backend type, link fallbacks and JDBC URLs
// ABOUTME: Also enforces the data storage deployment rules

pub mod error;

pub use error::{DatabaseError, Result};

use serde_json::Value as JsonValue;
use std::fmt;

use crate::parser::manifest::{Link, Manifest};
use crate::parser::properties::DataStorageProperties;

pub const CONFIG_DIR: &str = "/var/vcap/jobs/credhub/config";
pub const TRUST_STORE_PATH: &str = "/var/vcap/jobs/credhub/config/trust_store.jks";
pub const DATABASE_CA_PATH: &str = "/var/vcap/jobs/credhub/config/database_ca.pem";

const COMMON_MIGRATIONS: &str = "classpath:/db/migration/common";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStorageType {
    InMemory,
    Mysql,
    Postgres,
}

impl DataStorageType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in-memory" => Some(Self::InMemory),
            "mysql" => Some(Self::Mysql),
            "postgres" => Some(Self::Postgres),
            _ => None,
        }
    }

    pub fn from_properties(props: &DataStorageProperties) -> Result<Self> {
        props
            .kind
            .as_deref()
            .and_then(Self::parse)
            .ok_or_else(|| DatabaseError::InvalidType {
                found: props.kind.clone(),
            })
    }

    pub fn is_external(&self) -> bool {
        !matches!(self, Self::InMemory)
    }

    fn migration_dir(&self) -> &'static str {
        match self {
            Self::InMemory => "h2",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    pub fn flyway_locations(&self) -> Vec<String> {
        vec![
            COMMON_MIGRATIONS.to_string(),
            format!("classpath:/db/migration/{}", self.migration_dir()),
        ]
    }
}

impl fmt::Display for DataStorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InMemory => "in-memory",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        })
    }
}

/// Render a port as written: integers and strings both pass through.
pub fn port_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Connection settings with link fallbacks applied
#[derive(Debug, Clone, PartialEq)]
pub struct DataStorage {
    pub kind: DataStorageType,
    pub host: Option<String>,
    pub port: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub require_tls: bool,
    pub hostname_verification: bool,
    pub tls_ca: Option<String>,
}

impl DataStorage {
    /// Resolve `credhub.data_storage`; postgres host and port fall back to the `postgres` link.
    pub fn resolve(props: &DataStorageProperties, manifest: &Manifest) -> Result<Self> {
        let kind = DataStorageType::from_properties(props)?;
        let link = match kind {
            DataStorageType::Postgres => manifest.link("postgres"),
            _ => None,
        };

        Ok(Self {
            kind,
            host: resolve_host(props, link),
            port: resolve_port(props, link),
            database: non_empty(props.database.as_deref()).map(str::to_string),
            username: non_empty(props.username.as_deref()).map(str::to_string),
            password: non_empty(props.password.as_deref()).map(str::to_string),
            require_tls: props.require_tls().ok_or(DatabaseError::InvalidRequireTls)?,
            hostname_verification: props.hostname_verification.enabled,
            tls_ca: props.tls_ca().map(str::to_string),
        })
    }

    pub fn tls_enabled(&self) -> bool {
        self.kind.is_external() && self.require_tls
    }

    /// JDBC URL for the external database; `None` for in-memory storage
    pub fn jdbc_url(&self) -> Result<Option<String>> {
        let host = match (self.kind, self.host.as_deref()) {
            (DataStorageType::InMemory, _) => return Ok(None),
            (DataStorageType::Postgres, None) => return Err(DatabaseError::MissingPostgresHost),
            (_, host) => host.unwrap_or_default(),
        };
        let port = self.port.as_deref().unwrap_or_default();
        let database = self.database.as_deref().unwrap_or_default();

        let url = match self.kind {
            DataStorageType::Mysql => {
                let mut url = format!(
                    "jdbc:mariadb://{}:{}/{}?autoReconnect=true&socketTimeout=3600000",
                    host, port, database
                );
                if self.require_tls {
                    url.push_str("&useSSL=true&requireSSL=true&verifyServerCertificate=true");
                    url.push_str("&enabledSslProtocolSuites=TLSv1,TLSv1.1,TLSv1.2");
                    url.push_str("&trustCertificateKeyStorePassword=${TRUST_STORE_PASSWORD}");
                    url.push_str(&format!("&trustCertificateKeyStoreUrl={}", TRUST_STORE_PATH));
                    if !self.hostname_verification {
                        url.push_str("&disableSslHostnameVerification=true");
                    }
                }
                url
            }
            _ => {
                let mut url = format!(
                    "jdbc:postgresql://{}:{}/{}?autoReconnect=true",
                    host, port, database
                );
                if self.require_tls {
                    url.push_str("&ssl=true&sslmode=require");
                }
                url
            }
        };
        Ok(Some(url))
    }
}

fn resolve_host(props: &DataStorageProperties, link: Option<&Link>) -> Option<String> {
    non_empty(props.host.as_deref())
        .or_else(|| link.and_then(Link::first_address))
        .map(str::to_string)
}

fn resolve_port(props: &DataStorageProperties, link: Option<&Link>) -> Option<String> {
    props
        .port
        .as_ref()
        .and_then(port_string)
        .or_else(|| {
            link.and_then(|l| l.property("databases.port"))
                .and_then(port_string)
        })
}

/// Deployment rules for `credhub.data_storage`. Stops at the first violation.
pub fn validate(props: &DataStorageProperties, manifest: &Manifest) -> Result<()> {
    let kind = DataStorageType::from_properties(props)?;
    if !kind.is_external() {
        return Ok(());
    }

    let link = match kind {
        DataStorageType::Postgres => manifest.link("postgres"),
        _ => None,
    };

    let mut missing = Vec::new();
    if resolve_port(props, link).is_none() {
        missing.push("port");
    }
    if non_empty(props.database.as_deref()).is_none() {
        missing.push("database");
    }
    if resolve_host(props, link).is_none() {
        missing.push("host");
    }
    if non_empty(props.username.as_deref()).is_none() {
        missing.push("username");
    }
    if non_empty(props.password.as_deref()).is_none() {
        missing.push("password");
    }
    if !missing.is_empty() {
        return Err(DatabaseError::MissingConnectionKeys {
            missing: missing.into_iter().map(str::to_string).collect(),
        });
    }

    let require_tls = props.require_tls().ok_or(DatabaseError::InvalidRequireTls)?;
    if require_tls && props.tls_ca().is_none() {
        return Err(DatabaseError::MissingTlsCa);
    }

    Ok(())
}

/// CA written to `database_ca.pem`; empty unless an external database requires TLS.
pub fn database_ca(props: &DataStorageProperties) -> Result<String> {
    let external = props
        .kind
        .as_deref()
        .and_then(DataStorageType::parse)
        .is_some_and(|kind| kind.is_external());
    if !external || props.require_tls() != Some(true) {
        return Ok(String::new());
    }

    props
        .tls_ca()
        .map(str::to_string)
        .ok_or(DatabaseError::MissingDatabaseCa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::manifest::LinkInstance;
    use serde_json::json;

    fn props(value: JsonValue) -> DataStorageProperties {
        serde_json::from_value(value).unwrap()
    }

    fn postgres_link(address: &str, port: JsonValue) -> Link {
        Link::new(
            vec![LinkInstance::with_address(address)],
            json!({"databases": {"port": port}}),
        )
    }

    fn mysql() -> DataStorageProperties {
        props(json!({
            "type": "mysql",
            "port": 3306,
            "database": "some-database",
            "host": "some-host",
            "username": "some-username",
            "password": "some-password"
        }))
    }

    #[test]
    fn test_flyway_locations() {
        assert_eq!(
            DataStorageType::InMemory.flyway_locations(),
            vec!["classpath:/db/migration/common", "classpath:/db/migration/h2"]
        );
        assert_eq!(
            DataStorageType::Postgres.flyway_locations()[1],
            "classpath:/db/migration/postgres"
        );
    }

    #[test]
    fn test_mysql_url_with_tls() {
        let storage = DataStorage::resolve(&mysql(), &Manifest::default()).unwrap();
        assert_eq!(
            storage.jdbc_url().unwrap().unwrap(),
            "jdbc:mariadb://some-host:3306/some-database?autoReconnect=true&socketTimeout=3600000\
             &useSSL=true&requireSSL=true&verifyServerCertificate=true\
             &enabledSslProtocolSuites=TLSv1,TLSv1.1,TLSv1.2\
             &trustCertificateKeyStorePassword=${TRUST_STORE_PASSWORD}\
             &trustCertificateKeyStoreUrl=/var/vcap/jobs/credhub/config/trust_store.jks"
        );
    }

    #[test]
    fn test_mysql_url_without_hostname_verification() {
        let mut p = mysql();
        p.hostname_verification.enabled = false;
        let url = DataStorage::resolve(&p, &Manifest::default())
            .unwrap()
            .jdbc_url()
            .unwrap()
            .unwrap();
        assert!(url.ends_with("trust_store.jks&disableSslHostnameVerification=true"));
    }

    #[test]
    fn test_mysql_url_without_tls() {
        let mut p = mysql();
        p.require_tls = json!(false);
        p.hostname_verification.enabled = false;
        let url = DataStorage::resolve(&p, &Manifest::default())
            .unwrap()
            .jdbc_url()
            .unwrap()
            .unwrap();
        assert_eq!(
            url,
            "jdbc:mariadb://some-host:3306/some-database?autoReconnect=true&socketTimeout=3600000"
        );
    }

    #[test]
    fn test_postgres_uses_link_fallbacks() {
        let p = props(json!({
            "type": "postgres",
            "database": "some-database",
            "username": "u",
            "password": "p"
        }));
        let manifest = Manifest::default()
            .with_link("postgres", postgres_link("some-postgres-host", json!(5432)));

        let url = DataStorage::resolve(&p, &manifest)
            .unwrap()
            .jdbc_url()
            .unwrap()
            .unwrap();
        assert_eq!(
            url,
            "jdbc:postgresql://some-postgres-host:5432/some-database?autoReconnect=true&ssl=true&sslmode=require"
        );
    }

    #[test]
    fn test_postgres_properties_win_over_link() {
        let p = props(json!({
            "type": "postgres",
            "host": "special-postgres-host",
            "port": 7777,
            "database": "some-database",
            "require_tls": false
        }));
        let manifest = Manifest::default()
            .with_link("postgres", postgres_link("some-postgres-host", json!(5432)));

        let url = DataStorage::resolve(&p, &manifest)
            .unwrap()
            .jdbc_url()
            .unwrap()
            .unwrap();
        assert_eq!(
            url,
            "jdbc:postgresql://special-postgres-host:7777/some-database?autoReconnect=true"
        );
    }

    #[test]
    fn test_postgres_without_host_or_link() {
        let p = props(json!({"type": "postgres", "port": 5432, "database": "d"}));
        let err = DataStorage::resolve(&p, &Manifest::default())
            .unwrap()
            .jdbc_url()
            .unwrap_err();
        assert_eq!(err.to_string(), "postgres `host` must be set");
    }

    #[test]
    fn test_mysql_ignores_postgres_link() {
        let mut p = mysql();
        p.host = None;
        let manifest = Manifest::default()
            .with_link("postgres", postgres_link("pg-host", json!(5432)));
        let storage = DataStorage::resolve(&p, &manifest).unwrap();
        assert_eq!(storage.host, None);
    }

    #[test]
    fn test_validate_type() {
        let err = validate(&props(json!({"type": "bad-type"})), &Manifest::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "credhub.data_storage.type must be set to \"mysql\", \"postgres\", or \"in-memory\"."
        );
        assert!(validate(&props(json!({"type": "in-memory"})), &Manifest::default()).is_ok());
    }

    #[test]
    fn test_validate_required_keys() {
        let err = validate(
            &props(json!({"type": "mysql", "database": "", "require_tls": false})),
            &Manifest::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::MissingConnectionKeys { .. }));
        assert_eq!(
            err.to_string(),
            "credhub.data_storage requires the following keys to be set when type is `mysql` or `postgres`: port, database, host, username, password"
        );
    }

    #[test]
    fn test_validate_postgres_link_satisfies_host_and_port() {
        let p = props(json!({
            "type": "postgres",
            "database": "some-database",
            "username": "some-username",
            "password": "some-password",
            "require_tls": false
        }));
        let manifest = Manifest::default()
            .with_link("postgres", postgres_link("some-address", json!(7777)));
        assert!(validate(&p, &manifest).is_ok());
    }

    #[test]
    fn test_validate_require_tls_and_ca() {
        let mut p = mysql();
        p.require_tls = json!("maybe");
        assert_eq!(validate(&p, &Manifest::default()), Err(DatabaseError::InvalidRequireTls));

        p.require_tls = json!(true);
        assert_eq!(validate(&p, &Manifest::default()), Err(DatabaseError::MissingTlsCa));

        p.tls_ca = Some("some-ca".to_string());
        assert!(validate(&p, &Manifest::default()).is_ok());
    }

    #[test]
    fn test_database_ca() {
        assert_eq!(database_ca(&props(json!({"type": "in-memory"}))).unwrap(), "");

        let mut p = mysql();
        assert_eq!(database_ca(&p), Err(DatabaseError::MissingDatabaseCa));

        p.tls_ca = Some("-----BEGIN CERTIFICATE-----".to_string());
        assert_eq!(database_ca(&p).unwrap(), "-----BEGIN CERTIFICATE-----");

        p.require_tls = json!(false);
        assert_eq!(database_ca(&p).unwrap(), "");
    }

    #[test]
    fn test_port_string() {
        assert_eq!(port_string(&json!(5432)), Some("5432".to_string()));
        assert_eq!(port_string(&json!("5432")), Some("5432".to_string()));
        assert_eq!(port_string(&json!("")), None);
        assert_eq!(port_string(&json!(null)), None);
    }
}
