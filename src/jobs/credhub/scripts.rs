// ABOUTME: Lifecycle scripts of the credhub job
// ABOUTME: pre-start, key store setup, HSM registration, JVM launch and the UAA wait loop

use serde::Serialize;

use super::application::{KEY_STORE_PATH, LOG4J_CONFIG_PATH, MTLS_TRUST_STORE_PATH, TLS_KEY_ALIAS};
use super::files::{HSM_DIR, LOG_DIR};
use super::JOB;
use crate::database::{DataStorageType, CONFIG_DIR, DATABASE_CA_PATH, TRUST_STORE_PATH};
use crate::jobs::{RenderContext, RenderError, RenderUnit, Result, UnitKind};

pub const MISSING_UAA_URL: &str = "UAA must be reachable at 'credhub.authentication.uaa.url' or 'credhub.authentication.uaa.internal_url' to wait for it. Please update your manifest to proceed.";
pub const MISSING_UAA_CA_CERTS: &str = "At least one trusted CA certificate for UAA must be provided. Please add a value at 'credhub.authentication.uaa.ca_certs[]' and redeploy.";

const PRE_START_TEMPLATE: &str = r#"#!/usr/bin/env bash

set -eu

CERT_FILE={{config_dir}}/cert.pem
PRIVATE_KEY_FILE={{config_dir}}/priv.pem
DATABASE_CA_CERT={{database_ca_path}}
LOG_DIR={{log_dir}}

mkdir -p "$LOG_DIR"
chown -R vcap:vcap "$LOG_DIR"

{{#if tls}}
cat > $CERT_FILE <<EOL
{{tls.certificate}}
EOL

cat > $PRIVATE_KEY_FILE <<EOL
{{tls.private_key}}
EOL
chmod 600 $PRIVATE_KEY_FILE
{{/if}}

{{#if database_ca}}
cat > $DATABASE_CA_CERT <<EOL
{{database_ca}}
EOL
{{/if}}

{{#if hsm}}
/var/vcap/jobs/credhub/bin/configure_hsm.sh
{{/if}}
"#;

const CONFIGURE_HSM_TEMPLATE: &str = r#"#!/usr/bin/env bash

set -eu

{{#if hsm}}
HSM_DIR={{hsm_dir}}
LUNA_DIR=/usr/safenet/lunaclient

mkdir -p "$HSM_DIR"

cat > "$HSM_DIR/client.pem" <<EOL
{{hsm.client_certificate}}
EOL

cat > "$HSM_DIR/client-key.pem" <<EOL
{{hsm.client_key}}
EOL
chmod 600 "$HSM_DIR/client-key.pem"

{{#each hsm.servers}}
cat > "$HSM_DIR/server_{{two_digits @index}}.pem" <<EOL
{{certificate}}
EOL
"$LUNA_DIR/bin/vtl" addServer -n "{{shell host}}" -c "$HSM_DIR/server_{{two_digits @index}}.pem" -p {{port}}
{{/each}}

cp {{config_dir}}/encryption.conf "$LUNA_DIR/Chrystoki.conf"
{{else}}
echo "No hsm encryption provider configured, skipping HSM setup"
{{/if}}
"#;

const INIT_KEY_STORES_TEMPLATE: &str = r#"#!/usr/bin/env bash

set -eu

CONFIG_DIR={{config_dir}}
KEYTOOL="${JAVA_HOME:-/var/vcap/packages/openjdk}/bin/keytool"
JVM_CACERTS="${JAVA_HOME:-/var/vcap/packages/openjdk}/lib/security/cacerts"

KEY_STORE_PATH={{key_store}}
TRUST_STORE_PATH={{trust_store}}
MTLS_TRUST_STORE_PATH={{mtls_trust_store}}

export KEY_STORE_PASSWORD=$(openssl rand -hex 20)
export TRUST_STORE_PASSWORD=$(openssl rand -hex 20)
export MTLS_TRUST_STORE_PASSWORD=$(openssl rand -hex 20)

rm -f "$KEY_STORE_PATH" "$TRUST_STORE_PATH" "$MTLS_TRUST_STORE_PATH"

{{#if tls}}
openssl pkcs12 -export -in "$CONFIG_DIR/cert.pem" -inkey "$CONFIG_DIR/priv.pem" \
  -out "$CONFIG_DIR/cacerts.p12" -name {{key_alias}} -password "pass:$KEY_STORE_PASSWORD"

"$KEYTOOL" -importkeystore -noprompt \
  -srckeystore "$CONFIG_DIR/cacerts.p12" -srcstoretype PKCS12 -srcstorepass "$KEY_STORE_PASSWORD" \
  -destkeystore "$KEY_STORE_PATH" -deststorepass "$KEY_STORE_PASSWORD" -alias {{key_alias}}

rm -f "$CONFIG_DIR/cacerts.p12"
{{/if}}

"$KEYTOOL" -importkeystore -noprompt \
  -srckeystore "$JVM_CACERTS" -srcstorepass changeit \
  -destkeystore "$TRUST_STORE_PATH" -deststorepass "$TRUST_STORE_PASSWORD"

{{#each uaa_ca_certs}}
cat > "$CONFIG_DIR/uaa_ca_{{@index}}.pem" <<EOL
{{this}}
EOL
"$KEYTOOL" -import -noprompt -trustcacerts -alias "uaa_ca_{{@index}}" \
  -file "$CONFIG_DIR/uaa_ca_{{@index}}.pem" \
  -keystore "$TRUST_STORE_PATH" -storepass "$TRUST_STORE_PASSWORD"
{{/each}}

{{#each mtls_trusted_cas}}
cat > "$CONFIG_DIR/mtls_ca_{{@index}}.pem" <<EOL
{{this}}
EOL
"$KEYTOOL" -import -noprompt -trustcacerts -alias "mtls_ca_{{@index}}" \
  -file "$CONFIG_DIR/mtls_ca_{{@index}}.pem" \
  -keystore "$MTLS_TRUST_STORE_PATH" -storepass "$MTLS_TRUST_STORE_PASSWORD"
{{/each}}

{{#if database_ca}}
"$KEYTOOL" -import -noprompt -trustcacerts -alias database_ca \
  -file {{database_ca_path}} \
  -keystore "$TRUST_STORE_PATH" -storepass "$TRUST_STORE_PASSWORD"
{{/if}}

{{#if uaa_enabled}}
sed -i "s/TRUST_STORE_PASSWORD_PLACEHOLDER/${TRUST_STORE_PASSWORD}/g" "$CONFIG_DIR/application/auth-server.yml"
{{/if}}
"#;

const START_SERVER_TEMPLATE: &str = r#"#!/usr/bin/env bash

set -eu

MAX_HEAP_SIZE={{max_heap_size}}

export JAVA_HOME=/var/vcap/packages/openjdk
source /var/vcap/jobs/credhub/bin/init_key_stores.sh

exec "$JAVA_HOME/bin/java" \
{{#each java_opts}}  {{this}} \
{{/each}}  -jar /var/vcap/packages/credhub/credhub.jar
"#;

const WAIT_FOR_UAA_DISABLED: &str = r#"#!/usr/bin/env bash

echo "UAA is not enabled"
"#;

const WAIT_FOR_UAA_SKIPPED: &str = r#"#!/usr/bin/env bash

echo "Not waiting for UAA to start"
"#;

const WAIT_FOR_UAA_TEMPLATE: &str = r#"#!/usr/bin/env bash

set -u

UAA_URL="{{shell url}}"
UAA_CA_FILE={{config_dir}}/uaa_ca.pem

cat > "$UAA_CA_FILE" <<EOL
{{#each ca_certs}}{{this}}
{{/each}}EOL

echo "Waiting for UAA to start at $UAA_URL"
for attempt in $(seq 1 {{attempts}}); do
  if curl --silent --fail --max-time 5 --cacert "$UAA_CA_FILE" "$UAA_URL/healthz" > /dev/null; then
    echo "Successfully connected to UAA, continuing startup"
    exit 0
  fi
  echo "UAA not reachable yet (attempt $attempt of {{attempts}})"
  sleep 5
done

echo "Timed out waiting for UAA at $UAA_URL"
exit 1
"#;

const UAA_WAIT_ATTEMPTS: u32 = 60;

#[derive(Serialize)]
struct TlsPair<'a> {
    certificate: &'a str,
    private_key: &'a str,
}

#[derive(Serialize)]
struct PreStartContext<'a> {
    config_dir: &'static str,
    database_ca_path: &'static str,
    log_dir: &'static str,
    tls: Option<TlsPair<'a>>,
    database_ca: Option<&'a str>,
    hsm: bool,
}

pub struct PreStart;

impl RenderUnit for PreStart {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "bin/pre-start"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Script
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let credhub = &ctx.credhub;
        let context = PreStartContext {
            config_dir: CONFIG_DIR,
            database_ca_path: DATABASE_CA_PATH,
            log_dir: LOG_DIR,
            tls: credhub
                .tls_certificate_and_key()
                .map(|(certificate, private_key)| TlsPair {
                    certificate,
                    private_key,
                }),
            database_ca: credhub.data_storage.tls_ca(),
            hsm: ctx.encryption()?.hsm_provider().is_some(),
        };
        ctx.render_script(PRE_START_TEMPLATE, &context)
    }
}

#[derive(Serialize)]
struct HsmSetup {
    client_certificate: String,
    client_key: String,
    servers: Vec<HsmServerSetup>,
}

#[derive(Serialize)]
struct HsmServerSetup {
    host: String,
    port: String,
    certificate: String,
}

#[derive(Serialize)]
struct ConfigureHsmContext {
    config_dir: &'static str,
    hsm_dir: &'static str,
    hsm: Option<HsmSetup>,
}

pub struct ConfigureHsm;

impl RenderUnit for ConfigureHsm {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "bin/configure_hsm.sh"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Script
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let encryption = ctx.encryption()?;
        let hsm = encryption.hsm_provider().map(|provider| HsmSetup {
            client_certificate: provider
                .connection_str("client_certificate")
                .unwrap_or_default()
                .to_string(),
            client_key: provider
                .connection_str("client_key")
                .unwrap_or_default()
                .to_string(),
            servers: provider
                .hsm_servers()
                .into_iter()
                .map(|server| HsmServerSetup {
                    port: server.port(),
                    host: server.host,
                    certificate: server.certificate.unwrap_or_default(),
                })
                .collect(),
        });

        let context = ConfigureHsmContext {
            config_dir: CONFIG_DIR,
            hsm_dir: HSM_DIR,
            hsm,
        };
        ctx.render_script(CONFIGURE_HSM_TEMPLATE, &context)
    }
}

#[derive(Serialize)]
struct InitKeyStoresContext<'a> {
    config_dir: &'static str,
    key_store: &'static str,
    trust_store: &'static str,
    mtls_trust_store: &'static str,
    key_alias: &'static str,
    database_ca_path: &'static str,
    tls: bool,
    uaa_enabled: bool,
    uaa_ca_certs: &'a [String],
    mtls_trusted_cas: &'a [String],
    database_ca: bool,
}

pub struct InitKeyStores;

impl RenderUnit for InitKeyStores {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "bin/init_key_stores.sh"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Script
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let credhub = &ctx.credhub;
        let uaa = &credhub.authentication.uaa;
        if uaa.enabled && uaa.ca_certs.is_empty() {
            return Err(RenderError::invalid(MISSING_UAA_CA_CERTS));
        }

        let data_storage = &credhub.data_storage;
        let external = data_storage
            .kind
            .as_deref()
            .and_then(DataStorageType::parse)
            .is_some_and(|kind| kind.is_external());
        let database_ca =
            external && data_storage.require_tls() == Some(true) && data_storage.tls_ca().is_some();

        let context = InitKeyStoresContext {
            config_dir: CONFIG_DIR,
            key_store: KEY_STORE_PATH,
            trust_store: TRUST_STORE_PATH,
            mtls_trust_store: MTLS_TRUST_STORE_PATH,
            key_alias: TLS_KEY_ALIAS,
            database_ca_path: DATABASE_CA_PATH,
            tls: credhub.tls_certificate_and_key().is_some(),
            uaa_enabled: uaa.enabled,
            uaa_ca_certs: &uaa.ca_certs,
            mtls_trusted_cas: &credhub.authentication.mutual_tls.trusted_cas,
            database_ca,
        };
        ctx.render_script(INIT_KEY_STORES_TEMPLATE, &context)
    }
}

#[derive(Serialize)]
struct StartServerContext {
    max_heap_size: u32,
    java_opts: Vec<String>,
}

pub struct StartServer;

impl StartServer {
    /// JVM flags, one per continuation line
    pub fn java_opts(ctx: &RenderContext) -> Vec<String> {
        let credhub = &ctx.credhub;
        let profiles = if credhub.backends.conjur.enabled {
            "prod,conjur"
        } else {
            "prod"
        };

        let mut opts = vec![
            "-Xmx${MAX_HEAP_SIZE}m".to_string(),
            format!("-Dspring.profiles.active={}", profiles),
            format!("-Dspring.config.additional-location={}/application/", CONFIG_DIR),
            format!("-Dlog4j.configurationFile={}", LOG4J_CONFIG_PATH),
            "-Djava.security.egd=file:/dev/urandom".to_string(),
        ];

        if credhub.data_storage.require_tls() == Some(true) {
            opts.push(format!("-Djavax.net.ssl.trustStore={}", TRUST_STORE_PATH));
            opts.push("-Djavax.net.ssl.trustStorePassword=${TRUST_STORE_PASSWORD}".to_string());
        }

        if ctx.manifest.bpm_enabled() {
            opts.push("-Djna.boot.library.path=/var/vcap/packages/credhub".to_string());
        }

        opts
    }
}

impl RenderUnit for StartServer {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "bin/start_server"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Script
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let context = StartServerContext {
            max_heap_size: ctx.credhub.max_heap_size,
            java_opts: Self::java_opts(ctx),
        };
        ctx.render_script(START_SERVER_TEMPLATE, &context)
    }
}

#[derive(Serialize)]
struct WaitForUaaContext<'a> {
    config_dir: &'static str,
    url: &'a str,
    ca_certs: &'a [String],
    attempts: u32,
}

pub struct WaitForUaa;

impl RenderUnit for WaitForUaa {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "bin/wait_for_uaa"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Script
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let uaa = &ctx.credhub.authentication.uaa;
        if !uaa.enabled {
            return Ok(WAIT_FOR_UAA_DISABLED.to_string());
        }
        if !uaa.wait_for_start {
            return Ok(WAIT_FOR_UAA_SKIPPED.to_string());
        }

        let url = uaa
            .reachable_url()
            .ok_or_else(|| RenderError::invalid(MISSING_UAA_URL))?;

        let context = WaitForUaaContext {
            config_dir: CONFIG_DIR,
            url,
            ca_certs: &uaa.ca_certs,
            attempts: UAA_WAIT_ATTEMPTS,
        };
        ctx.render_script(WAIT_FOR_UAA_TEMPLATE, &context)
    }
}
