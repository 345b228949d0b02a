// ABOUTME: Plain configuration files of the credhub job
// ABOUTME: log4j2 properties, HSM client config, database CA and the BPM process descriptor

use serde::Serialize;
use std::path::Path;

use super::JOB;
use crate::database;
use crate::encryption::ProviderType;
use crate::jobs::{to_yaml, RenderContext, RenderUnit, Result, UnitKind};

pub const LOG_DIR: &str = "/var/vcap/sys/log/credhub";
pub const HSM_DIR: &str = "/var/vcap/jobs/credhub/config/hsm";
pub const START_SERVER_PATH: &str = "/var/vcap/jobs/credhub/bin/start_server";

const LOG4J2_TEMPLATE: &str = r#"status = error
name = CredHubLogging

property.log_dir = {{log_dir}}

appender.rolling.type = RollingFile
appender.rolling.name = FILE
appender.rolling.fileName = ${log_dir}/credhub.log
appender.rolling.filePattern = ${log_dir}/credhub.log-%d{yyyy-MM-dd}
appender.rolling.layout.type = PatternLayout
appender.rolling.layout.pattern = %d{yyyy-MM-dd'T'HH:mm:ss.SSSXXX} [%t] %5p --- %c{1}: %m%n
appender.rolling.policies.type = Policies
appender.rolling.policies.time.type = TimeBasedTriggeringPolicy
appender.rolling.policies.time.interval = 1

appender.security.type = RollingFile
appender.security.name = SECURITY
appender.security.fileName = ${log_dir}/credhub_security_events.log
appender.security.filePattern = ${log_dir}/credhub_security_events.log-%d{yyyy-MM-dd}
appender.security.layout.type = PatternLayout
appender.security.layout.pattern = %m%n
appender.security.policies.type = Policies
appender.security.policies.time.type = TimeBasedTriggeringPolicy
appender.security.policies.time.interval = 1

logger.security.name = CEFAudit
logger.security.level = info
logger.security.additivity = false
logger.security.appenderRef.security.ref = SECURITY

rootLogger.level = {{level}}
rootLogger.appenderRef.file.ref = FILE
"#;

const CHRYSTOKI_TEMPLATE: &str = r#"Chrystoki2 = {
   LibUNIX = /usr/safenet/lunaclient/libs/64/libCryptoki2.so;
   LibUNIX64 = /usr/safenet/lunaclient/libs/64/libCryptoki2_64.so;
}

Luna = {
   DefaultTimeOut = 500000;
   PEKeygenTimeOut = 1200000;
   PEDTimeout1 = 100000;
   PEDTimeout2 = 200000;
   PEDTimeout3 = 10000;
   KeypairGenTimeOut = 2700000;
   CloningCommandTimeOut = 300000;
   CommandTimeOutPedSet = 720000;
}

CardReader = {
   RemoteCommand = 1;
}

Misc = {
   PE1746Enabled = 0;
   ToolsDir = /usr/safenet/lunaclient/bin;
}

LunaSA Client = {
   ReceiveTimeout = 20000;
   SSLConfigFile = /usr/safenet/lunaclient/bin/openssl.cnf;
   ClientPrivKeyFile = {{hsm_dir}}/client-key.pem;
   ClientCertFile = {{hsm_dir}}/client.pem;
   ServerCAFile = /usr/safenet/lunaclient/cert/server/CAFile.pem;
   NetClient = 1;
   TCPKeepAlive = 1;
{{#each servers}}   ServerName{{two_digits @index}} = {{host}};
   ServerPort{{two_digits @index}} = {{port}};
   ServerHtl{{two_digits @index}} = 0;
{{/each}}
}
"#;

#[derive(Serialize)]
struct Log4jContext<'a> {
    log_dir: &'static str,
    level: &'a str,
}

/// log4j2 root logger level for a credhub log level
pub fn root_logger_level(log_level: &str) -> &str {
    match log_level {
        "none" => "off",
        other => other,
    }
}

pub struct Log4jProperties;

impl RenderUnit for Log4jProperties {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/log4j2.properties"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Config
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let context = Log4jContext {
            log_dir: LOG_DIR,
            level: root_logger_level(&ctx.credhub.log_level),
        };
        ctx.render_script(LOG4J2_TEMPLATE, &context)
    }
}

#[derive(Serialize)]
struct ChrystokiContext {
    hsm_dir: &'static str,
    servers: Vec<ChrystokiServer>,
}

#[derive(Serialize)]
struct ChrystokiServer {
    host: String,
    port: String,
}

/// Luna HSM client configuration; empty unless an hsm provider is configured
pub struct EncryptionConf;

impl RenderUnit for EncryptionConf {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/encryption.conf"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Config
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let encryption = ctx.encryption()?;
        let Some(provider) = encryption.hsm_provider() else {
            return Ok(String::new());
        };

        let servers = provider
            .hsm_servers()
            .iter()
            .map(|server| ChrystokiServer {
                host: server.host.clone(),
                port: server.port(),
            })
            .collect();

        ctx.render_script(
            CHRYSTOKI_TEMPLATE,
            &ChrystokiContext {
                hsm_dir: HSM_DIR,
                servers,
            },
        )
    }
}

pub struct DatabaseCa;

impl RenderUnit for DatabaseCa {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/database_ca.pem"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Config
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        Ok(database::database_ca(&ctx.credhub.data_storage)?)
    }
}

#[derive(Serialize)]
struct BpmDocument {
    processes: Vec<BpmProcess>,
}

#[derive(Serialize)]
struct BpmProcess {
    name: &'static str,
    executable: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    additional_volumes: Vec<BpmVolume>,
}

#[derive(Debug, Serialize, PartialEq)]
struct BpmVolume {
    path: String,
    writable: bool,
    allow_executions: bool,
}

/// BPM descriptor; kms-plugin socket directories are mounted into the process
pub struct BpmConfig;

impl RenderUnit for BpmConfig {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/bpm.yml"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Config
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let encryption = ctx.encryption()?;

        let mut additional_volumes: Vec<BpmVolume> = Vec::new();
        for provider in encryption.providers_of(ProviderType::KmsPlugin) {
            let Some(dir) = provider
                .endpoint()
                .and_then(|endpoint| Path::new(endpoint).parent())
                .map(|dir| dir.to_string_lossy().to_string())
            else {
                continue;
            };
            if additional_volumes.iter().all(|v| v.path != dir) {
                additional_volumes.push(BpmVolume {
                    path: dir,
                    writable: true,
                    allow_executions: true,
                });
            }
        }

        let document = BpmDocument {
            processes: vec![BpmProcess {
                name: JOB,
                executable: START_SERVER_PATH,
                additional_volumes,
            }],
        };
        to_yaml(Some(&document))
    }
}
