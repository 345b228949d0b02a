// ABOUTME: The bbr-credhubdb job: database-backup-restorer config and its backup/restore wrappers
// ABOUTME: Connection settings come from the credhub_db link, falling back to credhub.data_storage

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::{RenderContext, RenderUnit, Result, UnitKind};
use crate::parser::lookup;

pub const JOB: &str = "bbr-credhubdb";

const RESTORER: &str = "/var/vcap/packages/database-backup-restorer/bin/database-backup-restorer";
const CONFIG_PATH: &str = "/var/vcap/jobs/bbr-credhubdb/config/bbr.json";

pub fn units() -> Vec<Box<dyn RenderUnit>> {
    vec![
        Box::new(BbrConfig),
        Box::new(BbrScript {
            path: "bin/bbr/backup",
            action: "backup",
        }),
        Box::new(BbrScript {
            path: "bin/bbr/restore",
            action: "restore",
        }),
    ]
}

/// Raw `data_storage` mapping; the `credhub_db` link replaces the job's own properties wholesale
fn data_storage(ctx: &RenderContext) -> JsonValue {
    let source = match ctx.manifest.link("credhub_db") {
        Some(link) => {
            debug!("Reading data storage from the credhub_db link");
            &link.properties
        }
        None => &ctx.manifest.properties,
    };
    lookup(source, "credhub.data_storage")
        .cloned()
        .unwrap_or_else(|| JsonValue::Object(Map::new()))
}

/// Document consumed by database-backup-restorer
pub fn bbr_config(ctx: &RenderContext) -> JsonValue {
    let storage = data_storage(ctx);
    let field = |key: &str| storage.get(key).cloned().unwrap_or(JsonValue::Null);
    let database_link = ctx.manifest.link("database");

    let port = storage
        .get("port")
        .filter(|port| !port.is_null())
        .cloned()
        .or_else(|| database_link.and_then(|l| l.property("databases.port")).cloned())
        .unwrap_or(JsonValue::Null);

    let host = storage
        .get("host")
        .filter(|host| !host.is_null())
        .cloned()
        .or_else(|| {
            database_link
                .and_then(|l| l.first_address())
                .map(|address| JsonValue::String(address.to_string()))
        });

    let mut config = Map::new();
    config.insert("username".to_string(), field("username"));
    config.insert("password".to_string(), field("password"));
    config.insert("port".to_string(), port);
    config.insert("database".to_string(), field("database"));
    config.insert("adapter".to_string(), field("type"));
    if let Some(host) = host {
        config.insert("host".to_string(), host);
    }

    let require_tls = storage
        .get("require_tls")
        .and_then(JsonValue::as_bool)
        .unwrap_or(true);
    if require_tls {
        let verify_host = lookup(&storage, "hostname_verification.enabled")
            .and_then(JsonValue::as_bool)
            .unwrap_or(true);
        config.insert(
            "tls".to_string(),
            serde_json::json!({
                "skip_host_verify": !verify_host,
                "cert": { "ca": field("tls_ca") }
            }),
        );
    }

    JsonValue::Object(config)
}

pub struct BbrConfig;

impl RenderUnit for BbrConfig {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/bbr.json"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Config
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        Ok(serde_json::to_string_pretty(&bbr_config(ctx))?)
    }
}

/// Backups run only when release-level backup is on and a credhub_db instance is linked
pub fn backup_active(ctx: &RenderContext) -> bool {
    let linked = ctx
        .manifest
        .link("credhub_db")
        .is_some_and(|link| !link.instances.is_empty());
    ctx.manifest.release_level_backup() && linked
}

pub struct BbrScript {
    path: &'static str,
    action: &'static str,
}

impl RenderUnit for BbrScript {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        self.path
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Script
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        if !backup_active(ctx) {
            return Ok(format!(
                "#!/usr/bin/env bash\n\necho \"credhub database {} is deactivated\"\n",
                self.action
            ));
        }

        Ok(format!(
            "#!/usr/bin/env bash\n\nset -eu\n\n{} \\\n  --config {} \\\n  --{} \\\n  --artifact-file \"${{BBR_ARTIFACT_DIRECTORY}}/credhubdb_dump\"\n",
            RESTORER, CONFIG_PATH, self.action
        ))
    }
}
