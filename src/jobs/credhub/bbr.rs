// ABOUTME: BOSH Backup and Restore scripts of the credhub job
// ABOUTME: Lock ordering metadata plus pg_dump/mysqldump backup and pg_restore/mysql restore

use serde::Serialize;

use super::JOB;
use crate::database::{DataStorage, DataStorageType, DatabaseError, DATABASE_CA_PATH};
use crate::jobs::{RenderContext, RenderUnit, Result, UnitKind};

pub const METADATA_WITHOUT_LOCKS: &str = "#!/usr/bin/env bash\n\n";

const METADATA_UAA_LOCKS: &str = r#"#!/usr/bin/env bash

echo "---
  backup_should_be_locked_before:
  - job_name: uaa
    release: uaa
  restore_should_be_locked_before:
  - job_name: uaa
    release: uaa"
"#;

const POSTGRES_BACKUP_TEMPLATE: &str = r#"#!/usr/bin/env bash

set -eu

export PGUTILS_DIR=/var/vcap/packages/database-backup-restorer-postgres
export PGPASSWORD="{{shell password}}"
{{#if tls}}export PGSSLMODE="verify-full"
export PGSSLROOTCERT={{ca_path}}
{{/if}}
"${PGUTILS_DIR}/bin/pg_dump" \
  --user="{{shell username}}" \
  --host="{{shell host}}" \
  --port="{{shell port}}" \
  --format="custom" \
  "{{shell database}}" > "${BBR_ARTIFACT_DIRECTORY}/credhubdb_dump"
"#;

const MYSQL_BACKUP_TEMPLATE: &str = r#"#!/usr/bin/env bash

set -eu

export MYSQLUTILS_DIR=/var/vcap/packages/database-backup-restorer-mysql
export MYSQL_PWD="{{shell password}}"

"${MYSQLUTILS_DIR}/bin/mysqldump" \
  -u "{{shell username}}" \
  -h "{{shell host}}" \
  -P "{{shell port}}" \
{{#if tls}}  --ssl-ca={{ca_path}} \
{{/if}}  "{{shell database}}" > "${BBR_ARTIFACT_DIRECTORY}/credhubdb_dump"
"#;

const POSTGRES_RESTORE_TEMPLATE: &str = r#"#!/usr/bin/env bash

set -eu

export PGUTILS_DIR=/var/vcap/packages/database-backup-restorer-postgres
export PGPASSWORD="{{shell password}}"
{{#if tls}}export PGSSLMODE="verify-full"
export PGSSLROOTCERT={{ca_path}}
{{/if}}
"${PGUTILS_DIR}/bin/pg_restore" \
  --user="{{shell username}}" \
  --host="{{shell host}}" \
  --port="{{shell port}}" \
  --format="custom" \
  --schema="public" \
  --clean \
  --dbname="{{shell database}}" "${BBR_ARTIFACT_DIRECTORY}/credhubdb_dump"
"#;

const MYSQL_RESTORE_TEMPLATE: &str = r#"#!/usr/bin/env bash

set -eu

export MYSQLUTILS_DIR=/var/vcap/packages/database-backup-restorer-mysql
export MYSQL_PWD="{{shell password}}"

"${MYSQLUTILS_DIR}/bin/mysql" \
  -u "{{shell username}}" \
  -h "{{shell host}}" \
  -P "{{shell port}}" \
{{#if tls}}  --ssl-ca={{ca_path}} \
{{/if}}  "{{shell database}}" < "${BBR_ARTIFACT_DIRECTORY}/credhubdb_dump"
"#;

const SKIP_BACKUP: &str =
    "#!/usr/bin/env bash\n\necho \"Skipping backup, as database is not Postgres or MySql\"\n";
const SKIP_RESTORE: &str =
    "#!/usr/bin/env bash\n\necho \"Skipping restore, as database is not Postgres or MySql\"\n";
const DEFER_RESTORE: &str =
    "#!/usr/bin/env bash\n\necho \"Deferring to the bootstrap VM to perform restore\"\n";

#[derive(Serialize)]
struct DumpContext {
    username: String,
    password: String,
    host: String,
    port: String,
    database: String,
    tls: bool,
    ca_path: &'static str,
}

impl DumpContext {
    fn from_storage(storage: DataStorage) -> Self {
        Self {
            tls: storage.tls_enabled(),
            username: storage.username.unwrap_or_default(),
            password: storage.password.unwrap_or_default(),
            host: storage.host.unwrap_or_default(),
            port: storage.port.unwrap_or_default(),
            database: storage.database.unwrap_or_default(),
            ca_path: DATABASE_CA_PATH,
        }
    }
}

/// Resolved external storage, or `None` when backups do not apply to the configured type
fn external_storage(ctx: &RenderContext) -> Result<Option<DataStorage>> {
    match DataStorageType::from_properties(&ctx.credhub.data_storage) {
        Err(DatabaseError::InvalidType { .. }) | Ok(DataStorageType::InMemory) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(_) => Ok(Some(ctx.data_storage()?)),
    }
}

pub struct Metadata;

impl RenderUnit for Metadata {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "bin/bbr/metadata"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Script
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        if ctx.credhub.authentication.uaa.enabled {
            Ok(METADATA_UAA_LOCKS.to_string())
        } else {
            Ok(METADATA_WITHOUT_LOCKS.to_string())
        }
    }
}

pub struct Backup;

impl RenderUnit for Backup {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "bin/bbr/backup"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Script
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let Some(storage) = external_storage(ctx)? else {
            return Ok(SKIP_BACKUP.to_string());
        };

        let template = match storage.kind {
            DataStorageType::Mysql => MYSQL_BACKUP_TEMPLATE,
            _ => POSTGRES_BACKUP_TEMPLATE,
        };
        ctx.render_script(template, &DumpContext::from_storage(storage))
    }
}

pub struct Restore;

impl RenderUnit for Restore {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "bin/bbr/restore"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Script
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        if !ctx.bootstrap() {
            return Ok(DEFER_RESTORE.to_string());
        }

        let Some(storage) = external_storage(ctx)? else {
            return Ok(SKIP_RESTORE.to_string());
        };

        let template = match storage.kind {
            DataStorageType::Mysql => MYSQL_RESTORE_TEMPLATE,
            _ => POSTGRES_RESTORE_TEMPLATE,
        };
        ctx.render_script(template, &DumpContext::from_storage(storage))
    }
}
