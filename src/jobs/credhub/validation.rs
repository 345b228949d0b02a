// ABOUTME: Validation-only units of the credhub job
// ABOUTME: Each renders an empty document or fails with the message an operator must act on

use super::JOB;
use crate::database;
use crate::jobs::{RenderContext, RenderError, RenderUnit, Result, UnitKind};

pub const VALID_LOG_LEVELS: &[&str] = &["none", "error", "warn", "info", "debug"];

pub const MISSING_PERMISSIONS: &str = "When ACLs are enabled you must provide at least one permission so that some actor can access CredHub. Please update your manifest to proceed.";
pub const MISSING_PERMISSION_PATH: &str = "Each permission must provide a path. Please update your manifest to proceed.";
pub const INVALID_LOG_LEVEL: &str = "Invalid log_level. Valid types include: none, error, warn, info, or debug. Please update your manifest to proceed.";
pub const INCOMPLETE_UAA: &str = "When UAA is enabled you must provide a URL and CA Certs. Please update your manifest to proceed.";

pub struct DataStorageValidation;

impl RenderUnit for DataStorageValidation {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/validation_data_storage.yml"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Validation
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        database::validate(&ctx.credhub.data_storage, ctx.manifest)?;
        Ok(String::new())
    }
}

pub struct EncryptionValidation;

impl RenderUnit for EncryptionValidation {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/validation_encryption.yml"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Validation
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        ctx.encryption()?.validate()?;
        Ok(String::new())
    }
}

pub struct AuthorizationValidation;

impl RenderUnit for AuthorizationValidation {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/validation_authorization.yml"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Validation
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let authorization = &ctx.credhub.authorization;
        if authorization.acls.enabled && authorization.permissions.is_empty() {
            return Err(RenderError::invalid(MISSING_PERMISSIONS));
        }
        let has_path = |path: &Option<String>| path.as_deref().is_some_and(|p| !p.is_empty());
        if !authorization.permissions.iter().all(|p| has_path(&p.path)) {
            return Err(RenderError::invalid(MISSING_PERMISSION_PATH));
        }
        Ok(String::new())
    }
}

pub struct LoggingValidation;

impl RenderUnit for LoggingValidation {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/validation_logging.yml"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Validation
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        if !VALID_LOG_LEVELS.contains(&ctx.credhub.log_level.as_str()) {
            return Err(RenderError::invalid(INVALID_LOG_LEVEL));
        }
        Ok(String::new())
    }
}

pub struct UaaValidation;

impl RenderUnit for UaaValidation {
    fn job(&self) -> &'static str {
        JOB
    }

    fn path(&self) -> &'static str {
        "config/validation_uaa.yml"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Validation
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let uaa = &ctx.credhub.authentication.uaa;
        let has_url = uaa.url.as_deref().is_some_and(|url| !url.is_empty());
        if uaa.enabled && (!has_url || uaa.ca_certs.is_empty()) {
            return Err(RenderError::invalid(INCOMPLETE_UAA));
        }
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Manifest;
    use crate::template::TemplateEngine;
    use serde_json::json;

    fn render(unit: &dyn RenderUnit, credhub: serde_json::Value) -> Result<String> {
        let manifest = Manifest {
            properties: json!({ "credhub": credhub }),
            ..Default::default()
        };
        let engine = TemplateEngine::new().unwrap();
        let ctx = RenderContext::new(&manifest, &engine).unwrap();
        unit.render(&ctx)
    }

    #[test]
    fn test_authorization_requires_permissions_with_acls() {
        let err = render(&AuthorizationValidation, json!({})).unwrap_err();
        assert_eq!(err.to_string(), MISSING_PERMISSIONS);

        assert!(render(
            &AuthorizationValidation,
            json!({"authorization": {"acls": {"enabled": false}}})
        )
        .is_ok());

        assert!(render(
            &AuthorizationValidation,
            json!({"authorization": {"permissions": [
                {"path": "/*", "actors": ["uaa-client:admin"], "operations": ["read"]}
            ]}})
        )
        .is_ok());
    }

    #[test]
    fn test_authorization_requires_a_path_on_every_permission() {
        let err = render(
            &AuthorizationValidation,
            json!({"authorization": {"permissions": [
                {"path": "/*", "actors": ["uaa-client:admin"], "operations": ["read"]},
                {"actors": ["uaa-user:someone"], "operations": ["read"]}
            ]}}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), MISSING_PERMISSION_PATH);

        let err = render(
            &AuthorizationValidation,
            json!({"authorization": {"acls": {"enabled": false}, "permissions": [
                {"path": "", "actors": ["uaa-user:someone"], "operations": ["read"]}
            ]}}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), MISSING_PERMISSION_PATH);
    }

    #[test]
    fn test_logging_levels() {
        for level in VALID_LOG_LEVELS {
            assert!(render(&LoggingValidation, json!({"log_level": level})).is_ok());
        }
        let err = render(&LoggingValidation, json!({"log_level": "trace"})).unwrap_err();
        assert_eq!(err.to_string(), INVALID_LOG_LEVEL);
    }

    #[test]
    fn test_uaa_requires_url_and_ca_certs() {
        let err = render(&UaaValidation, json!({})).unwrap_err();
        assert_eq!(err.to_string(), INCOMPLETE_UAA);

        let err = render(
            &UaaValidation,
            json!({"authentication": {"uaa": {"url": "https://uaa"}}}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), INCOMPLETE_UAA);

        assert!(render(
            &UaaValidation,
            json!({"authentication": {"uaa": {"url": "https://uaa", "ca_certs": ["ca"]}}})
        )
        .is_ok());

        assert!(render(
            &UaaValidation,
            json!({"authentication": {"uaa": {"enabled": false}}})
        )
        .is_ok());
    }

    #[test]
    fn test_data_storage_validation_renders_nothing() {
        let output = render(&DataStorageValidation, json!({"data_storage": {"type": "in-memory"}})).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_encryption_validation_rejects_dsm_providers() {
        let err = render(
            &EncryptionValidation,
            json!({"encryption": {
                "keys": [{"provider_name": "dsm-provider", "encryption_key_name": "test-key", "active": true}],
                "providers": [{"name": "dsm-provider", "type": "dsm", "servers": [
                    {"host": "1.2.3.4", "partition": "fake-partition"}
                ]}]
            }}),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The provided encryption provider type is not valid. Valid provider types are \"hsm\", \"internal\", and \"kms-plugin\"."
        );
    }

    #[test]
    fn test_encryption_validation_uses_flattened_lists() {
        let output = render(
            &EncryptionValidation,
            json!({"encryption": {
                "providers": [[{"type": "internal", "name": "some-provider"}]],
                "keys": [[{
                    "provider_name": "some-provider",
                    "key_properties": {"encryption_password": "some-strong-password"},
                    "active": true
                }]]
            }}),
        )
        .unwrap();
        assert!(output.is_empty());
    }
}
