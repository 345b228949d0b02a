// ABOUTME: Structural checks on a render manifest before any job is rendered
// ABOUTME: Collects errors and warnings about property shapes and consumed links

use serde_json::Value as JsonValue;

use super::error::ValidationError;
use super::manifest::{lookup, Manifest};

/// Links the credhub and bbr-credhubdb jobs know how to consume
pub const KNOWN_LINKS: &[&str] = &["postgres", "database", "credhub_db"];

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ManifestValidator {
    strict_mode: bool,
}

impl ManifestValidator {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// Treat warnings as errors
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn validate(&self, manifest: &Manifest) -> ValidationReport {
        let mut report = ValidationReport::new();

        self.validate_sections(manifest, &mut report);
        self.validate_links(manifest, &mut report);

        if self.strict_mode {
            for warning in report.warnings.drain(..) {
                report.errors.push(ValidationError::InvalidProperty {
                    path: "manifest".to_string(),
                    reason: warning,
                });
            }
        }

        report.is_valid = report.errors.is_empty();
        report
    }

    fn validate_sections(&self, manifest: &Manifest, report: &mut ValidationReport) {
        match manifest.property("credhub") {
            None => report
                .warnings
                .push("No `credhub` properties found; job spec defaults apply".to_string()),
            Some(JsonValue::Object(_)) => {}
            Some(_) => report.errors.push(ValidationError::NotAMapping {
                path: "credhub".to_string(),
            }),
        }

        for path in [
            "credhub.data_storage",
            "credhub.encryption",
            "credhub.authentication",
            "credhub.authorization",
        ] {
            if let Some(value) = lookup(&manifest.properties, path) {
                if !value.is_object() {
                    report.errors.push(ValidationError::NotAMapping {
                        path: path.to_string(),
                    });
                }
            }
        }

        if let Err(e) = manifest.credhub() {
            report.errors.push(ValidationError::InvalidProperty {
                path: "credhub".to_string(),
                reason: e.to_string(),
            });
        }
    }

    fn validate_links(&self, manifest: &Manifest, report: &mut ValidationReport) {
        for (name, link) in &manifest.links {
            if !KNOWN_LINKS.contains(&name.as_str()) {
                report
                    .warnings
                    .push(format!("Link '{}' is not consumed by any job", name));
            }

            if link.instances.iter().any(|i| i.address.is_none()) {
                report
                    .errors
                    .push(ValidationError::LinkInstanceWithoutAddress { link: name.clone() });
            }
        }
    }
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self::new()
    }
}
