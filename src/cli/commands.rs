// ABOUTME: Command implementations for the credhub-render CLI
// ABOUTME: Handles execution of render, render-all, validate, list and configure commands

use anyhow::Result;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::args::Args;
use super::config::Config;
use crate::jobs::{credhub, JobRegistry, RenderContext, RenderedFile};
use crate::output::{self, FileWriter, OutputWriter, StdoutWriter};
use crate::parser::{Manifest, ManifestParser, ManifestValidator};
use crate::template::TemplateEngine;

/// Load a manifest, apply `--set` overrides and the bootstrap flag
async fn load_manifest(path: &Path, overrides: &[String], bootstrap: bool) -> Result<Manifest> {
    let overrides = Args::parse_overrides(overrides)?;

    let mut manifest = ManifestParser::new()
        .parse_file(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load manifest {}: {}", path.display(), e))?;

    for (property, value) in overrides {
        manifest.set_property(&property, value)?;
    }
    if bootstrap {
        manifest.instance.bootstrap = true;
    }

    info!(
        "Loaded manifest {} ({} links, bootstrap: {})",
        path.display(),
        manifest.links.len(),
        manifest.bootstrap()
    );
    Ok(manifest)
}

/// Render a single template to stdout or into an output directory
pub async fn render_template(
    template: String,
    manifest_path: PathBuf,
    job: Option<String>,
    output_dir: Option<PathBuf>,
    overrides: Vec<String>,
    bootstrap: bool,
    _config: &Config,
) -> Result<()> {
    let manifest = load_manifest(&manifest_path, &overrides, bootstrap).await?;
    let engine = TemplateEngine::new()?;
    let ctx = RenderContext::new(&manifest, &engine)?;
    let registry = JobRegistry::new();

    let unit = registry.find(job.as_deref(), &template)?;
    let file = registry.render(unit, &ctx)?;

    let writer: Box<dyn OutputWriter> = match output_dir {
        Some(dir) => Box::new(FileWriter::new(dir)),
        None => Box::new(StdoutWriter::new()),
    };
    writer.write(&file).await?;

    info!("Rendered {}/{}", file.job, file.path);
    Ok(())
}

/// Render every template of one or all jobs into a directory tree
pub async fn render_all(
    manifest_path: PathBuf,
    job: Option<String>,
    output_dir: Option<PathBuf>,
    overrides: Vec<String>,
    bootstrap: bool,
    config: &Config,
) -> Result<()> {
    let output_dir = output_dir
        .or_else(|| config.default_output_dir.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No output directory given; pass --output-dir or set default_output_dir")
        })?;

    let manifest = load_manifest(&manifest_path, &overrides, bootstrap).await?;
    let engine = TemplateEngine::new()?;
    let ctx = RenderContext::new(&manifest, &engine)?;
    let registry = JobRegistry::new();

    let jobs: Vec<String> = match job {
        Some(job) => vec![job],
        None => registry.jobs().iter().map(|j| j.to_string()).collect(),
    };

    let writer = FileWriter::new(&output_dir);
    let mut total = 0;
    for job in &jobs {
        let files = registry.render_job(job, &ctx)?;
        output::write_all(&writer, &files).await?;
        total += files.len();
    }

    println!(
        "✓ Rendered {} files for {} into {}",
        total,
        jobs.join(", "),
        output_dir.display()
    );
    Ok(())
}

/// Check a manifest against the structural checks and every render rule
pub async fn validate_manifest(
    manifest_path: PathBuf,
    strict: bool,
    overrides: Vec<String>,
    _config: &Config,
) -> Result<()> {
    info!("Validating manifest: {}", manifest_path.display());

    let manifest = load_manifest(&manifest_path, &overrides, false).await?;
    let report = ManifestValidator::new()
        .with_strict_mode(strict)
        .validate(&manifest);

    for warning in &report.warnings {
        warn!("{}", warning);
        println!("  ! {}", warning);
    }

    let mut problems: Vec<String> = report.errors.iter().map(|e| e.to_string()).collect();

    // A manifest whose credhub properties do not deserialize cannot be rendered at all
    if report.is_valid {
        let engine = TemplateEngine::new()?;
        let ctx = RenderContext::new(&manifest, &engine)?;
        let registry = JobRegistry::new();
        let jobs = registry.jobs();
        for (unit, error) in registry.check(&jobs, &ctx)? {
            problems.push(format!("{}: {}", unit, error));
        }
    }

    if problems.is_empty() {
        println!("✓ Manifest '{}' is valid", manifest_path.display());
        println!("  Links: {}", manifest.links.len());
        println!("  Warnings: {}", report.warnings.len());
        return Ok(());
    }

    for problem in &problems {
        println!("  ✗ {}", problem);
    }
    Err(anyhow::anyhow!(
        "Manifest validation failed with {} error(s)",
        problems.len()
    ))
}

/// List the templates of one or all jobs
pub async fn list_templates(job: Option<String>, _config: &Config) -> Result<()> {
    let registry = JobRegistry::new();

    let jobs: Vec<&str> = match job.as_deref() {
        Some(job) => {
            if !registry.jobs().iter().any(|j| *j == job) {
                return Err(anyhow::anyhow!(
                    "Unknown job '{}'. Available jobs: {}",
                    job,
                    registry.jobs().join(", ")
                ));
            }
            vec![job]
        }
        None => registry.jobs(),
    };

    for job in jobs {
        println!("{}:", job);
        for unit in registry.units_for(job) {
            println!("  {:<50} {}", unit.path(), unit.kind().as_str());
        }
    }
    Ok(())
}

/// Read configurator JSON on stdin and print the legacy application.yml
pub async fn configure(_config: &Config) -> Result<()> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprintln!("Usage: <json> | credhub-render configure");
        return Err(anyhow::anyhow!("configure expects JSON on stdin"));
    }

    let mut input = String::new();
    stdin.read_to_string(&mut input)?;

    let file = configurator_output(&input)?;
    StdoutWriter::new().write(&file).await?;
    Ok(())
}

fn configurator_output(input: &str) -> Result<RenderedFile> {
    let manifest = Manifest::from_configurator_json(input)?;
    let engine = TemplateEngine::new()?;
    let ctx = RenderContext::new(&manifest, &engine)?;
    let registry = JobRegistry::new();

    let unit = registry.find(Some(credhub::JOB), credhub::LEGACY_APPLICATION_PATH)?;
    Ok(registry.render(unit, &ctx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"
properties:
  credhub:
    data_storage:
      type: in-memory
    encryption:
      keys:
        - provider_name: internal
          key_properties:
            encryption_password: a-long-enough-password
          active: true
      providers:
        - name: internal
          type: internal
    authentication:
      uaa:
        url: https://uaa.example.com
        ca_certs: [uaa-ca]
    authorization:
      permissions:
        - path: /*
          actors: ["uaa-user:admin"]
          operations: [read, write]
"#;

    #[tokio::test]
    async fn test_load_manifest_applies_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yml");
        std::fs::write(&path, MANIFEST).unwrap();

        let manifest = load_manifest(&path, &["credhub.port=9443".to_string()], true)
            .await
            .unwrap();
        assert_eq!(manifest.credhub().unwrap().port, 9443);
        assert!(manifest.bootstrap());
    }

    #[tokio::test]
    async fn test_render_all_writes_job_trees() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yml");
        std::fs::write(&path, MANIFEST).unwrap();
        let out = dir.path().join("rendered");

        render_all(path, None, Some(out.clone()), vec![], false, &Config::default())
            .await
            .unwrap();

        assert!(out.join("credhub/config/application/server.yml").exists());
        assert!(out.join("credhub/bin/pre-start").exists());
        assert!(!out.join("credhub/config/application.yml").exists());
        assert!(out.join("bbr-credhubdb/config/bbr.json").exists());
        assert!(!out.join("credhub/config/validation_logging.yml").exists());
    }

    #[tokio::test]
    async fn test_render_all_requires_output_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yml");
        std::fs::write(&path, MANIFEST).unwrap();

        let result = render_all(path, None, None, vec![], false, &Config::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_validate_reports_rule_failures() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yml");
        std::fs::write(&path, MANIFEST).unwrap();

        let ok = validate_manifest(path.clone(), false, vec![], &Config::default()).await;
        assert!(ok.is_ok());

        let bad = validate_manifest(
            path,
            false,
            vec!["credhub.log_level=verbose".to_string()],
            &Config::default(),
        )
        .await;
        assert!(bad.is_err());
    }

    const TWO_PROVIDER_KEYS: &str = r#"[
        {"provider_name": "internal", "key_properties": {"encryption_password": "a-long-enough-password"}, "active": true},
        {"provider_name": "kms", "key_properties": {"encryption_key_name": "kms-key"}}
    ]"#;

    const TWO_PROVIDERS: &str = r#"[
        {"name": "internal", "type": "internal"},
        {"name": "kms", "type": "kms-plugin", "connection_properties": {"endpoint": "/var/vcap/sys/run/kms/kms.sock"}}
    ]"#;

    fn two_provider_overrides() -> Vec<String> {
        vec![
            format!("credhub.encryption.keys={}", TWO_PROVIDER_KEYS),
            format!("credhub.encryption.providers={}", TWO_PROVIDERS),
        ]
    }

    #[tokio::test]
    async fn test_render_all_and_validate_accept_keys_across_providers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yml");
        std::fs::write(&path, MANIFEST).unwrap();
        let out = dir.path().join("rendered");

        validate_manifest(path.clone(), false, two_provider_overrides(), &Config::default())
            .await
            .unwrap();

        render_all(
            path,
            Some("credhub".to_string()),
            Some(out.clone()),
            two_provider_overrides(),
            false,
            &Config::default(),
        )
        .await
        .unwrap();

        let encryption =
            std::fs::read_to_string(out.join("credhub/config/application/encryption.yml")).unwrap();
        assert!(encryption.contains("kms-plugin"));
        assert!(!out.join("credhub/config/application.yml").exists());
    }

    #[test]
    fn test_configurator_output_shape() {
        let input = serde_json::json!({
            "port": 8443,
            "bootstrap": true,
            "data_storage": {"type": "in-memory"},
            "encryption": {
                "keys": [{"provider_name": "hsm", "key_properties": {"encryption_key_name": "active_keyname"}, "active": true}],
                "providers": [{"name": "hsm", "type": "hsm", "connection_properties": {
                    "partition": "active_partition",
                    "partition_password": "active_partpass"
                }}]
            },
            "authentication": {"uaa": {"url": "https://uaa.example.com", "internal_url": "https://uaa.internal"}}
        });

        let file = configurator_output(&input.to_string()).unwrap();
        assert_eq!(file.path, "config/application.yml");

        let doc: serde_json::Value = serde_yaml::from_str(&file.content).unwrap();
        assert_eq!(doc["server"]["port"], serde_json::json!(8443));
        assert_eq!(doc["server"]["ssl"]["key_password"], "KEY_STORE_PASSWORD_PLACEHOLDER");
        assert_eq!(doc["auth_server"]["url"], "https://uaa.example.com");
        assert_eq!(doc["auth_server"]["internal_url"], "https://uaa.internal");
        assert_eq!(doc["flyway"]["enabled"], serde_json::json!(true));
        assert_eq!(doc["encryption"]["keys"][0]["provider_type"], "hsm");
        assert_eq!(doc["encryption"]["keys"][0]["active"], serde_json::json!(true));
        assert_eq!(doc["hsm"]["partition"], "active_partition");
        assert!(doc.get("auth-server").is_none());
        assert!(doc["spring"].get("flyway").is_none());
    }

    #[test]
    fn test_configurator_output_rejects_bad_storage() {
        let err = configurator_output(r#"{"data_storage": {"type": "oracle"}}"#).unwrap_err();
        assert!(err.to_string().contains("credhub.data_storage.type must be set to"));
    }

    #[tokio::test]
    async fn test_list_unknown_job() {
        assert!(list_templates(Some("uaa".to_string()), &Config::default())
            .await
            .is_err());
        assert!(list_templates(None, &Config::default()).await.is_ok());
    }
}
