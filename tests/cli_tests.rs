// ABOUTME: Integration tests for the CLI application
// ABOUTME: Runs the credhub-render binary against manifests written to a temporary directory

use std::io::Write;
use std::process::{Command, Stdio};

mod common;
use common::{TestEnvironment, TestManifestBuilder};

fn credhub_render() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_credhub-render"));
    command.env_remove("RUST_LOG");
    command.env_remove("CREDHUB_RENDER_OUTPUT_DIR");
    command
}

#[test]
fn test_cli_help_command() {
    let output = credhub_render()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("credhub-render"));
    assert!(stdout.contains("render-all"));
}

#[test]
fn test_cli_version_command() {
    let output = credhub_render()
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_list_templates() {
    let output = credhub_render()
        .args(["list", "--job", "bbr-credhubdb"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("config/bbr.json"));
    assert!(stdout.contains("script"));
    assert!(!stdout.contains("config/application.yml"));

    let output = credhub_render()
        .args(["list", "--job", "credhub"])
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout
        .lines()
        .any(|line| line.contains("config/application.yml") && line.ends_with("legacy")));
}

#[tokio::test]
async fn test_cli_render_single_template_to_stdout() {
    let env = TestEnvironment::new();
    let manifest = env
        .create_manifest_file("deploy", &TestManifestBuilder::new())
        .await;

    let output = credhub_render()
        .args(["render", "config/application/server.yml", "--manifest"])
        .arg(&manifest)
        .args(["--set", "credhub.port=9443"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("port: 9443"));
    assert!(stdout.contains("key_alias: credhub_tls_cert"));
}

#[tokio::test]
async fn test_cli_render_ambiguous_template_needs_job() {
    let env = TestEnvironment::new();
    let manifest = env
        .create_manifest_file("deploy", &TestManifestBuilder::new())
        .await;

    let output = credhub_render()
        .args(["render", "bin/bbr/backup", "--manifest"])
        .arg(&manifest)
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());

    let output = credhub_render()
        .args(["render", "bin/bbr/backup", "--job", "credhub", "--manifest"])
        .arg(&manifest)
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Skipping backup"));
}

#[tokio::test]
async fn test_cli_render_all_into_directory() {
    let env = TestEnvironment::new();
    let manifest = env
        .create_manifest_file(
            "deploy",
            &TestManifestBuilder::new().with_postgres("pg.internal"),
        )
        .await;

    let output = credhub_render()
        .args(["render-all", "--manifest"])
        .arg(&manifest)
        .arg("--output-dir")
        .arg(env.output_dir())
        .arg("--bootstrap")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let spring = env
        .read_rendered("credhub", "config/application/spring.yml")
        .await;
    assert!(spring.contains("enabled: true"));
    assert!(spring.contains("jdbc:postgresql://pg.internal:5432/credhub"));

    let restore = env.read_rendered("credhub", "bin/bbr/restore").await;
    assert!(restore.contains("pg_restore"));

    assert!(env.output_dir().join("bbr-credhubdb/config/bbr.json").exists());
}

#[tokio::test]
async fn test_cli_validate_reports_broken_rules() {
    let env = TestEnvironment::new();
    let valid = env
        .create_manifest_file("valid", &TestManifestBuilder::new())
        .await;

    let output = credhub_render()
        .args(["validate", "--manifest"])
        .arg(&valid)
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));
    assert!(String::from_utf8_lossy(&output.stdout).contains("is valid"));

    let output = credhub_render()
        .args(["validate", "--manifest"])
        .arg(&valid)
        .args(["--set", "credhub.data_storage.type=oracle"])
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("credhub.data_storage.type must be set to"));
}

#[test]
fn test_cli_configure_reads_stdin() {
    let input = serde_json::json!({
        "port": 8443,
        "bootstrap": true,
        "data_storage": {"type": "in-memory"},
        "encryption": {
            "keys": [{
                "provider_name": "internal",
                "key_properties": {"encryption_password": common::ENCRYPTION_PASSWORD},
                "active": true
            }],
            "providers": [{"name": "internal", "type": "internal"}]
        },
        "authentication": {"uaa": {"url": common::UAA_URL, "ca_certs": ["ca"]}}
    });

    let mut child = credhub_render()
        .arg("configure")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn command");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.to_string().as_bytes())
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("port: 8443"));
    assert!(stdout.contains("key_creation_enabled: true"));
    assert!(stdout.contains("auth_server:"));
    assert!(stdout.contains("provider_type: internal"));
    assert!(!stdout.contains("auth-server:"));

    let doc: serde_json::Value = serde_yaml::from_str(&stdout).unwrap();
    assert_eq!(doc["flyway"]["enabled"], serde_json::json!(true));
    assert_eq!(doc["auth_server"]["url"], serde_json::json!(common::UAA_URL));
}
