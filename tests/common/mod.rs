// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides a manifest builder and a temporary environment for manifests and rendered trees

#![allow(dead_code)]

use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

use credhub_render::parser::{Link, LinkInstance, Manifest};

pub const ENCRYPTION_PASSWORD: &str = "a-sufficiently-long-password";
pub const UAA_URL: &str = "https://uaa.example.com:8443";

/// Builds manifests that pass every deployment rule unless a test breaks one on purpose
pub struct TestManifestBuilder {
    manifest: Manifest,
}

impl TestManifestBuilder {
    pub fn new() -> Self {
        let mut manifest = Manifest::default();
        manifest.properties = json!({
            "credhub": {
                "tls": {
                    "certificate": "server-cert",
                    "private_key": "server-key"
                },
                "data_storage": {
                    "type": "in-memory"
                },
                "encryption": {
                    "keys": [{
                        "provider_name": "internal",
                        "key_properties": { "encryption_password": ENCRYPTION_PASSWORD },
                        "active": true
                    }],
                    "providers": [{ "name": "internal", "type": "internal" }]
                },
                "authentication": {
                    "uaa": {
                        "url": UAA_URL,
                        "ca_certs": ["uaa-ca"]
                    }
                },
                "authorization": {
                    "permissions": [{
                        "path": "/*",
                        "actors": ["uaa-user:admin"],
                        "operations": ["read", "write", "delete"]
                    }]
                }
            }
        });
        Self { manifest }
    }

    pub fn with_property(mut self, path: &str, value: JsonValue) -> Self {
        self.manifest
            .set_property(path, value)
            .expect("property path should be settable");
        self
    }

    pub fn with_postgres(self, host: &str) -> Self {
        self.with_property(
            "credhub.data_storage",
            json!({
                "type": "postgres",
                "host": host,
                "port": 5432,
                "database": "credhub",
                "username": "credhub-user",
                "password": "credhub-password",
                "require_tls": false
            }),
        )
    }

    pub fn with_mysql(self, host: &str) -> Self {
        self.with_property(
            "credhub.data_storage",
            json!({
                "type": "mysql",
                "host": host,
                "port": 3306,
                "database": "credhub",
                "username": "credhub-user",
                "password": "credhub-password",
                "require_tls": true,
                "tls_ca": "mysql-ca"
            }),
        )
    }

    pub fn with_link(mut self, name: &str, addresses: &[&str], properties: JsonValue) -> Self {
        let instances = addresses
            .iter()
            .map(|address| LinkInstance::with_address(address))
            .collect();
        self.manifest = self.manifest.with_link(name, Link::new(instances, properties));
        self
    }

    pub fn bootstrap(mut self) -> Self {
        self.manifest.instance.bootstrap = true;
        self
    }

    pub fn build(self) -> Manifest {
        self.manifest
    }

    pub fn to_yaml(&self) -> String {
        self.manifest.to_yaml().expect("manifest should serialize")
    }
}

impl Default for TestManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn manifest_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}.yml", name))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("rendered")
    }

    pub async fn create_manifest_file(&self, name: &str, builder: &TestManifestBuilder) -> PathBuf {
        let path = self.manifest_file(name);
        fs::write(&path, builder.to_yaml())
            .await
            .expect("Failed to write manifest file");
        path
    }

    pub async fn read_rendered(&self, job: &str, path: &str) -> String {
        fs::read_to_string(self.output_dir().join(job).join(path))
            .await
            .expect("Failed to read rendered file")
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_round_trips_through_yaml() {
        let builder = TestManifestBuilder::new();
        let parsed = Manifest::from_yaml(&builder.to_yaml()).unwrap();
        assert_eq!(
            parsed.property("credhub.data_storage.type"),
            Some(&json!("in-memory"))
        );
    }

    #[test]
    fn test_environment_paths() {
        let env = TestEnvironment::new();
        assert!(env.path().exists());
        assert!(env.manifest_file("deploy").ends_with("deploy.yml"));
    }
}
