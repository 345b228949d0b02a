// ABOUTME: Render manifest model: property tree, consumed links and instance metadata
// ABOUTME: Loads manifests from YAML, JSON or the legacy configurator input shape

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use super::error::{ParserError, Result};
use super::properties::CredhubProperties;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "empty_object")]
    pub properties: JsonValue,

    #[serde(default)]
    pub links: IndexMap<String, Link>,

    #[serde(default)]
    pub instance: InstanceSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub instances: Vec<LinkInstance>,

    #[serde(default = "empty_object")]
    pub properties: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkInstance {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceSpec {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub bootstrap: bool,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            properties: empty_object(),
            links: IndexMap::new(),
            instance: InstanceSpec::default(),
        }
    }
}

fn empty_object() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

/// Walk a dotted path through nested JSON objects
pub fn lookup<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
        .filter(|found| !found.is_null())
}

impl Manifest {
    /// Parse manifest from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ParserError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Parse manifest from YAML string (JSON is valid YAML)
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let manifest: Manifest = serde_yaml::from_str(content).map_err(ParserError::YamlError)?;
        manifest.validate_structure()?;
        Ok(manifest)
    }

    /// Parse manifest from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(content).map_err(ParserError::JsonError)?;
        manifest.validate_structure()?;
        Ok(manifest)
    }

    /// Parse the configurator input: either a full manifest or the bare
    /// `credhub` property subtree with an optional top-level `bootstrap` flag.
    pub fn from_configurator_json(content: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(content).map_err(ParserError::JsonError)?;
        let JsonValue::Object(mut credhub) = value else {
            return Err(ParserError::InvalidFormat(
                "configurator input must be a JSON object".to_string(),
            ));
        };

        if credhub.contains_key("properties") {
            let manifest: Manifest = serde_json::from_value(JsonValue::Object(credhub))?;
            manifest.validate_structure()?;
            return Ok(manifest);
        }

        let bootstrap = credhub
            .remove("bootstrap")
            .and_then(|b| b.as_bool())
            .unwrap_or(false);
        debug!("Treating configurator input as bare credhub properties (bootstrap: {})", bootstrap);

        let mut properties = serde_json::Map::new();
        properties.insert("credhub".to_string(), JsonValue::Object(credhub));

        Ok(Self {
            properties: JsonValue::Object(properties),
            links: IndexMap::new(),
            instance: InstanceSpec {
                bootstrap,
                ..Default::default()
            },
        })
    }

    fn validate_structure(&self) -> Result<()> {
        if !self.properties.is_object() {
            return Err(ParserError::InvalidFormat(
                "`properties` must be a mapping".to_string(),
            ));
        }
        Ok(())
    }

    pub fn property(&self, path: &str) -> Option<&JsonValue> {
        lookup(&self.properties, path)
    }

    pub fn credhub(&self) -> Result<CredhubProperties> {
        CredhubProperties::from_properties(&self.properties)
    }

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.get(name)
    }

    pub fn bootstrap(&self) -> bool {
        self.instance.bootstrap
    }

    pub fn bpm_enabled(&self) -> bool {
        self.property("bpm.enabled")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }

    pub fn release_level_backup(&self) -> bool {
        self.property("release_level_backup")
            .and_then(JsonValue::as_bool)
            .unwrap_or(true)
    }

    /// Set a property at a dotted path, creating intermediate mappings
    pub fn set_property(&mut self, path: &str, value: JsonValue) -> Result<()> {
        let mut current = &mut self.properties;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            if segment.is_empty() {
                return Err(ParserError::InvalidProperty {
                    path: path.to_string(),
                    reason: "empty path segment".to_string(),
                });
            }
            let JsonValue::Object(map) = current else {
                return Err(ParserError::InvalidProperty {
                    path: path.to_string(),
                    reason: format!("`{}` is not a mapping", segment),
                });
            };
            if segments.peek().is_none() {
                map.insert(segment.to_string(), value);
                return Ok(());
            }
            current = map
                .entry(segment.to_string())
                .or_insert_with(empty_object);
            if current.is_null() {
                *current = empty_object();
            }
        }
        Ok(())
    }

    pub fn with_link(mut self, name: &str, link: Link) -> Self {
        self.links.insert(name.to_string(), link);
        self
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ParserError::YamlError)
    }
}

impl Link {
    pub fn new(instances: Vec<LinkInstance>, properties: JsonValue) -> Self {
        Self {
            instances,
            properties,
        }
    }

    pub fn first_address(&self) -> Option<&str> {
        self.instances
            .first()
            .and_then(|instance| instance.address.as_deref())
    }

    pub fn property(&self, path: &str) -> Option<&JsonValue> {
        lookup(&self.properties, path)
    }
}

impl LinkInstance {
    pub fn with_address(address: &str) -> Self {
        Self {
            name: None,
            address: Some(address.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManifestParser;

impl ManifestParser {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Manifest> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(ParserError::IoError)?;
        debug!("Read manifest {} ({} bytes)", path.display(), content.len());
        self.parse_string(&content)
    }

    pub fn parse_string(&self, content: &str) -> Result<Manifest> {
        Manifest::from_yaml(content)
    }
}

impl Default for ManifestParser {
    fn default() -> Self {
        Self::new()
    }
}
