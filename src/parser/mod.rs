// ABOUTME: Parser module for render manifests
// ABOUTME: Exports manifest loading, the typed credhub property model and structural checks

pub mod error;
pub mod manifest;
pub mod properties;
pub mod validation;

pub use error::{ParserError, ValidationError};
pub use manifest::{lookup, InstanceSpec, Link, LinkInstance, Manifest, ManifestParser};
pub use properties::{CredhubProperties, DataStorageProperties, Permission};
pub use validation::{ManifestValidator, ValidationReport, KNOWN_LINKS};
