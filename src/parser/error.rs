// ABOUTME: Error types for render manifest parsing and structural checks
// ABOUTME: Defines specific error types for parser module operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read manifest file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid manifest format: {0}")]
    InvalidFormat(String),

    #[error("Invalid property '{path}': {reason}")]
    InvalidProperty { path: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Property '{path}' must be a mapping")]
    NotAMapping { path: String },

    #[error("Link '{link}' has an instance without an address")]
    LinkInstanceWithoutAddress { link: String },

    #[error("Invalid property '{path}': {reason}")]
    InvalidProperty { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ParserError>;
