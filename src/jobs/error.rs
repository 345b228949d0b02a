// ABOUTME: Error types for rendering job templates
// ABOUTME: Validation failures display the operator-facing message unchanged

use thiserror::Error;

use crate::database::DatabaseError;
use crate::encryption::EncryptionError;
use crate::parser::ParserError;
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{message}")]
    Invalid { message: String },

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to read job properties: {0}")]
    Properties(#[from] ParserError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Failed to serialize YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown job '{job}'. Available jobs: {available:?}")]
    UnknownJob { job: String, available: Vec<String> },

    #[error("Unknown template '{template}'")]
    UnknownTemplate { template: String },

    #[error("Template '{template}' exists in several jobs: {jobs:?}")]
    AmbiguousTemplate { template: String, jobs: Vec<String> },
}

impl RenderError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
