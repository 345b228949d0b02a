// ABOUTME: Error types for template engine operations
// ABOUTME: Defines specific error types for script template compilation and rendering

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template syntax error: {0}")]
    SyntaxError(String),

    #[error("Template setup error: {0}")]
    SetupError(String),

    #[error("Handlebars error: {0}")]
    HandlebarsError(#[from] handlebars::RenderError),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
