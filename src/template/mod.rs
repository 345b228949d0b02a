// ABOUTME: Template engine module for job script rendering
// ABOUTME: Provides Handlebars rendering with shell helpers

pub mod engine;
pub mod error;
pub mod helpers;

pub use engine::TemplateEngine;
pub use error::{Result, TemplateError};
pub use helpers::shell_escape;
