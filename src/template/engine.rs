// ABOUTME: Template engine implementation using Handlebars
// ABOUTME: Renders job scripts from serializable contexts with shell-oriented helpers

use handlebars::Handlebars;
use serde::Serialize;

use super::error::{Result, TemplateError};
use super::helpers;

#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    /// Create a new template engine with all built-in helpers
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();

        handlebars.set_strict_mode(false);
        handlebars.set_dev_mode(false);

        // Output is shell and config text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        helpers::register_helpers(&mut handlebars).map_err(TemplateError::SetupError)?;

        Ok(Self { handlebars })
    }

    /// Render a template string with any serializable context
    pub fn render_template<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(TemplateError::HandlebarsError)
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::Template::compile(template)
            .map(|_| ())
            .map_err(|e| TemplateError::SyntaxError(e.to_string()))
    }
}
