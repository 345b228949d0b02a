// ABOUTME: Handlebars helper functions for script rendering
// ABOUTME: Implements the shell quoting and numbering helpers used by the job scripts

use handlebars::{Context, Handlebars, Helper, Output, RenderContext, RenderError};

/// Escape a value for use inside a double-quoted shell string
pub fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn param_as_string(h: &Helper, index: usize, name: &str) -> Result<String, RenderError> {
    let value = h
        .param(index)
        .map(|p| p.value())
        .ok_or_else(|| RenderError::new(format!("{} helper requires a parameter", name)))?;

    Ok(match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Shell helper - escapes a value for a double-quoted shell string
pub fn shell_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let value = param_as_string(h, 0, "shell")?;
    out.write(&shell_escape(&value))?;
    Ok(())
}

/// Two-digit helper - zero-pads an index to two digits
pub fn two_digits_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let index = h
        .param(0)
        .and_then(|v| v.value().as_u64())
        .ok_or_else(|| RenderError::new("two_digits helper requires a numeric parameter"))?;
    out.write(&format!("{:02}", index))?;
    Ok(())
}

/// Register all helpers with the Handlebars registry
pub fn register_helpers(handlebars: &mut Handlebars) -> std::result::Result<(), String> {
    handlebars.register_helper("shell", Box::new(shell_helper));
    handlebars.register_helper("two_digits", Box::new(two_digits_helper));
    Ok(())
}
