// ABOUTME: Main library module for the CredHub job template renderer
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod database;
pub mod encryption;
pub mod jobs;
pub mod output;
pub mod parser;
pub mod template;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use jobs::{JobRegistry, RenderContext, RenderError, RenderUnit, RenderedFile, UnitKind};
pub use output::{FileWriter, OutputWriter, StdoutWriter};
pub use parser::{Manifest, ManifestParser, ManifestValidator};
pub use template::TemplateEngine;

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
