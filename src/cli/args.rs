// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for credhub-render

use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "credhub-render")]
#[command(about = "Render and validate the credhub and bbr-credhubdb job templates from a deployment manifest")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a single template
    Render {
        #[arg(help = "Template path within the job, e.g. config/application/server.yml")]
        template: String,

        #[arg(short, long, help = "Path to the manifest YAML file")]
        manifest: PathBuf,

        #[arg(short, long, help = "Job owning the template (needed when the path exists in several jobs)")]
        job: Option<String>,

        #[arg(short, long, help = "Write into this directory as <dir>/<job>/<template> instead of stdout")]
        output_dir: Option<PathBuf>,

        #[arg(short = 's', long = "set", help = "Override a manifest property (dotted.path=value)")]
        overrides: Vec<String>,

        #[arg(long, help = "Render as the bootstrap instance")]
        bootstrap: bool,
    },

    /// Render every template of one or all jobs into a directory
    RenderAll {
        #[arg(short, long, help = "Path to the manifest YAML file")]
        manifest: PathBuf,

        #[arg(short, long, help = "Only render this job")]
        job: Option<String>,

        #[arg(short, long, help = "Output directory (defaults to the configured default_output_dir)")]
        output_dir: Option<PathBuf>,

        #[arg(short = 's', long = "set", help = "Override a manifest property (dotted.path=value)")]
        overrides: Vec<String>,

        #[arg(long, help = "Render as the bootstrap instance")]
        bootstrap: bool,
    },

    /// Check a manifest against every deployment rule without writing anything
    Validate {
        #[arg(short, long, help = "Path to the manifest YAML file")]
        manifest: PathBuf,

        #[arg(long, help = "Treat warnings as errors")]
        strict: bool,

        #[arg(short = 's', long = "set", help = "Override a manifest property (dotted.path=value)")]
        overrides: Vec<String>,
    },

    /// List the templates of one or all jobs
    List {
        #[arg(short, long, help = "Only list this job")]
        job: Option<String>,
    },

    /// Read credhub properties as JSON on stdin and print the legacy application.yml
    Configure,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse property overrides from dotted.path=value format; values are read as YAML
    pub fn parse_overrides(overrides: &[String]) -> anyhow::Result<Vec<(String, JsonValue)>> {
        let mut parsed = Vec::new();

        for item in overrides {
            if let Some((path, raw)) = item.split_once('=') {
                let value: JsonValue = if raw.is_empty() {
                    JsonValue::String(String::new())
                } else {
                    serde_yaml::from_str(raw)
                        .map_err(|e| anyhow::anyhow!("Invalid value in override '{}': {}", item, e))?
                };
                parsed.push((path.to_string(), value));
            } else {
                return Err(anyhow::anyhow!(
                    "Invalid override format '{}'. Expected 'dotted.path=value'",
                    item
                ));
            }
        }

        Ok(parsed)
    }
}
