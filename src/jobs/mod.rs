// ABOUTME: Render units for the credhub and bbr-credhubdb jobs
// ABOUTME: Defines the render unit trait, the per-render context and the unit registry

pub mod bbr_credhubdb;
pub mod credhub;
pub mod error;

pub use error::{RenderError, Result};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::database::DataStorage;
use crate::encryption::EncryptionConfig;
use crate::parser::{CredhubProperties, Manifest};
use crate::template::TemplateEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Renders nothing; fails when the manifest breaks a deployment rule
    Validation,
    Config,
    Script,
    /// Rendered only on request; whole-job renders and checks skip it
    Legacy,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Config => "config",
            Self::Script => "script",
            Self::Legacy => "legacy",
        }
    }
}

/// Everything a render unit may read for one render
pub struct RenderContext<'a> {
    pub manifest: &'a Manifest,
    pub credhub: CredhubProperties,
    pub engine: &'a TemplateEngine,
}

impl<'a> RenderContext<'a> {
    pub fn new(manifest: &'a Manifest, engine: &'a TemplateEngine) -> Result<Self> {
        Ok(Self {
            manifest,
            credhub: manifest.credhub()?,
            engine,
        })
    }

    pub fn bootstrap(&self) -> bool {
        self.manifest.bootstrap()
    }

    pub fn encryption(&self) -> Result<EncryptionConfig> {
        Ok(EncryptionConfig::from_properties(&self.credhub.encryption)?)
    }

    pub fn data_storage(&self) -> Result<DataStorage> {
        Ok(DataStorage::resolve(&self.credhub.data_storage, self.manifest)?)
    }

    pub fn render_script<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        Ok(self.engine.render_template(template, data)?)
    }
}

pub trait RenderUnit: Send + Sync {
    fn job(&self) -> &'static str;
    fn path(&self) -> &'static str;
    fn kind(&self) -> UnitKind;
    fn render(&self, ctx: &RenderContext) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFile {
    pub job: String,
    pub path: String,
    pub content: String,
    pub executable: bool,
}

/// Serialize a document to YAML; `None` renders an empty document
pub fn to_yaml<T: Serialize>(document: Option<&T>) -> Result<String> {
    match document {
        Some(doc) => Ok(serde_yaml::to_string(doc)?),
        None => Ok(String::new()),
    }
}

pub struct JobRegistry {
    units: IndexMap<String, Box<dyn RenderUnit>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            units: IndexMap::new(),
        };

        for unit in credhub::units() {
            registry.register(unit);
        }
        for unit in bbr_credhubdb::units() {
            registry.register(unit);
        }

        registry
    }

    pub fn register(&mut self, unit: Box<dyn RenderUnit>) {
        let key = format!("{}/{}", unit.job(), unit.path());
        self.units.insert(key, unit);
    }

    pub fn get(&self, job: &str, path: &str) -> Option<&dyn RenderUnit> {
        self.units
            .get(&format!("{}/{}", job, path))
            .map(|unit| unit.as_ref())
    }

    /// Look up a unit by `path` within `job`, or by bare `path` when it is unique
    pub fn find(&self, job: Option<&str>, path: &str) -> Result<&dyn RenderUnit> {
        if let Some(job) = job {
            self.ensure_job(job)?;
            return self
                .get(job, path)
                .ok_or_else(|| RenderError::UnknownTemplate {
                    template: format!("{}/{}", job, path),
                });
        }

        let matches: Vec<&dyn RenderUnit> = self
            .units
            .values()
            .filter(|unit| unit.path() == path)
            .map(|unit| unit.as_ref())
            .collect();

        match matches.as_slice() {
            [] => Err(RenderError::UnknownTemplate {
                template: path.to_string(),
            }),
            [unit] => Ok(*unit),
            several => Err(RenderError::AmbiguousTemplate {
                template: path.to_string(),
                jobs: several.iter().map(|u| u.job().to_string()).collect(),
            }),
        }
    }

    pub fn jobs(&self) -> Vec<&'static str> {
        let mut jobs: Vec<&'static str> = Vec::new();
        for unit in self.units.values() {
            if !jobs.contains(&unit.job()) {
                jobs.push(unit.job());
            }
        }
        jobs
    }

    fn ensure_job(&self, job: &str) -> Result<()> {
        let jobs = self.jobs();
        if jobs.iter().any(|j| *j == job) {
            Ok(())
        } else {
            Err(RenderError::UnknownJob {
                job: job.to_string(),
                available: jobs.iter().map(|j| j.to_string()).collect(),
            })
        }
    }

    pub fn units_for(&self, job: &str) -> Vec<&dyn RenderUnit> {
        self.units
            .values()
            .filter(|unit| unit.job() == job)
            .map(|unit| unit.as_ref())
            .collect()
    }

    pub fn list(&self) -> Vec<String> {
        self.units.keys().cloned().collect()
    }

    pub fn render(&self, unit: &dyn RenderUnit, ctx: &RenderContext) -> Result<RenderedFile> {
        debug!("Rendering {}/{}", unit.job(), unit.path());
        let content = unit.render(ctx)?;
        Ok(RenderedFile {
            job: unit.job().to_string(),
            path: unit.path().to_string(),
            content,
            executable: unit.kind() == UnitKind::Script,
        })
    }

    /// Render every unit of a job except legacy ones; validation units run first and the first failure wins.
    pub fn render_job(&self, job: &str, ctx: &RenderContext) -> Result<Vec<RenderedFile>> {
        self.ensure_job(job)?;
        let units = self.units_for(job);

        for unit in units.iter().filter(|u| u.kind() == UnitKind::Validation) {
            unit.render(ctx)?;
        }

        let files = units
            .iter()
            .filter(|u| !matches!(u.kind(), UnitKind::Validation | UnitKind::Legacy))
            .map(|unit| self.render(*unit, ctx))
            .collect::<Result<Vec<_>>>()?;

        info!("Rendered {} files for job {}", files.len(), job);
        Ok(files)
    }

    /// Render every non-legacy unit of the given jobs and collect each failure
    pub fn check(&self, jobs: &[&str], ctx: &RenderContext) -> Result<Vec<(String, RenderError)>> {
        let mut failures = Vec::new();
        for job in jobs {
            self.ensure_job(job)?;
            for unit in self
                .units_for(job)
                .into_iter()
                .filter(|u| u.kind() != UnitKind::Legacy)
            {
                if let Err(e) = unit.render(ctx) {
                    failures.push((format!("{}/{}", unit.job(), unit.path()), e));
                }
            }
        }
        Ok(failures)
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
