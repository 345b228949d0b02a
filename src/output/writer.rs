// ABOUTME: Output writers for rendered job files (stdout, directory tree)
// ABOUTME: The file writer lays files out as <dir>/<job>/<path> and marks scripts executable

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::error::{OutputError, Result};
use crate::jobs::RenderedFile;

#[async_trait]
pub trait OutputWriter: Send + Sync {
    async fn write(&self, file: &RenderedFile) -> Result<()>;
}

pub struct StdoutWriter;

impl Default for StdoutWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OutputWriter for StdoutWriter {
    async fn write(&self, file: &RenderedFile) -> Result<()> {
        print!("{}", file.content);
        if !file.content.is_empty() && !file.content.ends_with('\n') {
            println!();
        }
        debug!("Output written to stdout ({} chars)", file.content.len());
        Ok(())
    }
}

pub struct FileWriter {
    root: PathBuf,
}

impl FileWriter {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, file: &RenderedFile) -> PathBuf {
        self.root.join(&file.job).join(&file.path)
    }
}

#[async_trait]
impl OutputWriter for FileWriter {
    async fn write(&self, file: &RenderedFile) -> Result<()> {
        let output_path = self.path_for(file);

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OutputError::WriteError {
                    message: format!("Failed to create directory {}: {}", parent.display(), e),
                })?;
        }

        fs::write(&output_path, &file.content)
            .await
            .map_err(|e| OutputError::WriteError {
                message: format!("Failed to write file {}: {}", output_path.display(), e),
            })?;

        if file.executable {
            make_executable(&output_path).await?;
        }

        info!(
            "Output written to file: {} ({} bytes)",
            output_path.display(),
            file.content.len()
        );
        Ok(())
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
