// ABOUTME: Output module for rendered job files
// ABOUTME: Writes renders to stdout or into an output directory tree

pub mod error;
pub mod writer;

pub use error::{OutputError, Result};
pub use writer::{FileWriter, OutputWriter, StdoutWriter};

use crate::jobs::RenderedFile;

/// Write every file through `writer`, stopping at the first failure
pub async fn write_all(writer: &dyn OutputWriter, files: &[RenderedFile]) -> Result<()> {
    for file in files {
        writer.write(file).await?;
    }
    Ok(())
}
